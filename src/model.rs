use std::path::Path;

use tracing::{debug, info, trace, warn};
use tracing_error::SpanTrace;

use crate::columns::WorkingSet;
use crate::domain::{CMDMode, CTConfig, CTError, Message, NO_DATA_MESSAGE};
use crate::filter::FilterValue;
use crate::ingest;
use crate::inputter::{InputResult, Inputter};
use crate::session::Session;
use crate::state::{Action, FilterEditor, ViewState};
use crate::ui::{
    COLUMN_WIDTH_MARGIN, SCROLLBAR_WIDTH, STATUSLINE_HEIGHT, TABLE_HEADER_HEIGHT, TITLE_HEIGHT,
};
use crate::view::{DisplayRow, Projection, project};

#[derive(Debug, PartialEq)]
pub enum Status {
    Ready,
    Quitting,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Screen {
    Landing,
    Upload,
    Table,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Modus {
    Table,
    Sidebar,
    CmdInput,
    FilterEditor,
    Popup,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SidebarEntry {
    Heading(&'static str),
    Search,
    FilterChip(String),
    FilterColumn(String),
    Visibility(String),
    Grouping(String),
}

impl SidebarEntry {
    fn selectable(&self) -> bool {
        !matches!(self, SidebarEntry::Heading(_))
    }
}

#[derive(Clone, Debug, Default)]
pub struct ColumnView {
    pub name: String,
    pub width: usize,
    pub data: Vec<String>,
}

/// The part of the projection that fits on screen.
#[derive(Clone, Debug, Default)]
pub struct TableWindow {
    pub columns: Vec<ColumnView>,
    /// One flag per rendered row, true for group headers.
    pub group_rows: Vec<bool>,
    pub selected_row: Option<usize>,
    pub selected_column: Option<usize>,
}

#[derive(Default, Clone, Debug)]
pub struct UILayout {
    pub width: usize,
    pub height: usize,
    pub sidebar_width: usize,
    pub table_width: usize,
    pub table_height: usize,
}

impl UILayout {
    pub fn from_values(sidebar_width: usize, ui_width: usize, ui_height: usize) -> Self {
        let layout = UILayout {
            width: ui_width,
            height: ui_height,
            sidebar_width,
            table_width: ui_width.saturating_sub(sidebar_width + SCROLLBAR_WIDTH),
            table_height: ui_height
                .saturating_sub(TITLE_HEIGHT + TABLE_HEADER_HEIGHT + STATUSLINE_HEIGHT),
        };
        trace!("Build UILayout: {:?}", layout);
        layout
    }
}

pub struct Model {
    config: CTConfig,
    pub status: Status,
    screen: Screen,
    modus: Modus,
    previous_modus: Modus,
    session: Session,
    working_set: WorkingSet,
    state: ViewState,
    projection: Projection,
    source_name: String,
    selected_row: usize,
    offset_row: usize,
    selected_column: usize,
    offset_column: usize,
    sidebar_cursor: usize,
    window: TableWindow,
    uilayout: UILayout,
    input: Inputter,
    last_input: InputResult,
    cmd_mode: Option<CMDMode>,
    search_before_edit: String,
    status_message: String,
}

impl Model {
    pub fn init(config: &CTConfig, ui_width: usize, ui_height: usize) -> Self {
        let state = ViewState::default();
        let sidebar_width = if state.sidebar_open {
            config.sidebar_width
        } else {
            0
        };
        Self {
            config: config.clone(),
            status: Status::Ready,
            screen: Screen::Landing,
            modus: Modus::Table,
            previous_modus: Modus::Table,
            session: Session::new(),
            working_set: WorkingSet::default(),
            state,
            projection: Projection::default(),
            source_name: String::new(),
            selected_row: 0,
            offset_row: 0,
            selected_column: 0,
            offset_column: 0,
            sidebar_cursor: 0,
            window: TableWindow::default(),
            uilayout: UILayout::from_values(sidebar_width, ui_width, ui_height),
            input: Inputter::default(),
            last_input: InputResult::default(),
            cmd_mode: None,
            search_before_edit: String::new(),
            status_message: "Press Enter to open a CSV file".to_string(),
        }
    }

    // -------------------- Accessors used by the ui ---------------------- //

    pub fn screen(&self) -> Screen {
        self.screen
    }

    pub fn modus(&self) -> Modus {
        self.modus
    }

    pub fn cmd_mode(&self) -> Option<CMDMode> {
        self.cmd_mode
    }

    pub fn cmd_input(&self) -> &InputResult {
        &self.last_input
    }

    pub fn state(&self) -> &ViewState {
        &self.state
    }

    pub fn working_set(&self) -> &WorkingSet {
        &self.working_set
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    pub fn window(&self) -> &TableWindow {
        &self.window
    }

    #[cfg(test)]
    pub fn layout(&self) -> &UILayout {
        &self.uilayout
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn status_message(&self) -> &str {
        &self.status_message
    }

    pub fn sidebar_cursor(&self) -> usize {
        self.sidebar_cursor
    }

    /// Absolute position of the cursor within the projection.
    pub fn selected_row(&self) -> usize {
        self.selected_row
    }

    pub fn has_data(&self) -> bool {
        !self.working_set.is_empty()
    }

    /// While true the controller forwards keys untouched.
    pub fn raw_keyevents(&self) -> bool {
        self.modus == Modus::CmdInput
    }

    pub fn sidebar_entries(&self) -> Vec<SidebarEntry> {
        let ws = &self.working_set;
        if ws.is_empty() {
            return Vec::new();
        }
        let mut entries = vec![SidebarEntry::Heading("Search"), SidebarEntry::Search];
        entries.push(SidebarEntry::Heading("Filters"));
        entries.extend(
            self.state
                .filters
                .iter()
                .map(|f| SidebarEntry::FilterChip(f.column.clone())),
        );
        entries.push(SidebarEntry::Heading("Select Column"));
        entries.extend(
            ws.columns
                .iter()
                .map(|c| SidebarEntry::FilterColumn(c.key.clone())),
        );
        entries.push(SidebarEntry::Heading("Visibility"));
        entries.extend(
            ws.columns
                .iter()
                .map(|c| SidebarEntry::Visibility(c.key.clone())),
        );
        entries.push(SidebarEntry::Heading("Grouping"));
        entries.extend(
            ws.columns
                .iter()
                .map(|c| SidebarEntry::Grouping(c.key.clone())),
        );
        entries
    }

    // -------------------- Loading ---------------------- //

    /// Parses a CSV file and hands the rows to the table screen through the session.
    pub fn open_file(&mut self, raw_path: &str) -> Result<(), CTError> {
        let path = ingest::expand_path(raw_path)?;
        let rows = match ingest::load_rows(&path) {
            Ok(rows) => rows,
            Err(CTError::PolarsError(e)) => {
                warn!(
                    "Parsing {} failed, continuing without data: {e}\n{}",
                    path.display(),
                    SpanTrace::capture()
                );
                Vec::new()
            }
            Err(e) => return Err(e),
        };
        self.session.store_rows(&rows)?;
        self.source_name = Self::file_name(&path);
        self.show_table();
        Ok(())
    }

    fn file_name(path: &Path) -> String {
        path.file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string()
    }

    fn show_table(&mut self) {
        let rows = self.session.load_rows().unwrap_or_else(|e| {
            warn!("Session data unreadable, showing no data: {e}");
            Vec::new()
        });
        self.working_set = WorkingSet::new(rows);
        self.state = ViewState::default();
        self.selected_row = 0;
        self.offset_row = 0;
        self.selected_column = 0;
        self.offset_column = 0;
        self.sidebar_cursor = 0;
        self.screen = Screen::Table;
        self.modus = Modus::Table;
        self.previous_modus = Modus::Table;
        self.cmd_mode = None;
        if self.has_data() {
            info!(
                "Showing {} rows from {}",
                self.working_set.rows.len(),
                self.source_name
            );
            self.set_status_message(format!(
                "Loaded {} rows from {}",
                self.working_set.rows.len(),
                self.source_name
            ));
        } else {
            self.set_status_message(NO_DATA_MESSAGE);
        }
        self.refresh();
    }

    fn go_upload(&mut self) {
        self.screen = Screen::Upload;
        self.previous_modus = self.modus;
        self.enter_cmd_mode(CMDMode::OpenPath, "");
        self.set_status_message("Enter the path of a CSV file");
    }

    // -------------------- Message handling ---------------------- //

    pub fn update(&mut self, message: Message) -> Result<(), CTError> {
        trace!(
            "Update: screen {:?}, modus {:?}, message {:?}",
            self.screen, self.modus, message
        );
        if let Message::Resize(width, height) = message {
            self.ui_resize(width, height);
            return Ok(());
        }
        if message == Message::Quit {
            self.quit();
            return Ok(());
        }

        match self.screen {
            Screen::Landing => {
                if message == Message::Enter {
                    self.go_upload();
                }
            }
            Screen::Upload => {
                if let Message::RawKey(key) = message {
                    self.raw_input(key)?;
                }
            }
            Screen::Table => self.update_table(message)?,
        }
        Ok(())
    }

    fn update_table(&mut self, message: Message) -> Result<(), CTError> {
        match self.modus {
            Modus::Table => match message {
                Message::MoveDown => self.move_selection(1, 0),
                Message::MoveUp => self.move_selection(-1, 0),
                Message::MoveLeft => self.move_selection(0, -1),
                Message::MoveRight => self.move_selection(0, 1),
                Message::MovePageUp => self.move_selection(-(self.page_size() as isize), 0),
                Message::MovePageDown => self.move_selection(self.page_size() as isize, 0),
                Message::MoveBeginning => {
                    self.selected_row = 0;
                    self.update_table_data();
                }
                Message::MoveEnd => {
                    self.selected_row = self.projection.rows.len().saturating_sub(1);
                    self.update_table_data();
                }
                Message::SwitchFocus if self.has_data() => {
                    if !self.state.sidebar_open {
                        self.dispatch(Action::ToggleSidebar);
                    }
                    self.modus = Modus::Sidebar;
                }
                Message::ToggleSidebar => self.dispatch(Action::ToggleSidebar),
                Message::Search if self.has_data() => self.start_search(),
                Message::FilterColumn => {
                    if let Some(key) = self.current_column_key() {
                        self.select_filter_column(key);
                    }
                }
                Message::ToggleVisibility => {
                    if let Some(key) = self.current_column_key() {
                        self.dispatch(Action::ToggleVisibility(key));
                    }
                }
                Message::ToggleGrouping => {
                    if let Some(key) = self.current_column_key() {
                        self.dispatch(Action::ToggleGrouping(key));
                    }
                }
                Message::SortAscending => self.sort_current_column(true),
                Message::SortDescending => self.sort_current_column(false),
                Message::ClearSort => self.dispatch(Action::ClearSort),
                Message::MoveColumnLeft => self.move_current_column(-1),
                Message::MoveColumnRight => self.move_current_column(1),
                Message::OpenFile => self.go_upload(),
                Message::Help => self.show_help(),
                _ => (),
            },
            Modus::Sidebar => match message {
                Message::MoveDown => self.move_sidebar_cursor(1),
                Message::MoveUp => self.move_sidebar_cursor(-1),
                Message::MovePageDown => self.move_sidebar_cursor(10),
                Message::MovePageUp => self.move_sidebar_cursor(-10),
                Message::Enter => self.activate_sidebar_entry(),
                Message::RemoveFilter => {
                    if let Some(SidebarEntry::FilterChip(column)) = self.current_sidebar_entry() {
                        self.dispatch(Action::RemoveFilter(column));
                    }
                }
                Message::SwitchFocus | Message::Exit => self.modus = Modus::Table,
                Message::ToggleSidebar => {
                    self.dispatch(Action::ToggleSidebar);
                    self.modus = Modus::Table;
                }
                Message::Search => self.start_search(),
                Message::Help => self.show_help(),
                _ => (),
            },
            Modus::FilterEditor => match message {
                Message::MoveLeft => self.dispatch(Action::NudgeFilterBound(-1)),
                Message::MoveRight => self.dispatch(Action::NudgeFilterBound(1)),
                Message::MovePageDown => self.dispatch(Action::NudgeFilterBound(-10)),
                Message::MovePageUp => self.dispatch(Action::NudgeFilterBound(10)),
                Message::SwitchFocus => self.dispatch(Action::SwitchFilterBound),
                Message::Enter => {
                    self.dispatch(Action::ApplyFilter);
                    self.close_filter_editor();
                }
                Message::RemoveFilter => {
                    if let FilterEditor::ColumnSelected {
                        column,
                        editing: true,
                        ..
                    } = &self.state.editor
                    {
                        let column = column.clone();
                        self.dispatch(Action::RemoveFilter(column));
                        self.close_filter_editor();
                    }
                }
                Message::Exit => {
                    self.dispatch(Action::CancelFilterEdit);
                    self.close_filter_editor();
                }
                _ => (),
            },
            Modus::Popup => match message {
                Message::Exit | Message::Enter | Message::Help => {
                    trace!("Close popup ...");
                    self.modus = self.previous_modus;
                }
                _ => (),
            },
            Modus::CmdInput => {
                if let Message::RawKey(key) = message {
                    self.raw_input(key)?;
                }
            }
        }
        Ok(())
    }

    /// Routes a view state change through the reducer and re-derives the projection.
    fn dispatch(&mut self, action: Action) {
        if let Err(e) = self.state.update(action, &self.working_set) {
            warn!("View state update rejected: {e}");
            self.set_status_message(e.to_string());
        }
        if !self.state.sidebar_open && self.modus == Modus::Sidebar {
            self.modus = Modus::Table;
        }
        self.refresh();
    }

    fn refresh(&mut self) {
        let sidebar_width = if self.state.sidebar_open && self.has_data() {
            self.config.sidebar_width
        } else {
            0
        };
        self.uilayout =
            UILayout::from_values(sidebar_width, self.uilayout.width, self.uilayout.height);
        self.projection = project(&self.working_set, &self.state);
        debug!(
            "Projection: {} display rows, {} columns, {} matched",
            self.projection.rows.len(),
            self.projection.columns.len(),
            self.projection.matched
        );
        self.move_sidebar_cursor(0);
        self.update_table_data();
    }

    fn quit(&mut self) {
        self.status = Status::Quitting;
    }

    fn ui_resize(&mut self, width: usize, height: usize) {
        trace!(
            "UI was resized! w:{}->{}, h:{}->{}",
            self.uilayout.width, width, self.uilayout.height, height
        );
        self.uilayout = UILayout::from_values(self.uilayout.sidebar_width, width, height);
        self.update_table_data();
    }

    fn show_help(&mut self) {
        self.previous_modus = self.modus;
        self.modus = Modus::Popup;
    }

    fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = message.into();
    }

    // -------------------- Input line ---------------------- //

    fn enter_cmd_mode(&mut self, mode: CMDMode, prefill: &str) {
        trace!("Entering command mode {mode:?} ...");
        if self.modus != Modus::CmdInput {
            self.previous_modus = self.modus;
        }
        self.modus = Modus::CmdInput;
        self.cmd_mode = Some(mode);
        self.input.set(prefill);
        self.last_input = self.input.get();
    }

    fn leave_cmd_mode(&mut self) {
        self.modus = match self.previous_modus {
            Modus::CmdInput | Modus::Popup => Modus::Table,
            m => m,
        };
        self.cmd_mode = None;
    }

    fn raw_input(&mut self, key: ratatui::crossterm::event::KeyEvent) -> Result<(), CTError> {
        self.last_input = self.input.read(key);
        if self.cmd_mode == Some(CMDMode::Search) && !self.last_input.finished {
            // Search narrows the table while typing.
            self.dispatch(Action::SetSearch(self.last_input.input.clone()));
        }
        if self.last_input.finished {
            self.handle_cmd_input()?;
        }
        Ok(())
    }

    fn handle_cmd_input(&mut self) -> Result<(), CTError> {
        let result = self.last_input.clone();
        trace!("Handle cmd input {:?}: {:?}", self.cmd_mode, result);
        match self.cmd_mode {
            Some(CMDMode::Search) => {
                let term = if result.canceled {
                    self.search_before_edit.clone()
                } else {
                    result.input
                };
                self.leave_cmd_mode();
                self.dispatch(Action::SetSearch(term));
                self.report_matches();
            }
            Some(CMDMode::FilterText) => {
                self.leave_cmd_mode();
                if result.canceled {
                    self.dispatch(Action::CancelFilterEdit);
                } else {
                    self.dispatch(Action::SetFilterValue(FilterValue::Text(result.input)));
                    self.dispatch(Action::ApplyFilter);
                    if self.state.editor != FilterEditor::Idle {
                        self.dispatch(Action::CancelFilterEdit);
                        self.set_status_message("Empty filter ignored");
                        return Ok(());
                    }
                }
                self.report_matches();
            }
            Some(CMDMode::OpenPath) => {
                if result.canceled {
                    self.leave_cmd_mode();
                    self.screen = if self.source_name.is_empty() {
                        Screen::Landing
                    } else {
                        Screen::Table
                    };
                } else if let Err(e) = self.open_file(&result.input) {
                    warn!("Cannot open {:?}: {e}", result.input);
                    self.set_status_message(format!("{e}: {}", result.input));
                    self.enter_cmd_mode(CMDMode::OpenPath, &result.input);
                }
            }
            None => {
                info!("Cmd mode is none!");
                self.leave_cmd_mode();
            }
        }
        Ok(())
    }

    fn start_search(&mut self) {
        self.search_before_edit = self.state.search.clone();
        let current = self.state.search.clone();
        self.enter_cmd_mode(CMDMode::Search, &current);
    }

    fn report_matches(&mut self) {
        self.set_status_message(format!(
            "Showing {} of {} rows",
            self.projection.matched,
            self.working_set.rows.len()
        ));
    }

    // -------------------- Filter editor ---------------------- //

    fn select_filter_column(&mut self, column: String) {
        self.dispatch(Action::SelectFilterColumn(column));
        self.open_filter_editor();
    }

    /// Shows the slider popup for ranges or the input line for text.
    fn open_filter_editor(&mut self) {
        let prefill = match &self.state.editor {
            FilterEditor::Idle => return,
            FilterEditor::ColumnSelected {
                value: FilterValue::Range(..),
                ..
            } => None,
            FilterEditor::ColumnSelected {
                value: FilterValue::Text(s),
                ..
            } => Some(s.clone()),
        };
        match prefill {
            None => {
                self.previous_modus = self.modus;
                self.modus = Modus::FilterEditor;
            }
            Some(text) => self.enter_cmd_mode(CMDMode::FilterText, &text),
        }
    }

    fn close_filter_editor(&mut self) {
        if self.state.editor == FilterEditor::Idle {
            self.modus = match self.previous_modus {
                Modus::Sidebar if self.state.sidebar_open => Modus::Sidebar,
                _ => Modus::Table,
            };
            self.report_matches();
        }
    }

    // -------------------- Side panel ---------------------- //

    fn current_sidebar_entry(&self) -> Option<SidebarEntry> {
        self.sidebar_entries().get(self.sidebar_cursor).cloned()
    }

    /// Moves by `delta` selectable entries, `0` snaps to the nearest selectable one.
    fn move_sidebar_cursor(&mut self, delta: isize) {
        let entries = self.sidebar_entries();
        let selectable: Vec<usize> = entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.selectable())
            .map(|(i, _)| i)
            .collect();
        if selectable.is_empty() {
            self.sidebar_cursor = 0;
            return;
        }
        let current = selectable
            .iter()
            .position(|&i| i >= self.sidebar_cursor)
            .unwrap_or(selectable.len() - 1);
        let target = current
            .saturating_add_signed(delta)
            .min(selectable.len() - 1);
        self.sidebar_cursor = selectable[target];
    }

    fn activate_sidebar_entry(&mut self) {
        let Some(entry) = self.current_sidebar_entry() else {
            return;
        };
        trace!("Activate sidebar entry {entry:?}");
        match entry {
            SidebarEntry::Heading(_) => {}
            SidebarEntry::Search => self.start_search(),
            SidebarEntry::FilterChip(column) => {
                self.dispatch(Action::EditFilter(column));
                self.open_filter_editor();
            }
            SidebarEntry::FilterColumn(column) => self.select_filter_column(column),
            SidebarEntry::Visibility(column) => self.dispatch(Action::ToggleVisibility(column)),
            SidebarEntry::Grouping(column) => self.dispatch(Action::ToggleGrouping(column)),
        }
    }

    // -------------------- Table navigation ---------------------- //

    fn current_column_key(&self) -> Option<String> {
        self.projection
            .columns
            .get(self.selected_column)
            .and_then(|&cidx| self.working_set.columns.get(cidx))
            .map(|c| c.key.clone())
    }

    fn page_size(&self) -> usize {
        std::cmp::max(self.uilayout.table_height, 1)
    }

    fn move_selection(&mut self, rows: isize, columns: isize) {
        self.selected_row = self.selected_row.saturating_add_signed(rows);
        self.selected_column = self.selected_column.saturating_add_signed(columns);
        self.update_table_data();
    }

    fn sort_current_column(&mut self, ascending: bool) {
        if let Some(column) = self.current_column_key() {
            self.dispatch(Action::SortBy { column, ascending });
        }
    }

    fn move_current_column(&mut self, delta: isize) {
        let Some(key) = self.current_column_key() else {
            return;
        };
        self.dispatch(Action::MoveColumn {
            column: key.clone(),
            delta,
        });
        // Keep the cursor on the moved column.
        let moved_to = self
            .projection
            .columns
            .iter()
            .position(|&cidx| self.working_set.columns[cidx].key == key);
        if let Some(pos) = moved_to {
            self.selected_column = pos;
            self.update_table_data();
        }
    }

    fn cell_text(&self, row: usize, cidx: usize) -> String {
        let key = &self.working_set.columns[cidx].key;
        match self.working_set.rows[row].get(key) {
            Some(v) => v.to_string().replace("\r\n", " ↵ ").replace('\n', " ↵ "),
            None => String::from("∅"),
        }
    }

    fn get_visible_name(name: &str, width: usize) -> String {
        if width < 3 {
            return String::new();
        }
        if name.chars().count() > width {
            let mut reduced: String = name.chars().take(width - 3).collect();
            reduced.push_str("...");
            reduced
        } else {
            name.to_string()
        }
    }

    /// Clamps the cursor, scrolls the window to it and rebuilds the rendered cells.
    fn update_table_data(&mut self) {
        if self.screen != Screen::Table || self.projection.rows.is_empty() {
            self.selected_row = 0;
            self.offset_row = 0;
            self.selected_column = std::cmp::min(
                self.selected_column,
                self.projection.columns.len().saturating_sub(1),
            );
            self.window = TableWindow {
                columns: self
                    .projection
                    .columns
                    .iter()
                    .map(|&cidx| ColumnView {
                        name: self.working_set.columns[cidx].label.clone(),
                        width: self.working_set.columns[cidx].label.chars().count()
                            + COLUMN_WIDTH_MARGIN,
                        data: Vec::new(),
                    })
                    .collect(),
                ..TableWindow::default()
            };
            return;
        }

        let height = self.page_size();
        let nrows = self.projection.rows.len();
        let ncols = self.projection.columns.len();
        self.selected_row = std::cmp::min(self.selected_row, nrows - 1);
        self.selected_column = std::cmp::min(self.selected_column, ncols.saturating_sub(1));

        if self.selected_row < self.offset_row {
            self.offset_row = self.selected_row;
        } else if self.selected_row >= self.offset_row + height {
            self.offset_row = self.selected_row + 1 - height;
        }
        let rbegin = self.offset_row;
        let rend = std::cmp::min(rbegin + height, nrows);
        let window_rows = &self.projection.rows[rbegin..rend];

        let widths: Vec<usize> = self
            .projection
            .columns
            .iter()
            .map(|&cidx| {
                let label = self.working_set.columns[cidx].label.chars().count();
                let content = window_rows
                    .iter()
                    .filter_map(|r| match r {
                        DisplayRow::Record { row, .. } => {
                            Some(self.cell_text(*row, cidx).chars().count())
                        }
                        DisplayRow::Group { .. } => None,
                    })
                    .max()
                    .unwrap_or(0);
                std::cmp::min(
                    std::cmp::max(label, content) + COLUMN_WIDTH_MARGIN,
                    self.config.max_column_width,
                )
            })
            .collect();

        if self.selected_column < self.offset_column {
            self.offset_column = self.selected_column;
        }
        let mut visible = Self::fit_columns(&widths, self.offset_column, self.uilayout.table_width);
        while self.offset_column < self.selected_column
            && !visible
                .iter()
                .any(|&(pos, w)| pos == self.selected_column && w == widths[pos])
        {
            self.offset_column += 1;
            visible = Self::fit_columns(&widths, self.offset_column, self.uilayout.table_width);
        }

        let mut columns = Vec::with_capacity(visible.len());
        for (vidx, &(pos, width)) in visible.iter().enumerate() {
            let cidx = self.projection.columns[pos];
            let data = window_rows
                .iter()
                .map(|r| match r {
                    DisplayRow::Record { depth, row } if vidx == 0 => {
                        format!("{}{}", "  ".repeat(*depth), self.cell_text(*row, cidx))
                    }
                    DisplayRow::Record { row, .. } => self.cell_text(*row, cidx),
                    DisplayRow::Group {
                        depth,
                        column,
                        label,
                        count,
                    } if vidx == 0 => {
                        format!("{}▾ {column}: {label} ({count})", "  ".repeat(*depth))
                    }
                    DisplayRow::Group { .. } => String::new(),
                })
                .collect();
            columns.push(ColumnView {
                name: Self::get_visible_name(&self.working_set.columns[cidx].label, width),
                width,
                data,
            });
        }

        self.window = TableWindow {
            selected_column: visible
                .iter()
                .position(|&(pos, _)| pos == self.selected_column),
            selected_row: Some(self.selected_row - rbegin),
            group_rows: window_rows
                .iter()
                .map(|r| matches!(r, DisplayRow::Group { .. }))
                .collect(),
            columns,
        };
    }

    /// Columns from `offset` that fit into `table_width`; the last one may be cut.
    fn fit_columns(widths: &[usize], offset: usize, table_width: usize) -> Vec<(usize, usize)> {
        let mut visible = Vec::new();
        let mut used = 0;
        for (pos, &width) in widths.iter().enumerate().skip(offset) {
            if used + width + 1 <= table_width {
                visible.push((pos, width));
                used += width + 1;
            } else {
                if used < table_width {
                    visible.push((pos, table_width - used));
                }
                break;
            }
        }
        visible
    }
}
