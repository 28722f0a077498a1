use ratatui::{
    Frame,
    layout::{Constraint, Flex, Layout, Rect},
    style::{Modifier, Style, Stylize},
    symbols::border,
    text::{Line, Span, Text},
    widgets::{
        Block, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Scrollbar,
        ScrollbarOrientation, ScrollbarState, Table, Wrap,
    },
};

use crate::columns::{ColumnRange, format_number};
use crate::domain::{CMDMode, CTConfig, HELP_TEXT, NO_DATA_MESSAGE};
use crate::filter::FilterValue;
use crate::model::{Modus, Model, Screen, SidebarEntry};
use crate::state::{FilterEditor, RangeBound};

pub const TITLE_HEIGHT: usize = 1;
pub const STATUSLINE_HEIGHT: usize = 1;
pub const TABLE_HEADER_HEIGHT: usize = 1;
pub const SCROLLBAR_WIDTH: usize = 1;
pub const COLUMN_WIDTH_MARGIN: usize = 1;

const FILTER_POPUP_WIDTH: u16 = 56;
const FILTER_POPUP_HEIGHT: u16 = 9;

#[derive(Debug)]
pub struct TableUI {
    sidebar_width: u16,
}

impl TableUI {
    pub fn new(config: &CTConfig) -> Self {
        Self {
            sidebar_width: config.sidebar_width as u16,
        }
    }

    pub fn draw(&self, model: &Model, frame: &mut Frame) {
        match model.screen() {
            Screen::Landing => self.draw_landing(model, frame),
            Screen::Upload => self.draw_upload(model, frame),
            Screen::Table => self.draw_table_screen(model, frame),
        }
    }

    fn draw_landing(&self, model: &Model, frame: &mut Frame) {
        let area = centered(frame.area(), 60, 9);
        let block = Block::bordered()
            .title(Line::from(" csvtv ".bold()).centered())
            .border_set(border::THICK);
        let text = Text::from(vec![
            Line::from("CSV Data Table".bold().magenta()),
            Line::from(""),
            Line::from("Open a CSV file and explore it with filters,"),
            Line::from("search, grouping and column toggles."),
            Line::from(""),
            Line::from(vec![
                " Open file ".into(),
                "<Enter>".blue().bold(),
                " Quit ".into(),
                "<Q> ".blue().bold(),
            ]),
            Line::from(model.status_message().dark_gray()),
        ]);
        frame.render_widget(Paragraph::new(text).centered().block(block), area);
    }

    fn draw_upload(&self, model: &Model, frame: &mut Frame) {
        let area = centered(frame.area(), 72, 8);
        let [heading, input_area, message] = Layout::vertical([
            Constraint::Length(2),
            Constraint::Length(3),
            Constraint::Length(2),
        ])
        .areas(area);

        frame.render_widget(
            Paragraph::new(vec![
                Line::from("Upload Your CSV File".bold().magenta()),
                Line::from("Type a path and press Enter, Esc to go back".dark_gray()),
            ])
            .centered(),
            heading,
        );

        let input = model.cmd_input();
        frame.render_widget(
            Paragraph::new(input.input.as_str()).block(
                Block::bordered()
                    .title(" Path ")
                    .border_set(border::ROUNDED),
            ),
            input_area,
        );
        frame.set_cursor_position((
            input_area.x + 1 + input.cursor_pos as u16,
            input_area.y + 1,
        ));

        frame.render_widget(
            Paragraph::new(model.status_message().yellow())
                .centered()
                .wrap(Wrap { trim: true }),
            message,
        );
    }

    fn draw_table_screen(&self, model: &Model, frame: &mut Frame) {
        let [title, body, statusline] = Layout::vertical([
            Constraint::Length(TITLE_HEIGHT as u16),
            Constraint::Min(0),
            Constraint::Length(STATUSLINE_HEIGHT as u16),
        ])
        .areas(frame.area());

        self.draw_title(model, frame, title);
        self.draw_statusline(model, frame, statusline);

        if !model.has_data() {
            let [_, middle, _] = Layout::vertical([
                Constraint::Fill(1),
                Constraint::Length(1),
                Constraint::Fill(1),
            ])
            .areas(body);
            frame.render_widget(Paragraph::new(NO_DATA_MESSAGE).centered(), middle);
            return;
        }

        let table_area = if model.state().sidebar_open {
            let [sidebar, table] =
                Layout::horizontal([Constraint::Length(self.sidebar_width), Constraint::Min(0)])
                    .areas(body);
            self.draw_sidebar(model, frame, sidebar);
            table
        } else {
            body
        };
        self.draw_table(model, frame, table_area);

        match model.modus() {
            Modus::FilterEditor => self.draw_filter_editor(model, frame),
            Modus::CmdInput if model.cmd_mode() == Some(CMDMode::FilterText) => {
                self.draw_filter_editor(model, frame)
            }
            Modus::Popup => self.draw_help(frame),
            _ => {}
        }
    }

    fn draw_title(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let ws = model.working_set();
        let mut spans = vec![
            " CSV Data Table ".bold().magenta(),
            Span::from(model.source_name().to_string()).yellow(),
        ];
        if model.has_data() {
            spans.push(Span::from(format!(
                "  {} of {} rows",
                model.projection().matched,
                ws.rows.len()
            )));
        }
        if let Some(sort) = &model.state().sorting {
            let arrow = if sort.ascending { "↑" } else { "↓" };
            spans.push(Span::from(format!("  sorted by {} {arrow}", sort.column)).dark_gray());
        }
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
    }

    fn draw_statusline(&self, model: &Model, frame: &mut Frame, area: Rect) {
        if model.cmd_mode() == Some(CMDMode::Search) {
            let input = model.cmd_input();
            frame.render_widget(
                Paragraph::new(Line::from(vec![
                    "/".blue().bold(),
                    Span::from(input.input.as_str()),
                ])),
                area,
            );
            frame.set_cursor_position((area.x + 1 + input.cursor_pos as u16, area.y));
            return;
        }
        let hints = match model.modus() {
            Modus::Sidebar => " Enter select  d remove  Tab table  ? help ",
            Modus::FilterEditor => " ←→ move  Tab bound  Enter apply  Esc cancel ",
            _ => " Tab panel  / search  f filter  ? help  q quit ",
        };
        let [message, help] = Layout::horizontal([
            Constraint::Min(0),
            Constraint::Length(hints.chars().count() as u16),
        ])
        .areas(area);
        frame.render_widget(Paragraph::new(model.status_message()), message);
        frame.render_widget(Paragraph::new(hints.dark_gray()), help);
    }

    fn draw_sidebar(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let state = model.state();
        let focused = model.modus() == Modus::Sidebar;
        let entries = model.sidebar_entries();

        let items: Vec<ListItem> = entries
            .iter()
            .map(|entry| {
                let line = match entry {
                    SidebarEntry::Heading(title) => Line::from((*title).bold().magenta()),
                    SidebarEntry::Search => {
                        if state.search.is_empty() {
                            Line::from("  🔍 (none)".dark_gray())
                        } else {
                            Line::from(format!("  🔍 {}", state.search))
                        }
                    }
                    SidebarEntry::FilterChip(column) => {
                        let label = state
                            .filters
                            .get(column)
                            .map(|f| f.label())
                            .unwrap_or_default();
                        Line::from(format!("  ● {label}")).cyan()
                    }
                    SidebarEntry::FilterColumn(column) => {
                        let numeric = model.working_set().is_numeric(column);
                        let marker = if state.editor_column() == Some(column.as_str()) {
                            "▸"
                        } else {
                            " "
                        };
                        Line::from(vec![
                            Span::from(format!(" {marker} {column} ")),
                            Span::from(if numeric { "#" } else { "abc" }).dark_gray(),
                        ])
                    }
                    SidebarEntry::Visibility(column) => {
                        Line::from(toggle_label(column, state.is_visible(column)))
                    }
                    SidebarEntry::Grouping(column) => {
                        Line::from(toggle_label(column, state.is_grouped(column)))
                    }
                };
                ListItem::new(line)
            })
            .collect();

        let border_style = if focused {
            Style::new().blue()
        } else {
            Style::new().dark_gray()
        };
        let list = List::new(items)
            .block(
                Block::bordered()
                    .title(" Table Controls ")
                    .border_style(border_style),
            )
            .highlight_style(if focused {
                Style::new().add_modifier(Modifier::REVERSED)
            } else {
                Style::new()
            });
        let mut list_state = ListState::default().with_selected(Some(model.sidebar_cursor()));
        frame.render_stateful_widget(list, area, &mut list_state);
    }

    fn draw_table(&self, model: &Model, frame: &mut Frame, area: Rect) {
        let window = model.window();
        let table_focused = model.modus() != Modus::Sidebar;
        let [table_area, scrollbar_area] = Layout::horizontal([
            Constraint::Min(0),
            Constraint::Length(SCROLLBAR_WIDTH as u16),
        ])
        .areas(area);

        let header = Row::new(
            window
                .columns
                .iter()
                .map(|c| Cell::from(c.name.clone()).bold().underlined()),
        );

        let nrows = window.group_rows.len();
        let rows: Vec<Row> = (0..nrows)
            .map(|ridx| {
                let is_group = window.group_rows[ridx];
                let selected_row = window.selected_row == Some(ridx);
                let cells = window.columns.iter().enumerate().map(|(cidx, column)| {
                    let text = column.data.get(ridx).cloned().unwrap_or_default();
                    let mut style = Style::new();
                    if is_group {
                        style = style.bold().magenta();
                    }
                    if selected_row && table_focused {
                        style = if window.selected_column == Some(cidx) {
                            style.add_modifier(Modifier::REVERSED)
                        } else {
                            style.on_dark_gray()
                        };
                    }
                    Cell::from(text).style(style)
                });
                Row::new(cells)
            })
            .collect();

        let widths: Vec<Constraint> = window
            .columns
            .iter()
            .map(|c| Constraint::Length(c.width as u16))
            .collect();
        let table = Table::new(rows, widths).header(header).column_spacing(1);
        frame.render_widget(table, table_area);

        let total = model.projection().rows.len();
        let position = model.selected_row();
        let mut scrollbar_state = ScrollbarState::new(total).position(position);
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight),
            scrollbar_area,
            &mut scrollbar_state,
        );
    }

    fn draw_filter_editor(&self, model: &Model, frame: &mut Frame) {
        let FilterEditor::ColumnSelected {
            column,
            value,
            editing,
            bound,
        } = &model.state().editor
        else {
            return;
        };
        let area = centered(frame.area(), FILTER_POPUP_WIDTH, FILTER_POPUP_HEIGHT);
        let action = if *editing {
            "Update Filter"
        } else {
            "Apply Filter"
        };
        let block = Block::bordered()
            .title(format!(" Filter: {column} "))
            .title_bottom(Line::from(format!(" Enter {action}  Esc cancel ")).centered())
            .border_set(border::ROUNDED);
        let inner = block.inner(area);
        frame.render_widget(Clear, area);
        frame.render_widget(block, area);

        match value {
            FilterValue::Range(low, high) => {
                let Ok(range) = model.working_set().column_range(column) else {
                    return;
                };
                let slider_width = inner.width.saturating_sub(2) as usize;
                let bound_style = |b: RangeBound| {
                    if b == *bound {
                        Style::new().bold().reversed()
                    } else {
                        Style::new()
                    }
                };
                let text = Text::from(vec![
                    Line::from(""),
                    Line::from(slider_line(&range, *low, *high, slider_width)).centered(),
                    Line::from(vec![
                        Span::from(format!("Min : {}", format_number(range.low))),
                        Span::from("   "),
                        Span::from(format!("Max : {}", format_number(range.high))),
                    ])
                    .centered(),
                    Line::from(""),
                    Line::from(vec![
                        Span::styled(format!(" {} ", format_number(*low)), bound_style(RangeBound::Low)),
                        Span::from(" - "),
                        Span::styled(
                            format!(" {} ", format_number(*high)),
                            bound_style(RangeBound::High),
                        ),
                    ])
                    .centered(),
                    Line::from("←→ move  PgUp/PgDn ×10  Tab switch bound".dark_gray()).centered(),
                ]);
                frame.render_widget(Paragraph::new(text), inner);
            }
            FilterValue::Text(_) => {
                let input = model.cmd_input();
                let [label, field] =
                    Layout::vertical([Constraint::Length(2), Constraint::Length(3)]).areas(inner);
                frame.render_widget(
                    Paragraph::new(vec![
                        Line::from(""),
                        Line::from(" Filter Value (case-insensitive substring)".dark_gray()),
                    ]),
                    label,
                );
                frame.render_widget(
                    Paragraph::new(input.input.as_str())
                        .block(Block::bordered().border_set(border::PLAIN)),
                    field,
                );
                frame.set_cursor_position((field.x + 1 + input.cursor_pos as u16, field.y + 1));
            }
        }
    }

    fn draw_help(&self, frame: &mut Frame) {
        let lines = HELP_TEXT.lines().count() as u16;
        let area = centered(frame.area(), 60, lines + 2);
        frame.render_widget(Clear, area);
        frame.render_widget(
            Paragraph::new(HELP_TEXT).block(
                Block::bordered()
                    .title(" Help ")
                    .title_bottom(Line::from(" Esc to close ").centered())
                    .border_set(border::THICK),
            ),
            area,
        );
    }
}

fn toggle_label(column: &str, on: bool) -> String {
    format!("  [{}] {column}", if on { "x" } else { " " })
}

/// A track of `width` cells with the selected `[low, high]` part highlighted.
fn slider_line(range: &ColumnRange, low: f64, high: f64, width: usize) -> String {
    if width == 0 {
        return String::new();
    }
    let span = range.high - range.low;
    let pos = |v: f64| -> usize {
        if span <= 0.0 {
            return 0;
        }
        let rel = ((v - range.low) / span).clamp(0.0, 1.0);
        (rel * (width - 1) as f64).round() as usize
    };
    let (lo, hi) = (pos(low), pos(high));
    (0..width)
        .map(|i| {
            if i == lo || i == hi {
                '●'
            } else if i > lo && i < hi {
                '━'
            } else {
                '─'
            }
        })
        .collect()
}

fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let [vertical] = Layout::vertical([Constraint::Length(height)])
        .flex(Flex::Center)
        .areas(area);
    let [rect] = Layout::horizontal([Constraint::Length(width)])
        .flex(Flex::Center)
        .areas(vertical);
    rect
}
