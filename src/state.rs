use std::collections::HashMap;

use tracing::{debug, trace};

use crate::columns::WorkingSet;
use crate::domain::CTError;
use crate::filter::{Filter, FilterSet, FilterValue};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum RangeBound {
    #[default]
    Low,
    High,
}

/// Filter editing session.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FilterEditor {
    #[default]
    Idle,
    ColumnSelected {
        column: String,
        value: FilterValue,
        /// True when an existing filter was reopened.
        editing: bool,
        bound: RangeBound,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct SortOrder {
    pub column: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    SelectFilterColumn(String),
    SetFilterValue(FilterValue),
    NudgeFilterBound(i32),
    SwitchFilterBound,
    ApplyFilter,
    EditFilter(String),
    RemoveFilter(String),
    CancelFilterEdit,
    ToggleVisibility(String),
    ToggleGrouping(String),
    SetSearch(String),
    ToggleSidebar,
    MoveColumn { column: String, delta: isize },
    SortBy { column: String, ascending: bool },
    ClearSort,
}

/// Everything the user can change about how the working set is shown.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub filters: FilterSet,
    pub column_visibility: HashMap<String, bool>,
    pub grouping: Vec<String>,
    pub column_order: Vec<String>,
    pub sorting: Option<SortOrder>,
    pub search: String,
    pub editor: FilterEditor,
    pub sidebar_open: bool,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            filters: FilterSet::new(),
            column_visibility: HashMap::new(),
            grouping: Vec::new(),
            column_order: Vec::new(),
            sorting: None,
            search: String::new(),
            editor: FilterEditor::Idle,
            sidebar_open: true,
        }
    }
}

impl ViewState {
    pub fn is_visible(&self, column: &str) -> bool {
        self.column_visibility.get(column).copied().unwrap_or(true)
    }

    pub fn is_grouped(&self, column: &str) -> bool {
        self.grouping.iter().any(|c| c == column)
    }

    /// Column keys in display order, before grouping and visibility are applied.
    pub fn ordered_columns<'a>(&'a self, ws: &'a WorkingSet) -> Vec<&'a str> {
        if self.column_order.is_empty() {
            ws.columns.iter().map(|c| c.key.as_str()).collect()
        } else {
            self.column_order.iter().map(String::as_str).collect()
        }
    }

    pub fn update(&mut self, action: Action, ws: &WorkingSet) -> Result<(), CTError> {
        trace!("ViewState action {action:?}");
        match action {
            Action::SelectFilterColumn(column) => self.select_filter_column(column, ws)?,
            Action::SetFilterValue(new_value) => {
                if let FilterEditor::ColumnSelected { value, .. } = &mut self.editor {
                    *value = new_value;
                }
            }
            Action::NudgeFilterBound(steps) => self.nudge_filter_bound(steps, ws)?,
            Action::SwitchFilterBound => {
                if let FilterEditor::ColumnSelected { bound, .. } = &mut self.editor {
                    *bound = match bound {
                        RangeBound::Low => RangeBound::High,
                        RangeBound::High => RangeBound::Low,
                    };
                }
            }
            Action::ApplyFilter => self.apply_filter(),
            Action::EditFilter(column) => {
                if let Some(filter) = self.filters.get(&column) {
                    self.editor = FilterEditor::ColumnSelected {
                        value: filter.value.clone(),
                        column,
                        editing: true,
                        bound: RangeBound::Low,
                    };
                }
            }
            Action::RemoveFilter(column) => {
                let removed = self.filters.remove(&column);
                debug!("Remove filter for \"{column}\": {removed}");
                if self.editor_column() == Some(column.as_str()) {
                    self.editor = FilterEditor::Idle;
                }
            }
            Action::CancelFilterEdit => self.editor = FilterEditor::Idle,
            Action::ToggleVisibility(column) => {
                let visible = self.is_visible(&column);
                self.column_visibility.insert(column, !visible);
            }
            Action::ToggleGrouping(column) => {
                if self.is_grouped(&column) {
                    self.grouping.retain(|c| *c != column);
                } else {
                    self.grouping.push(column);
                }
            }
            Action::SetSearch(term) => self.search = term,
            Action::ToggleSidebar => self.sidebar_open = !self.sidebar_open,
            Action::MoveColumn { column, delta } => self.move_column(&column, delta, ws),
            Action::SortBy { column, ascending } => {
                if ws.column(&column).is_none() {
                    return Err(CTError::UnknownColumn(column));
                }
                self.sorting = Some(SortOrder { column, ascending });
            }
            Action::ClearSort => self.sorting = None,
        }
        Ok(())
    }

    pub fn editor_column(&self) -> Option<&str> {
        match &self.editor {
            FilterEditor::Idle => None,
            FilterEditor::ColumnSelected { column, .. } => Some(column),
        }
    }

    fn select_filter_column(&mut self, column: String, ws: &WorkingSet) -> Result<(), CTError> {
        let descriptor = ws
            .column(&column)
            .ok_or_else(|| CTError::UnknownColumn(column.clone()))?;
        let value = if descriptor.numeric {
            let range = ws.column_range(&column)?;
            FilterValue::Range(range.low, range.high)
        } else {
            FilterValue::Text(String::new())
        };
        self.editor = FilterEditor::ColumnSelected {
            column,
            value,
            editing: false,
            bound: RangeBound::Low,
        };
        Ok(())
    }

    fn nudge_filter_bound(&mut self, steps: i32, ws: &WorkingSet) -> Result<(), CTError> {
        let FilterEditor::ColumnSelected {
            column,
            value: FilterValue::Range(low, high),
            bound,
            ..
        } = &mut self.editor
        else {
            return Ok(());
        };
        let range = ws.column_range(column)?;
        let delta = range.step() * f64::from(steps);
        match bound {
            RangeBound::Low => *low = range.clamp(*low + delta).min(*high),
            RangeBound::High => *high = range.clamp(*high + delta).max(*low),
        }
        Ok(())
    }

    fn apply_filter(&mut self) {
        let FilterEditor::ColumnSelected { column, value, .. } = &self.editor else {
            return;
        };
        if value.is_empty() {
            trace!("Ignoring empty filter for \"{column}\"");
            return;
        }
        self.filters.apply(Filter::new(column.clone(), value.clone()));
        debug!("Active filters: {:?}", self.filters);
        self.editor = FilterEditor::Idle;
    }

    fn move_column(&mut self, column: &str, delta: isize, ws: &WorkingSet) {
        if self.column_order.is_empty() {
            self.column_order = ws.columns.iter().map(|c| c.key.clone()).collect();
        }
        let Some(pos) = self.column_order.iter().position(|c| c == column) else {
            return;
        };
        let target = pos.saturating_add_signed(delta);
        if target < self.column_order.len() && target != pos {
            let key = self.column_order.remove(pos);
            self.column_order.insert(target, key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{Row, Value};

    fn working_set() -> WorkingSet {
        WorkingSet::new(vec![
            Row::from_cells([("x", Value::Number(10.0)), ("name", Value::Text("abc".into()))]),
            Row::from_cells([("x", Value::Number(110.0)), ("name", Value::Text("xyz".into()))]),
        ])
    }

    #[test]
    fn selecting_seeds_editor_value() {
        let ws = working_set();
        let mut state = ViewState::default();

        state.update(Action::SelectFilterColumn("x".into()), &ws).unwrap();
        assert_eq!(
            state.editor,
            FilterEditor::ColumnSelected {
                column: "x".into(),
                value: FilterValue::Range(0.0, 120.0),
                editing: false,
                bound: RangeBound::Low,
            }
        );

        state.update(Action::SelectFilterColumn("name".into()), &ws).unwrap();
        assert!(matches!(
            &state.editor,
            FilterEditor::ColumnSelected { value: FilterValue::Text(s), .. } if s.is_empty()
        ));

        let err = state.update(Action::SelectFilterColumn("nope".into()), &ws);
        assert!(matches!(err, Err(CTError::UnknownColumn(_))));
    }

    #[test]
    fn apply_inserts_and_returns_to_idle() {
        let ws = working_set();
        let mut state = ViewState::default();
        state.update(Action::SelectFilterColumn("name".into()), &ws).unwrap();

        // Empty text is not applied.
        state.update(Action::ApplyFilter, &ws).unwrap();
        assert!(state.filters.is_empty());
        assert_ne!(state.editor, FilterEditor::Idle);

        state
            .update(Action::SetFilterValue(FilterValue::Text("ab".into())), &ws)
            .unwrap();
        state.update(Action::ApplyFilter, &ws).unwrap();
        assert_eq!(state.editor, FilterEditor::Idle);
        assert_eq!(state.filters.len(), 1);
    }

    #[test]
    fn applying_twice_keeps_second_value() {
        let ws = working_set();
        let mut state = ViewState::default();
        for needle in ["ab", "xy"] {
            state.update(Action::SelectFilterColumn("name".into()), &ws).unwrap();
            state
                .update(Action::SetFilterValue(FilterValue::Text(needle.into())), &ws)
                .unwrap();
            state.update(Action::ApplyFilter, &ws).unwrap();
        }
        assert_eq!(state.filters.len(), 1);
        assert_eq!(
            state.filters.get("name").map(|f| &f.value),
            Some(&FilterValue::Text("xy".into()))
        );
    }

    #[test]
    fn edit_prefills_and_remove_returns_to_idle() {
        let ws = working_set();
        let mut state = ViewState::default();
        state.update(Action::SelectFilterColumn("x".into()), &ws).unwrap();
        state
            .update(Action::SetFilterValue(FilterValue::Range(5.0, 50.0)), &ws)
            .unwrap();
        state.update(Action::ApplyFilter, &ws).unwrap();

        state.update(Action::EditFilter("x".into()), &ws).unwrap();
        assert_eq!(
            state.editor,
            FilterEditor::ColumnSelected {
                column: "x".into(),
                value: FilterValue::Range(5.0, 50.0),
                editing: true,
                bound: RangeBound::Low,
            }
        );

        state.update(Action::RemoveFilter("x".into()), &ws).unwrap();
        assert_eq!(state.editor, FilterEditor::Idle);
        assert!(state.filters.is_empty());

        // Editing a filter that does not exist keeps the editor idle.
        state.update(Action::EditFilter("x".into()), &ws).unwrap();
        assert_eq!(state.editor, FilterEditor::Idle);
    }

    #[test]
    fn nudging_stays_within_range_and_order() {
        let ws = working_set();
        let mut state = ViewState::default();
        state.update(Action::SelectFilterColumn("x".into()), &ws).unwrap();

        // step is 1.2, low starts at 0
        state.update(Action::NudgeFilterBound(-5), &ws).unwrap();
        state.update(Action::NudgeFilterBound(10), &ws).unwrap();
        state.update(Action::SwitchFilterBound, &ws).unwrap();
        state.update(Action::NudgeFilterBound(-1000), &ws).unwrap();

        let FilterEditor::ColumnSelected { value: FilterValue::Range(low, high), bound, .. } =
            &state.editor
        else {
            panic!("editor should hold a range");
        };
        assert!((low - 12.0).abs() < 1e-9);
        assert!((high - 12.0).abs() < 1e-9);
        assert_eq!(*bound, RangeBound::High);
    }

    #[test]
    fn cancel_keeps_filters() {
        let ws = working_set();
        let mut state = ViewState::default();
        state.update(Action::SelectFilterColumn("name".into()), &ws).unwrap();
        state
            .update(Action::SetFilterValue(FilterValue::Text("a".into())), &ws)
            .unwrap();
        state.update(Action::ApplyFilter, &ws).unwrap();
        state.update(Action::EditFilter("name".into()), &ws).unwrap();
        state.update(Action::CancelFilterEdit, &ws).unwrap();
        assert_eq!(state.editor, FilterEditor::Idle);
        assert_eq!(state.filters.len(), 1);
    }

    #[test]
    fn visibility_defaults_to_visible_and_flips() {
        let ws = working_set();
        let mut state = ViewState::default();
        assert!(state.is_visible("x"));
        state.update(Action::ToggleVisibility("x".into()), &ws).unwrap();
        assert!(!state.is_visible("x"));
        state.update(Action::ToggleVisibility("x".into()), &ws).unwrap();
        assert!(state.is_visible("x"));
    }

    #[test]
    fn grouping_is_an_ordered_set() {
        let ws = working_set();
        let mut state = ViewState::default();
        state.update(Action::ToggleGrouping("name".into()), &ws).unwrap();
        state.update(Action::ToggleGrouping("x".into()), &ws).unwrap();
        assert_eq!(state.grouping, vec!["name", "x"]);
        state.update(Action::ToggleGrouping("name".into()), &ws).unwrap();
        assert_eq!(state.grouping, vec!["x"]);
    }

    #[test]
    fn columns_can_be_reordered() {
        let ws = working_set();
        let mut state = ViewState::default();
        assert_eq!(state.ordered_columns(&ws), vec!["x", "name"]);

        state
            .update(Action::MoveColumn { column: "x".into(), delta: 1 }, &ws)
            .unwrap();
        assert_eq!(state.ordered_columns(&ws), vec!["name", "x"]);

        // Moving past the edge is ignored.
        state
            .update(Action::MoveColumn { column: "x".into(), delta: 1 }, &ws)
            .unwrap();
        state
            .update(Action::MoveColumn { column: "name".into(), delta: -1 }, &ws)
            .unwrap();
        assert_eq!(state.ordered_columns(&ws), vec!["name", "x"]);
    }

    #[test]
    fn search_sort_and_sidebar() {
        let ws = working_set();
        let mut state = ViewState::default();
        state.update(Action::SetSearch("abc".into()), &ws).unwrap();
        state.update(Action::ToggleSidebar, &ws).unwrap();
        state
            .update(Action::SortBy { column: "x".into(), ascending: false }, &ws)
            .unwrap();
        assert_eq!(state.search, "abc");
        assert!(!state.sidebar_open);
        assert_eq!(
            state.sorting,
            Some(SortOrder { column: "x".into(), ascending: false })
        );
        assert!(state
            .update(Action::SortBy { column: "zzz".into(), ascending: true }, &ws)
            .is_err());
        state.update(Action::ClearSort, &ws).unwrap();
        assert_eq!(state.sorting, None);
    }
}
