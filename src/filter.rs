use crate::columns::format_number;
use crate::value::{Row, Value};

#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Inclusive `[low, high]`.
    Range(f64, f64),
    /// Case-insensitive substring.
    Text(String),
}

impl FilterValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, FilterValue::Text(s) if s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: FilterValue,
}

impl Filter {
    pub fn new(column: impl Into<String>, value: FilterValue) -> Self {
        Self {
            column: column.into(),
            value,
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        let Some(cell) = row.get(&self.column) else {
            return false;
        };
        match &self.value {
            FilterValue::Range(low, high) => match cell {
                Value::Number(n) => *low <= *n && *n <= *high,
                Value::Text(_) => false,
            },
            FilterValue::Text(needle) => contains_ignore_case(&cell.to_string(), needle),
        }
    }

    pub fn label(&self) -> String {
        match &self.value {
            FilterValue::Range(low, high) => format!(
                "{}: {} - {}",
                self.column,
                format_number(*low),
                format_number(*high)
            ),
            FilterValue::Text(needle) => format!("{}: {}", self.column, needle),
        }
    }
}

pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

/// Active filters, at most one per column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    filters: Vec<Filter>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the filter of the same column in place, otherwise appends.
    pub fn apply(&mut self, filter: Filter) {
        match self.filters.iter_mut().find(|f| f.column == filter.column) {
            Some(existing) => *existing = filter,
            None => self.filters.push(filter),
        }
    }

    pub fn remove(&mut self, column: &str) -> bool {
        let before = self.filters.len();
        self.filters.retain(|f| f.column != column);
        before != self.filters.len()
    }

    pub fn get(&self, column: &str) -> Option<&Filter> {
        self.filters.iter().find(|f| f.column == column)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Filter> {
        self.filters.iter()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select<'a>(filter: &Filter, rows: &'a [Row]) -> Vec<&'a Row> {
        rows.iter().filter(|r| filter.matches(r)).collect()
    }

    #[test]
    fn numeric_range_is_inclusive() {
        let rows: Vec<Row> = [5.0, 15.0, 25.0, 10.0, 20.0]
            .iter()
            .map(|&x| Row::from_cells([("x", Value::Number(x))]))
            .collect();
        let filter = Filter::new("x", FilterValue::Range(10.0, 20.0));
        let selected: Vec<f64> = select(&filter, &rows)
            .iter()
            .filter_map(|r| r.get("x").and_then(Value::as_number))
            .collect();
        assert_eq!(selected, vec![15.0, 10.0, 20.0]);
    }

    #[test]
    fn numeric_range_selects_middle_row() {
        let rows: Vec<Row> = [5.0, 15.0, 25.0]
            .iter()
            .map(|&x| Row::from_cells([("x", Value::Number(x))]))
            .collect();
        let filter = Filter::new("x", FilterValue::Range(10.0, 20.0));
        assert_eq!(select(&filter, &rows), vec![&rows[1]]);
    }

    #[test]
    fn text_filter_ignores_case() {
        let rows = vec![
            Row::from_cells([("name", Value::Text("abc".into()))]),
            Row::from_cells([("name", Value::Text("xyz".into()))]),
            Row::from_cells([("name", Value::Text("XABY".into()))]),
        ];
        let filter = Filter::new("name", FilterValue::Text("ab".into()));
        assert_eq!(select(&filter, &rows), vec![&rows[0], &rows[2]]);

        let upper = Filter::new("name", FilterValue::Text("AB".into()));
        assert_eq!(select(&upper, &rows[..2]), vec![&rows[0]]);
    }

    #[test]
    fn text_filter_matches_stringified_numbers() {
        let row = Row::from_cells([("x", Value::Number(150.0))]);
        assert!(Filter::new("x", FilterValue::Text("15".into())).matches(&row));
        assert!(!Filter::new("x", FilterValue::Text("1.5".into())).matches(&row));
    }

    #[test]
    fn range_filter_rejects_text_and_missing_cells() {
        let filter = Filter::new("x", FilterValue::Range(0.0, 100.0));
        assert!(!filter.matches(&Row::from_cells([("x", Value::Text("50".into()))])));
        assert!(!filter.matches(&Row::from_cells([("y", Value::Number(50.0))])));
    }

    #[test]
    fn apply_replaces_existing_filter() {
        let mut set = FilterSet::new();
        set.apply(Filter::new("a", FilterValue::Text("one".into())));
        set.apply(Filter::new("b", FilterValue::Range(1.0, 2.0)));
        set.apply(Filter::new("a", FilterValue::Text("two".into())));

        assert_eq!(set.len(), 2);
        assert_eq!(set.get("a").map(|f| &f.value), Some(&FilterValue::Text("two".into())));
        let order: Vec<&str> = set.iter().map(|f| f.column.as_str()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn removing_unknown_filter_is_noop() {
        let mut set = FilterSet::new();
        set.apply(Filter::new("a", FilterValue::Text("one".into())));
        let before = set.clone();
        assert!(!set.remove("zzz"));
        assert_eq!(set, before);
        assert!(set.remove("a"));
        assert!(set.is_empty());
    }

    #[test]
    fn set_requires_all_filters() {
        let mut set = FilterSet::new();
        set.apply(Filter::new("x", FilterValue::Range(0.0, 10.0)));
        set.apply(Filter::new("name", FilterValue::Text("a".into())));
        let hit = Row::from_cells([("x", Value::Number(3.0)), ("name", Value::Text("Anna".into()))]);
        let miss = Row::from_cells([("x", Value::Number(30.0)), ("name", Value::Text("Anna".into()))]);
        assert!(set.matches(&hit));
        assert!(!set.matches(&miss));
        assert!(FilterSet::new().matches(&miss));
    }

    #[test]
    fn chip_labels() {
        assert_eq!(
            Filter::new("price", FilterValue::Range(1_500.0, 2_000_000.0)).label(),
            "price: 1.5K - 2.0M"
        );
        assert_eq!(Filter::new("name", FilterValue::Text("ab".into())).label(), "name: ab");
    }
}
