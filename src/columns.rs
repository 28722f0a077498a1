use std::sync::Arc;

use tracing::debug;

use crate::domain::CTError;
use crate::value::{Row, Value};

/// Derived metadata for one CSV field.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub key: String,
    pub label: String,
    pub numeric: bool,
}

/// Slider bounds for a numeric column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnRange {
    pub low: f64,
    pub high: f64,
}

impl ColumnRange {
    pub fn step(&self) -> f64 {
        (self.high - self.low) / 100.0
    }

    pub fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.low, self.high)
    }
}

/// One descriptor per key of the first row, classified by that row only.
///
/// Keys that only show up in later rows are not part of the column model.
pub fn derive_columns(rows: &[Row]) -> Vec<ColumnDescriptor> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    first
        .iter()
        .map(|(key, value)| ColumnDescriptor {
            key: key.to_string(),
            label: key.to_string(),
            numeric: value.is_number(),
        })
        .collect()
}

/// Short label used on filter chips and slider captions.
pub fn format_number(value: f64) -> String {
    if value >= 1_000_000.0 {
        format!("{:.1}M", value / 1_000_000.0)
    } else if value >= 1_000.0 {
        format!("{:.1}K", value / 1_000.0)
    } else {
        format!("{value:.1}")
    }
}

/// The full in-memory row sequence currently loaded for display.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    pub rows: Arc<Vec<Row>>,
    pub columns: Vec<ColumnDescriptor>,
}

impl WorkingSet {
    pub fn new(rows: Vec<Row>) -> Self {
        let columns = derive_columns(&rows);
        debug!(
            "Working set: {} rows, columns {:?}",
            rows.len(),
            columns
                .iter()
                .map(|c| (c.key.as_str(), c.numeric))
                .collect::<Vec<_>>()
        );
        Self {
            rows: Arc::new(rows),
            columns,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column(&self, key: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.key == key)
    }

    pub fn column_index(&self, key: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.key == key)
    }

    pub fn is_numeric(&self, key: &str) -> bool {
        self.column(key).is_some_and(|c| c.numeric)
    }

    /// `[min - 10%, max + 10%]` over the numeric values of a numeric column.
    ///
    /// Text or missing cells are left out of the computation.
    pub fn column_range(&self, key: &str) -> Result<ColumnRange, CTError> {
        let column = self
            .column(key)
            .ok_or_else(|| CTError::UnknownColumn(key.to_string()))?;
        if !column.numeric {
            return Err(CTError::NotNumeric(key.to_string()));
        }

        let (min, max) = self
            .rows
            .iter()
            .filter_map(|row| row.get(key).and_then(Value::as_number))
            .fold(None, |acc: Option<(f64, f64)>, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
            .ok_or_else(|| CTError::NoNumericValues(key.to_string()))?;

        let range = max - min;
        Ok(ColumnRange {
            low: min - range * 0.1,
            high: max + range * 0.1,
        })
    }
}
