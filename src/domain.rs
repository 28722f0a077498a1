use std::fmt;
use std::io::Error;

use derive_setters::Setters;
use polars::error::PolarsError;
use ratatui::crossterm::event::KeyEvent;

#[derive(Debug)]
pub enum CTError {
    IoError(Error),
    PolarsError(PolarsError),
    Serialization(serde_json::Error),
    LoadingFailed(String),
    FileNotFound,
    PermissionDenied,
    UnknownFileType,
    UnknownColumn(String),
    NotNumeric(String),
    NoNumericValues(String),
}

impl fmt::Display for CTError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CTError::IoError(e) => write!(f, "I/O error: {e}"),
            CTError::PolarsError(e) => write!(f, "Parsing failed: {e}"),
            CTError::Serialization(e) => write!(f, "Session data is corrupt: {e}"),
            CTError::LoadingFailed(reason) => write!(f, "Loading failed: {reason}"),
            CTError::FileNotFound => write!(f, "File not found"),
            CTError::PermissionDenied => write!(f, "Permission denied"),
            CTError::UnknownFileType => write!(f, "Only .csv files are accepted"),
            CTError::UnknownColumn(c) => write!(f, "Unknown column \"{c}\""),
            CTError::NotNumeric(c) => write!(f, "Column \"{c}\" is not numeric"),
            CTError::NoNumericValues(c) => write!(f, "Column \"{c}\" holds no numeric values"),
        }
    }
}

impl std::error::Error for CTError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CTError::IoError(e) => Some(e),
            CTError::PolarsError(e) => Some(e),
            CTError::Serialization(e) => Some(e),
            _ => None,
        }
    }
}

impl From<Error> for CTError {
    fn from(err: Error) -> Self {
        CTError::IoError(err)
    }
}

impl From<PolarsError> for CTError {
    fn from(err: PolarsError) -> Self {
        CTError::PolarsError(err)
    }
}

impl From<serde_json::Error> for CTError {
    fn from(err: serde_json::Error) -> Self {
        CTError::Serialization(err)
    }
}

/// Runtime settings shared by the model, controller and ui.
#[derive(Debug, Clone, Setters)]
#[setters(prefix = "with_")]
pub struct CTConfig {
    /// Milliseconds to wait for a terminal event before redrawing.
    pub event_poll_time: u64,
    /// Upper bound for a rendered column, in characters.
    pub max_column_width: usize,
    /// Width of the side panel, in characters.
    pub sidebar_width: usize,
}

impl Default for CTConfig {
    fn default() -> Self {
        Self {
            event_poll_time: 100,
            max_column_width: 32,
            sidebar_width: 36,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Quit,
    Help,
    Exit,
    Enter,
    Resize(usize, usize),
    MoveUp,
    MoveDown,
    MoveLeft,
    MoveRight,
    MovePageUp,
    MovePageDown,
    MoveBeginning,
    MoveEnd,
    SwitchFocus,
    ToggleSidebar,
    Search,
    FilterColumn,
    RemoveFilter,
    ToggleVisibility,
    ToggleGrouping,
    SortAscending,
    SortDescending,
    ClearSort,
    MoveColumnLeft,
    MoveColumnRight,
    OpenFile,
    RawKey(KeyEvent),
}

/// What the active input line is collecting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CMDMode {
    Search,
    FilterText,
    OpenPath,
}

pub const NO_DATA_MESSAGE: &str = "No data available. Please upload a CSV file.";

pub const HELP_TEXT: &str = "\
Table
  ←↓↑→ / hjkl   move the cursor
  PgUp / PgDn   move one page
  Home / End    first / last row
  Tab           switch between table and panel
  b             show / hide the panel
  /             global search
  f             filter the current column
  v             hide the current column
  g             group by the current column
  s / S         sort ascending / descending
  x             clear sorting
  < / >         move the current column
  o             open another file
  ?             this help
  q             quit

Panel
  ↑↓            select an entry
  Enter         activate the entry
  d / Del       remove the selected filter

Filter editor
  ← →           move the active bound (PgUp / PgDn: 10 steps)
  Tab           switch between min and max
  Enter         apply the filter
  d             remove the filter being edited
  Esc           cancel";
