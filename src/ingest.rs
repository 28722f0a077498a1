use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;

use polars::prelude::*;
use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::domain::CTError;
use crate::value::{Row, Value};

#[derive(Debug)]
pub struct FileInfo {
    pub path: PathBuf,
    pub file_size: u64,
}

/// Expands `~` and environment variables in a user supplied path.
pub fn expand_path(raw: &str) -> Result<PathBuf, CTError> {
    let expanded = shellexpand::full(raw.trim())
        .map_err(|e| CTError::LoadingFailed(format!("Cannot expand path: {e}")))?;
    Ok(PathBuf::from(expanded.as_ref()))
}

pub fn get_file_info(path: &Path) -> Result<FileInfo, CTError> {
    let metadata = fs::metadata(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => CTError::FileNotFound,
        ErrorKind::PermissionDenied => CTError::PermissionDenied,
        _ => CTError::IoError(e),
    })?;
    if !metadata.is_file() {
        return Err(CTError::LoadingFailed("Not a file!".into()));
    }
    if !is_csv(path) {
        return Err(CTError::UnknownFileType);
    }

    Ok(FileInfo {
        path: path.to_path_buf(),
        file_size: metadata.len(),
    })
}

fn is_csv(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.eq_ignore_ascii_case("csv"))
}

/// Turns a raw cell into a number when the whole (trimmed) text is a finite float.
pub fn coerce_cell(raw: &str) -> Value {
    let trimmed = raw.trim();
    if !trimmed.is_empty()
        && let Ok(n) = trimmed.parse::<f64>()
        && n.is_finite()
    {
        return Value::Number(n);
    }
    Value::Text(raw.to_string())
}

/// Reads a CSV file with a header row into the working set rows.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_rows(path: &Path) -> Result<Vec<Row>, CTError> {
    let file_info = get_file_info(path)?;
    let start_time = Instant::now();

    // Every column is read as text, coercion happens per cell afterwards.
    let df = LazyCsvReader::new(PlPath::Local(file_info.path.as_path().into()))
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .with_truncate_ragged_lines(true)
        .finish()?
        .collect()?;

    let columns: Result<Vec<(String, Vec<Value>)>, PolarsError> = df
        .get_column_names()
        .par_iter()
        .map(|name| load_column(&df, name))
        .collect();
    let columns = columns?;

    let nrows = df.height();
    let rows: Vec<Row> = (0..nrows)
        .into_par_iter()
        .map(|ridx| {
            Row::from_cells(
                columns
                    .iter()
                    .map(|(name, data)| (name.clone(), data[ridx].clone())),
            )
        })
        .collect();

    info!(
        "Loaded {} rows x {} columns ({} bytes) in {}ms",
        rows.len(),
        columns.len(),
        file_info.file_size,
        start_time.elapsed().as_millis()
    );
    Ok(rows)
}

fn load_column(df: &DataFrame, col_name: &str) -> Result<(String, Vec<Value>), PolarsError> {
    let col = df.column(col_name)?.cast(&DataType::String)?;
    let series = col.str()?;
    let data: Vec<Value> = series
        .into_iter()
        .map(|value| match value {
            Some(s) => coerce_cell(s),
            None => Value::Text(String::new()),
        })
        .collect();

    let numbers = data.iter().filter(|v| v.is_number()).count();
    debug!("Column \"{col_name}\": {numbers}/{} numeric cells", data.len());
    Ok((col_name.to_string(), data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_csv(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn coerce_numbers_and_text() {
        assert_eq!(coerce_cell("15"), Value::Number(15.0));
        assert_eq!(coerce_cell(" 2.5 "), Value::Number(2.5));
        assert_eq!(coerce_cell("-1e3"), Value::Number(-1000.0));
        assert_eq!(coerce_cell("12abc"), Value::Text("12abc".into()));
        assert_eq!(coerce_cell(""), Value::Text("".into()));
        assert_eq!(coerce_cell("NaN"), Value::Text("NaN".into()));
        assert_eq!(coerce_cell("inf"), Value::Text("inf".into()));
    }

    #[test]
    fn load_csv_with_header() {
        let file = write_csv("name,x,note\nabc,5,first\nxyz,15,\n\"q, r\",2.5,last\n");
        let rows = load_rows(file.path()).unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].keys().collect::<Vec<_>>(), vec!["name", "x", "note"]);
        assert_eq!(rows[0].get("x"), Some(&Value::Number(5.0)));
        assert_eq!(rows[1].get("name"), Some(&Value::Text("xyz".into())));
        assert_eq!(rows[1].get("note"), Some(&Value::Text("".into())));
        assert_eq!(rows[2].get("name"), Some(&Value::Text("q, r".into())));
        assert_eq!(rows[2].get("x"), Some(&Value::Number(2.5)));
    }

    #[test]
    fn mixed_cells_keep_their_own_type() {
        let file = write_csv("v\n1\nn/a\n3\n");
        let rows = load_rows(file.path()).unwrap();
        assert_eq!(rows[0].get("v"), Some(&Value::Number(1.0)));
        assert_eq!(rows[1].get("v"), Some(&Value::Text("n/a".into())));
        assert_eq!(rows[2].get("v"), Some(&Value::Number(3.0)));
    }

    #[test]
    fn ragged_lines_keep_every_row() {
        let file = write_csv("a,b\n1,2\n3,4\n5,6,\n");
        let rows = load_rows(file.path()).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(rows[2].get("b"), Some(&Value::Number(6.0)));

        let file = write_csv("a,b,c\n1,2\n3,4,5\n");
        let rows = load_rows(file.path()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get("c"), Some(&Value::Number(5.0)));
    }

    #[test]
    fn header_only_yields_no_rows() {
        let file = write_csv("a,b\n");
        let rows = load_rows(file.path()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn rejects_non_csv_and_missing_files() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(b"a\n1\n").unwrap();
        assert!(matches!(load_rows(file.path()), Err(CTError::UnknownFileType)));

        let missing = Path::new("/definitely/not/here.csv");
        assert!(matches!(load_rows(missing), Err(CTError::FileNotFound)));
    }

    #[test]
    fn expands_home_in_paths() {
        assert_eq!(expand_path(" /tmp/data.csv ").unwrap(), PathBuf::from("/tmp/data.csv"));
        assert!(expand_path("~/data.csv").unwrap().ends_with("data.csv"));
    }
}
