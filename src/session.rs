use std::collections::HashMap;

use tracing::debug;

use crate::domain::CTError;
use crate::value::Row;

/// Key under which the parsed rows are handed from the upload screen to the table screen.
pub const DATA_KEY: &str = "data";

/// Process local key-value slots shared between screens.
///
/// The session is owned by the model and passed by reference, so every
/// screen reads the same slot without ambient globals.
#[derive(Debug, Default)]
pub struct Session {
    slots: HashMap<String, String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_item(&mut self, key: &str, value: String) {
        self.slots.insert(key.to_string(), value);
    }

    pub fn get_item(&self, key: &str) -> Option<&str> {
        self.slots.get(key).map(String::as_str)
    }

    #[allow(dead_code)]
    pub fn remove_item(&mut self, key: &str) -> Option<String> {
        self.slots.remove(key)
    }

    pub fn store_rows(&mut self, rows: &[Row]) -> Result<(), CTError> {
        let encoded = serde_json::to_string(rows)?;
        debug!("Storing {} rows ({} bytes) in the session", rows.len(), encoded.len());
        self.set_item(DATA_KEY, encoded);
        Ok(())
    }

    /// An absent or empty slot is an empty working set, not an error.
    pub fn load_rows(&self) -> Result<Vec<Row>, CTError> {
        match self.get_item(DATA_KEY) {
            None => Ok(Vec::new()),
            Some(s) if s.trim().is_empty() => Ok(Vec::new()),
            Some(s) => Ok(serde_json::from_str(s)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    fn sample_rows() -> Vec<Row> {
        vec![
            Row::from_cells([("name", Value::Text("abc".into())), ("x", Value::Number(5.0))]),
            Row::from_cells([("name", Value::Text("xyz".into())), ("x", Value::Number(15.5))]),
            Row::from_cells([("name", Value::Text("".into())), ("x", Value::Text("n/a".into()))]),
        ]
    }

    #[test]
    fn rows_round_trip() {
        let mut session = Session::new();
        let rows = sample_rows();
        session.store_rows(&rows).unwrap();

        let back = session.load_rows().unwrap();
        assert_eq!(back, rows);
        assert_eq!(back[0].keys().collect::<Vec<_>>(), vec!["name", "x"]);
    }

    #[test]
    fn numbers_round_trip_bit_exact() {
        let mut numbers: Vec<f64> = ["123456789.123456789", "0.1", "2.220446049250313e-16"]
            .iter()
            .filter_map(|raw| crate::ingest::coerce_cell(raw).as_number())
            .collect();
        assert_eq!(numbers.len(), 3);
        numbers.extend([
            f64::MAX,
            f64::MIN_POSITIVE,
            -1.603964615428183e143,
            1.0715660391465826e-75,
        ]);

        // Pseudo random bit patterns across the whole exponent range.
        let mut seed: u64 = 0x9E37_79B9_7F4A_7C15;
        while numbers.len() < 5000 {
            seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let n = f64::from_bits(seed);
            if n.is_finite() {
                numbers.push(n);
            }
        }

        let rows: Vec<Row> = numbers
            .iter()
            .map(|n| Row::from_cells([("x", Value::Number(*n))]))
            .collect();
        let mut session = Session::new();
        session.store_rows(&rows).unwrap();
        let back = session.load_rows().unwrap();

        let mismatches: Vec<f64> = numbers
            .iter()
            .zip(&back)
            .filter(|(n, row)| {
                let stored = row.get("x").and_then(Value::as_number);
                stored.map(f64::to_bits) != Some(n.to_bits())
            })
            .map(|(n, _)| *n)
            .collect();
        assert!(mismatches.is_empty(), "lost precision for {mismatches:?}");
    }

    #[test]
    fn absent_or_empty_slot_is_empty() {
        let mut session = Session::new();
        assert!(session.load_rows().unwrap().is_empty());

        session.set_item(DATA_KEY, String::new());
        assert!(session.load_rows().unwrap().is_empty());

        session.set_item(DATA_KEY, "[]".into());
        assert!(session.load_rows().unwrap().is_empty());
    }

    #[test]
    fn storing_replaces_previous_rows() {
        let mut session = Session::new();
        session.store_rows(&sample_rows()).unwrap();
        session.store_rows(&sample_rows()[..1]).unwrap();
        assert_eq!(session.load_rows().unwrap().len(), 1);

        assert!(session.remove_item(DATA_KEY).is_some());
        assert!(session.get_item(DATA_KEY).is_none());
    }

    #[test]
    fn corrupt_slot_is_an_error() {
        let mut session = Session::new();
        session.set_item(DATA_KEY, "{not json".into());
        assert!(matches!(session.load_rows(), Err(CTError::Serialization(_))));
    }
}
