//! Typed result sets returned by the execution engine.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// One cell value, mirroring the `SQLite` storage classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Real(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Blob(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

/// One row: column name to value.
pub type ResultRow = BTreeMap<String, CellValue>;

/// Rows produced by one executed statement. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Column names in select-list order.
    columns: Vec<String>,
    rows: Vec<ResultRow>,
    #[serde(with = "duration_ms")]
    elapsed: Duration,
    /// Set when the row cap cut the result short.
    truncated: bool,
}

impl ExecutionResult {
    #[must_use]
    pub const fn new(
        columns: Vec<String>,
        rows: Vec<ResultRow>,
        elapsed: Duration,
        truncated: bool,
    ) -> Self {
        Self {
            columns,
            rows,
            elapsed,
            truncated,
        }
    }

    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[ResultRow] {
        &self.rows
    }

    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub const fn elapsed(&self) -> Duration {
        self.elapsed
    }

    #[must_use]
    pub const fn truncated(&self) -> bool {
        self.truncated
    }

    /// Rows as vectors of display strings in column order.
    #[must_use]
    pub fn display_rows(&self) -> Vec<Vec<String>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| row.get(c).map_or_else(|| "-".to_string(), ToString::to_string))
                    .collect()
            })
            .collect()
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        #[allow(clippy::cast_possible_truncation)]
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ExecutionResult {
        let mut row = ResultRow::new();
        row.insert("name".into(), CellValue::Text("Ada".into()));
        row.insert("balance".into(), CellValue::Real(12.5));
        ExecutionResult::new(
            vec!["name".into(), "balance".into()],
            vec![row],
            Duration::from_millis(7),
            false,
        )
    }

    #[test]
    fn display_rows_follow_column_order() {
        assert_eq!(sample().display_rows(), vec![vec!["Ada", "12.5"]]);
    }

    #[test]
    fn serializes_elapsed_as_millis() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["elapsed"], 7);
        assert_eq!(json["rows"][0]["name"], "Ada");
        assert_eq!(json["truncated"], false);
    }

    #[test]
    fn null_and_blob_display() {
        assert_eq!(CellValue::Null.to_string(), "null");
        assert_eq!(CellValue::Blob(vec![1, 2, 3]).to_string(), "<3 bytes>");
    }
}
