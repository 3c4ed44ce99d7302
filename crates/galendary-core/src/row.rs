//! Statement results: rows, result sets and OK status.

use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::value::Value;

/// Metadata for one result column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    /// Column label as returned by the server (alias if one was given).
    pub name: String,
    /// Originating table, empty for computed columns.
    pub table: String,
    /// Server column type code.
    pub column_type: u8,
    /// Server column flags.
    pub flags: u16,
}

impl ColumnInfo {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: String::new(),
            column_type: 0,
            flags: 0,
        }
    }
}

/// A single result row. Column metadata is shared by every row of a set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<Vec<ColumnInfo>>,
    values: Vec<Value>,
}

impl Row {
    pub fn new(columns: Arc<Vec<ColumnInfo>>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Build a row from `(name, value)` pairs. Mostly useful in tests.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let (columns, values): (Vec<_>, Vec<_>) = pairs
            .into_iter()
            .map(|(k, v)| (ColumnInfo::new(k), v))
            .unzip();
        Self::new(Arc::new(columns), values)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Value at a column index.
    pub fn get_index(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }

    /// Value of the last column with this name.
    ///
    /// Joins like `SELECT groups.id AS gid, entries.*` can repeat labels; the last
    /// one wins, matching how the rows serialize to JSON objects.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.columns
            .iter()
            .rposition(|c| c.name == name)
            .and_then(|idx| self.values.get(idx))
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Duplicate labels collapse to their last occurrence.
        let mut seen: Vec<&str> = Vec::with_capacity(self.columns.len());
        let mut keep = vec![false; self.columns.len()];
        for (idx, col) in self.columns.iter().enumerate().rev() {
            if !seen.contains(&col.name.as_str()) {
                seen.push(&col.name);
                keep[idx] = true;
            }
        }
        let mut map = serializer.serialize_map(Some(seen.len()))?;
        for ((col, value), keep) in self.columns.iter().zip(&self.values).zip(keep) {
            if keep {
                map.serialize_entry(&col.name, value)?;
            }
        }
        map.end()
    }
}

/// Status reported by the server after a statement that produced no rows, or
/// after the last result set of a procedure call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OkStatus {
    /// Rows matched or affected.
    pub affected_rows: u64,
    /// Rows whose values actually changed (parsed from the server's info text).
    pub changed_rows: u64,
    pub insert_id: u64,
    pub server_status: u16,
    pub warning_count: u16,
    pub message: String,
}

impl OkStatus {
    /// Extract the "Changed: N" count from an UPDATE info message such as
    /// `Rows matched: 1  Changed: 1  Warnings: 0`.
    pub fn parse_changed_rows(message: &str) -> Option<u64> {
        let start = message.find("Changed:")? + "Changed:".len();
        let digits: String = message[start..]
            .trim_start()
            .chars()
            .take_while(char::is_ascii_digit)
            .collect();
        digits.parse().ok()
    }
}

/// Everything a statement returned: zero or more result sets and, for
/// mutations and procedure calls, the trailing OK status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementResult {
    pub sets: Vec<Vec<Row>>,
    pub status: Option<OkStatus>,
}

impl StatementResult {
    /// A single result set with no status.
    pub fn rows(rows: Vec<Row>) -> Self {
        Self {
            sets: vec![rows],
            status: None,
        }
    }

    /// A bare OK status.
    pub fn ok(status: OkStatus) -> Self {
        Self {
            sets: Vec::new(),
            status: Some(status),
        }
    }

    /// The first result set, or an empty slice.
    pub fn first_set(&self) -> &[Row] {
        self.sets.first().map_or(&[], Vec::as_slice)
    }

    /// The first row of the first result set.
    pub fn first_row(&self) -> Option<&Row> {
        self.first_set().first()
    }

    pub fn affected_rows(&self) -> u64 {
        self.status.as_ref().map_or(0, |s| s.affected_rows)
    }

    pub fn changed_rows(&self) -> u64 {
        self.status.as_ref().map_or(0, |s| s.changed_rows)
    }
}

impl Serialize for StatementResult {
    /// Shape callers expect: a plain query
    /// is an array of row objects, a mutation is its status object, and a
    /// procedure call is an array of its result sets followed by the status.
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match (self.sets.as_slice(), &self.status) {
            ([], Some(status)) => status.serialize(serializer),
            ([], None) => serializer.serialize_seq(Some(0))?.end(),
            ([rows], None) => rows.serialize(serializer),
            (sets, status) => {
                let len = sets.len() + usize::from(status.is_some());
                let mut seq = serializer.serialize_seq(Some(len))?;
                for set in sets {
                    seq.serialize_element(set)?;
                }
                if let Some(status) = status {
                    seq.serialize_element(status)?;
                }
                seq.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_by_name_prefers_last_duplicate() {
        let row = Row::from_pairs([
            ("id", Value::Int(1)),
            ("title", Value::from("Lecture")),
            ("id", Value::Int(9)),
        ]);
        assert_eq!(row.get("id"), Some(&Value::Int(9)));
        assert_eq!(row.get("title"), Some(&Value::from("Lecture")));
        assert_eq!(row.get("missing"), None);
    }

    #[test]
    fn test_row_serializes_as_object() {
        let row = Row::from_pairs([("c", Value::Int(1)), ("name", Value::Null)]);
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"c":1,"name":null}"#);
    }

    #[test]
    fn test_parse_changed_rows() {
        assert_eq!(
            OkStatus::parse_changed_rows("Rows matched: 1  Changed: 1  Warnings: 0"),
            Some(1)
        );
        assert_eq!(
            OkStatus::parse_changed_rows("(Rows matched: 3  Changed: 0  Warnings: 0"),
            Some(0)
        );
        assert_eq!(OkStatus::parse_changed_rows(""), None);
    }

    #[test]
    fn test_result_shapes() {
        let rows = vec![Row::from_pairs([("c", Value::Int(1))])];

        let select = StatementResult::rows(rows.clone());
        assert_eq!(serde_json::to_string(&select).unwrap(), r#"[{"c":1}]"#);

        let insert = StatementResult::ok(OkStatus {
            affected_rows: 1,
            insert_id: 12,
            ..OkStatus::default()
        });
        let json = serde_json::to_value(&insert).unwrap();
        assert_eq!(json["affectedRows"], 1);
        assert_eq!(json["insertId"], 12);

        let call = StatementResult {
            sets: vec![rows],
            status: Some(OkStatus::default()),
        };
        let json = serde_json::to_value(&call).unwrap();
        assert_eq!(json[0][0]["c"], 1);
        assert_eq!(json[1]["affectedRows"], 0);
    }

    #[test]
    fn test_first_row_of_empty_result() {
        let empty = StatementResult::default();
        assert!(empty.first_row().is_none());
        assert_eq!(empty.affected_rows(), 0);
    }
}
