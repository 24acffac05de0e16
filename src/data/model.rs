use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// CellValue – a single cell of the raw observation table
// ---------------------------------------------------------------------------

/// A dynamically-typed cell mirroring the dtypes found in tabular exports.
/// Distinct values are collected in `BTreeSet`s, so `CellValue` must be `Ord`.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
}

// -- Manual Eq/Ord so we can put CellValue in BTreeSet --

impl Eq for CellValue {}

impl PartialOrd for CellValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CellValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        use CellValue::*;
        fn rank(v: &CellValue) -> u8 {
            match v {
                Null => 0,
                Bool(_) => 1,
                Integer(_) => 2,
                Float(_) => 3,
                String(_) => 4,
            }
        }
        let ra = rank(self);
        let rb = rank(other);
        if ra != rb {
            return ra.cmp(&rb);
        }
        match (self, other) {
            (Null, Null) => std::cmp::Ordering::Equal,
            (Bool(a), Bool(b)) => a.cmp(b),
            (Integer(a), Integer(b)) => a.cmp(b),
            (Float(a), Float(b)) => a.total_cmp(b),
            (String(a), String(b)) => a.cmp(b),
            _ => std::cmp::Ordering::Equal,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Null => write!(f, "<null>"),
            other => write!(f, "{}", other.as_text().unwrap_or_default()),
        }
    }
}

impl CellValue {
    /// Textual form used when comparing categorical labels, so that a
    /// subject id stored as `7` matches the label `"7"`. `None` for null.
    pub fn as_text(&self) -> Option<Cow<'_, str>> {
        match self {
            CellValue::String(s) => Some(Cow::Borrowed(s.as_str())),
            CellValue::Integer(i) => Some(Cow::Owned(i.to_string())),
            // Debug keeps the decimal point, so 7.0 stays "7.0".
            CellValue::Float(v) => Some(Cow::Owned(format!("{v:?}"))),
            CellValue::Bool(b) => Some(Cow::Owned(b.to_string())),
            CellValue::Null => None,
        }
    }

    /// Numeric view of the cell. Strings are parsed, booleans are not numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(v) => Some(*v),
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::String(s) => s.trim().parse().ok(),
            CellValue::Bool(_) | CellValue::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Cell for a raw text field (CSV has no schema). The text is kept
    /// verbatim so labels like `007` survive; numbers parse in `as_f64`.
    pub fn from_text(s: &str) -> CellValue {
        if s.is_empty() {
            CellValue::Null
        } else {
            CellValue::String(s.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Observation – one row of the raw table
// ---------------------------------------------------------------------------

/// One measurement row: column_name → value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Observation {
    pub cells: BTreeMap<String, CellValue>,
}

impl Observation {
    /// Cell for `column`, treating a missing column the same as null.
    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.cells.get(column).filter(|v| !v.is_null())
    }

    /// True when the cell's textual form equals `expected`.
    pub fn text_equals(&self, column: &str, expected: &str) -> bool {
        self.get(column)
            .and_then(CellValue::as_text)
            .is_some_and(|t| t == expected)
    }
}

impl<K: Into<String>, V: Into<CellValue>> FromIterator<(K, V)> for Observation {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Observation {
            cells: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Float(v)
    }
}

// ---------------------------------------------------------------------------
// ObservationTable – the complete loaded dataset
// ---------------------------------------------------------------------------

/// The full parsed table with pre-computed column indices.
#[derive(Debug, Clone, Default)]
pub struct ObservationTable {
    /// All observations (rows).
    pub rows: Vec<Observation>,
    /// Ordered list of column names.
    pub column_names: Vec<String>,
    /// For each column the sorted set of distinct non-null values.
    pub unique_values: BTreeMap<String, BTreeSet<CellValue>>,
}

impl ObservationTable {
    /// Build column indices from the loaded rows.
    pub fn from_rows(rows: Vec<Observation>) -> Self {
        let mut column_names_set: BTreeSet<String> = BTreeSet::new();
        let mut unique_values: BTreeMap<String, BTreeSet<CellValue>> = BTreeMap::new();

        for row in &rows {
            for (col, val) in &row.cells {
                column_names_set.insert(col.clone());
                let entry = unique_values.entry(col.clone()).or_default();
                if !val.is_null() {
                    entry.insert(val.clone());
                }
            }
        }
        ObservationTable {
            rows,
            column_names: column_names_set.into_iter().collect(),
            unique_values,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Comma-separated distinct values of a column, for log and CLI output.
    pub fn describe_values(&self, column: &str) -> String {
        match self.unique_values.get(column) {
            Some(vals) if !vals.is_empty() => vals
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(", "),
            Some(_) => "<all null>".to_string(),
            None => "<column absent>".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Typed records
// ---------------------------------------------------------------------------

/// A validated observation that passed the region/parameter filter.
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationRecord {
    pub stimulus_type: String,
    pub subject_id: String,
    pub correlation_by_condition: f64,
    pub correlation_overall: f64,
}

/// Mean correlation difference for one subject in one condition group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub subject_id: String,
    pub is_target_condition: bool,
    pub difference_metric: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_cells_keep_raw_labels() {
        assert_eq!(CellValue::from_text(""), CellValue::Null);
        assert_eq!(CellValue::from_text("007"), CellValue::String("007".into()));
        assert_eq!(CellValue::from_text("2.0").as_text().as_deref(), Some("2.0"));
        assert_eq!(CellValue::from_text("0.25").as_f64(), Some(0.25));
    }

    #[test]
    fn test_text_equals_on_typed_and_text_cells() {
        let row: Observation = [
            ("subject_id", CellValue::Integer(7)),
            ("session", CellValue::Float(7.0)),
            ("region", CellValue::from("01")),
        ]
        .into_iter()
        .collect();
        assert!(row.text_equals("subject_id", "7"));
        assert!(row.text_equals("session", "7.0"));
        assert!(!row.text_equals("session", "7"));
        assert!(row.text_equals("region", "01"));
        assert!(!row.text_equals("region", "1"));
        assert!(!row.text_equals("absent", "7"));
    }

    #[test]
    fn test_null_cells_read_as_missing() {
        let row: Observation = [("region", CellValue::Null)].into_iter().collect();
        assert!(row.get("region").is_none());
        assert!(row.get("absent").is_none());
    }

    #[test]
    fn test_as_f64_parses_strings() {
        assert_eq!(CellValue::from(" 0.5 ").as_f64(), Some(0.5));
        assert_eq!(CellValue::from("high").as_f64(), None);
        assert_eq!(CellValue::Bool(true).as_f64(), None);
    }

    #[test]
    fn test_table_indices_skip_nulls() {
        let rows: Vec<Observation> = vec![
            [("region", CellValue::from("SC"))].into_iter().collect(),
            [("region", CellValue::from("LGN"))].into_iter().collect(),
            [("region", CellValue::Null)].into_iter().collect(),
        ];
        let table = ObservationTable::from_rows(rows);
        assert_eq!(table.len(), 3);
        assert_eq!(table.column_names, vec!["region".to_string()]);
        assert_eq!(table.describe_values("region"), "LGN, SC");
        assert_eq!(table.describe_values("parameter"), "<column absent>");
    }
}
