//! Source values and rows read from the relational side.
//!
//! Every value that ends up on a graph node goes through
//! [`SourceValue::to_property`], the single place where numeric, boolean,
//! temporal and string values are normalized for the graph store.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

/// A single column value as read from a relational source.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SourceValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
}

/// A normalized property value as written to the graph store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

impl SourceValue {
    pub fn is_null(&self) -> bool {
        matches!(self, SourceValue::Null)
    }

    /// Natural-key form of this value. `None` for SQL NULL.
    ///
    /// Text keys are trimmed, since fixed-width CHAR columns pad with spaces.
    pub fn as_key(&self) -> Option<String> {
        match self {
            SourceValue::Null => None,
            SourceValue::Text(s) => Some(s.trim().to_string()),
            other => Some(other.to_string()),
        }
    }

    /// Normalize for the graph store.
    ///
    /// Non-finite floats become null, timestamps and dates become ISO-8601
    /// strings. Everything else keeps its type.
    pub fn to_property(&self) -> PropertyValue {
        match self {
            SourceValue::Null => PropertyValue::Null,
            SourceValue::Bool(b) => PropertyValue::Bool(*b),
            SourceValue::Integer(i) => PropertyValue::Integer(*i),
            SourceValue::Float(f) if f.is_finite() => PropertyValue::Float(*f),
            SourceValue::Float(_) => PropertyValue::Null,
            SourceValue::Text(s) => PropertyValue::String(s.clone()),
            SourceValue::Timestamp(ts) => {
                PropertyValue::String(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
            }
            SourceValue::Date(d) => PropertyValue::String(d.format("%Y-%m-%d").to_string()),
        }
    }
}

impl fmt::Display for SourceValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceValue::Null => write!(f, "NULL"),
            SourceValue::Bool(b) => write!(f, "{}", b),
            SourceValue::Integer(i) => write!(f, "{}", i),
            SourceValue::Float(v) => write!(f, "{}", v),
            SourceValue::Text(s) => write!(f, "{}", s),
            SourceValue::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%dT%H:%M:%S%.f")),
            SourceValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

impl PropertyValue {
    pub fn is_null(&self) -> bool {
        matches!(self, PropertyValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for SourceValue {
    fn from(value: &str) -> Self {
        SourceValue::Text(value.to_string())
    }
}

impl From<String> for SourceValue {
    fn from(value: String) -> Self {
        SourceValue::Text(value)
    }
}

impl From<i64> for SourceValue {
    fn from(value: i64) -> Self {
        SourceValue::Integer(value)
    }
}

impl From<i32> for SourceValue {
    fn from(value: i32) -> Self {
        SourceValue::Integer(value as i64)
    }
}

impl From<f64> for SourceValue {
    fn from(value: f64) -> Self {
        SourceValue::Float(value)
    }
}

impl From<bool> for SourceValue {
    fn from(value: bool) -> Self {
        SourceValue::Bool(value)
    }
}

impl From<NaiveDateTime> for SourceValue {
    fn from(value: NaiveDateTime) -> Self {
        SourceValue::Timestamp(value)
    }
}

impl From<NaiveDate> for SourceValue {
    fn from(value: NaiveDate) -> Self {
        SourceValue::Date(value)
    }
}

impl<T: Into<SourceValue>> From<Option<T>> for SourceValue {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(SourceValue::Null)
    }
}

/// One row from a relational source, columns in select order.
///
/// Column lookup is exact first, then ASCII case-insensitive, so mapping
/// files may name `SFCODE` for a column the driver reports as `sfcode`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Row {
    columns: Vec<(String, SourceValue)>,
}

static NULL: SourceValue = SourceValue::Null;

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column append.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<SourceValue>) -> Self {
        self.push(column, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<SourceValue>) {
        self.columns.push((column.into(), value.into()));
    }

    pub fn get(&self, column: &str) -> Option<&SourceValue> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .or_else(|| {
                self.columns
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(column))
            })
            .map(|(_, value)| value)
    }

    /// Value of a column, NULL when the column is absent.
    pub fn value(&self, column: &str) -> &SourceValue {
        self.get(column).unwrap_or(&NULL)
    }

    /// Natural key held in a column, `None` when absent or NULL.
    pub fn key(&self, column: &str) -> Option<String> {
        self.get(column).and_then(SourceValue::as_key)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &SourceValue)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl FromIterator<(String, SourceValue)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, SourceValue)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_lookup_is_case_insensitive() {
        let row = Row::new().with("sfcode", "D1").with("SFCODE", "exact");
        assert_eq!(row.value("SFCODE"), &SourceValue::from("exact"));
        assert_eq!(row.value("Sfcode"), &SourceValue::from("D1"));
        assert!(row.value("missing").is_null());
    }

    #[test]
    fn test_key_trims_text_and_skips_null() {
        let row = Row::new()
            .with("CODE", "  D1  ")
            .with("ID", 42i64)
            .with("PARENT", SourceValue::Null);
        assert_eq!(row.key("CODE"), Some("D1".to_string()));
        assert_eq!(row.key("ID"), Some("42".to_string()));
        assert_eq!(row.key("PARENT"), None);
        assert_eq!(row.key("NOPE"), None);
    }

    #[test]
    fn test_to_property_normalizes_values() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(8, 30, 0)
            .unwrap();
        assert_eq!(
            SourceValue::Timestamp(ts).to_property(),
            PropertyValue::String("2024-03-01T08:30:00".to_string())
        );
        assert_eq!(
            SourceValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()).to_property(),
            PropertyValue::String("2024-03-01".to_string())
        );
        assert_eq!(SourceValue::Float(f64::NAN).to_property(), PropertyValue::Null);
        assert_eq!(SourceValue::Float(1.5).to_property(), PropertyValue::Float(1.5));
        assert_eq!(SourceValue::Integer(7).to_property(), PropertyValue::Integer(7));
        assert_eq!(SourceValue::Bool(true).to_property(), PropertyValue::Bool(true));
        assert_eq!(
            SourceValue::from("it's").to_property(),
            PropertyValue::String("it's".to_string())
        );
    }

    #[test]
    fn test_option_conversion() {
        let none: Option<&str> = None;
        assert!(SourceValue::from(none).is_null());
        assert_eq!(SourceValue::from(Some(3i64)), SourceValue::Integer(3));
    }
}
