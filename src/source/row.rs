//! Raw catalog rows as handed over by a catalog source

use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;
use crate::model::NaturalKey;

/// Datetime layouts accepted for catalog timestamps
const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
];

/// A single cell of a catalog row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl RawValue {
    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }

    fn describe(&self) -> String {
        match self {
            RawValue::Null => "NULL".to_string(),
            RawValue::Bool(b) => format!("bit {}", b),
            RawValue::Int(i) => format!("integer {}", i),
            RawValue::Float(f) => format!("float {}", f),
            RawValue::Text(s) => format!("text '{}'", s),
        }
    }
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Null => write!(f, "NULL"),
            RawValue::Bool(b) => write!(f, "{}", b),
            RawValue::Int(i) => write!(f, "{}", i),
            RawValue::Float(x) => write!(f, "{}", x),
            RawValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Int(v)
    }
}

impl From<bool> for RawValue {
    fn from(v: bool) -> Self {
        RawValue::Bool(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::Text(v.to_string())
    }
}

impl From<String> for RawValue {
    fn from(v: String) -> Self {
        RawValue::Text(v)
    }
}

impl<T: Into<RawValue>> From<Option<T>> for RawValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(RawValue::Null, Into::into)
    }
}

static NULL: RawValue = RawValue::Null;

/// One row returned by an extraction query.
///
/// Column names are matched case-insensitively; columns the projection never
/// asks for are carried but ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, RawValue>", into = "BTreeMap<String, RawValue>")]
pub struct RawRow {
    columns: BTreeMap<String, RawValue>,
}

impl From<BTreeMap<String, RawValue>> for RawRow {
    fn from(map: BTreeMap<String, RawValue>) -> Self {
        map.into_iter().collect()
    }
}

impl From<RawRow> for BTreeMap<String, RawValue> {
    fn from(row: RawRow) -> Self {
        row.columns
    }
}

impl<K: AsRef<str>> FromIterator<(K, RawValue)> for RawRow {
    fn from_iter<I: IntoIterator<Item = (K, RawValue)>>(iter: I) -> Self {
        Self {
            columns: iter
                .into_iter()
                .map(|(k, v)| (k.as_ref().to_ascii_lowercase(), v))
                .collect(),
        }
    }
}

impl RawRow {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter, mostly for fixtures
    pub fn with(mut self, column: &str, value: impl Into<RawValue>) -> Self {
        self.set(column, value);
        self
    }

    pub fn set(&mut self, column: &str, value: impl Into<RawValue>) {
        self.columns
            .insert(column.to_ascii_lowercase(), value.into());
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.contains_key(&column.to_ascii_lowercase())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    /// Key of this row built from the given columns, as the source reported them
    pub fn key(&self, columns: &[&str]) -> NaturalKey {
        NaturalKey::parts(columns.iter().map(|column| self.get(column).to_string()))
    }

    /// Raw cell value; an absent column reads as NULL
    pub fn get(&self, column: &str) -> &RawValue {
        self.columns
            .get(&column.to_ascii_lowercase())
            .unwrap_or(&NULL)
    }

    pub fn opt_int(&self, column: &str) -> Result<Option<i64>, SourceError> {
        match self.get(column) {
            RawValue::Null => Ok(None),
            RawValue::Int(i) => Ok(Some(*i)),
            RawValue::Bool(b) => Ok(Some(i64::from(*b))),
            RawValue::Float(f) if f.fract() == 0.0 => Ok(Some(*f as i64)),
            RawValue::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(Some)
                .map_err(|_| invalid(column, "integer", self.get(column))),
            other => Err(invalid(column, "integer", other)),
        }
    }

    pub fn int(&self, column: &str) -> Result<i64, SourceError> {
        self.opt_int(column)?
            .ok_or_else(|| invalid(column, "integer", &RawValue::Null))
    }

    pub fn opt_text(&self, column: &str) -> Result<Option<String>, SourceError> {
        match self.get(column) {
            RawValue::Null => Ok(None),
            RawValue::Text(s) => Ok(Some(s.clone())),
            RawValue::Int(i) => Ok(Some(i.to_string())),
            RawValue::Float(f) => Ok(Some(f.to_string())),
            other => Err(invalid(column, "text", other)),
        }
    }

    pub fn text(&self, column: &str) -> Result<String, SourceError> {
        self.opt_text(column)?
            .ok_or_else(|| invalid(column, "text", &RawValue::Null))
    }

    /// Bit column; SQL Server bits frequently arrive as 0/1 integers
    pub fn opt_flag(&self, column: &str) -> Result<Option<bool>, SourceError> {
        match self.get(column) {
            RawValue::Null => Ok(None),
            RawValue::Bool(b) => Ok(Some(*b)),
            RawValue::Int(0) => Ok(Some(false)),
            RawValue::Int(1) => Ok(Some(true)),
            RawValue::Text(s) if s == "0" || s.eq_ignore_ascii_case("false") => Ok(Some(false)),
            RawValue::Text(s) if s == "1" || s.eq_ignore_ascii_case("true") => Ok(Some(true)),
            other => Err(invalid(column, "bit", other)),
        }
    }

    /// Bit column with a declared default for NULL
    pub fn flag_or(&self, column: &str, default: bool) -> Result<bool, SourceError> {
        Ok(self.opt_flag(column)?.unwrap_or(default))
    }

    pub fn flag(&self, column: &str) -> Result<bool, SourceError> {
        self.flag_or(column, false)
    }

    pub fn timestamp(&self, column: &str) -> Result<Option<NaiveDateTime>, SourceError> {
        match self.get(column) {
            RawValue::Null => Ok(None),
            RawValue::Text(s) => TIMESTAMP_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s.trim(), fmt).ok())
                .map(Some)
                .ok_or_else(|| invalid(column, "datetime", self.get(column))),
            other => Err(invalid(column, "datetime", other)),
        }
    }
}

fn invalid(column: &str, expected: &'static str, found: &RawValue) -> SourceError {
    SourceError::InvalidValue {
        column: column.to_ascii_lowercase(),
        expected,
        found: found.describe(),
    }
}
