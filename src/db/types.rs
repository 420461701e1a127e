//! Cell value model for tablequery.
//!
//! `RawValue` is what a driver reports for one column of one row, after the
//! driver has normalised its native types. `Cell` is the tagged wire value a
//! table carries. The conversion between the two is total: an unrecognised
//! raw value still becomes a cell, carrying a diagnostic string.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A driver-reported value whose type is only known at runtime.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    /// Native string.
    Text(String),

    /// 64-bit signed integer.
    Int64(i64),

    /// Boolean.
    Bool(bool),

    /// 64-bit floating point.
    Float64(f64),

    /// Timestamp or datetime, normalised to UTC.
    Timestamp(DateTime<Utc>),

    /// A value the driver could not map onto a recognised type.
    /// Carries the driver's name for the type (`NULL` for SQL NULL).
    Unsupported(String),
}

impl RawValue {
    /// Creates an unsupported value tagged with the given type name.
    pub fn unsupported(type_name: impl Into<String>) -> Self {
        Self::Unsupported(type_name.into())
    }

    /// Returns the runtime type name of this value.
    pub fn type_name(&self) -> &str {
        match self {
            Self::Text(_) => "string",
            Self::Int64(_) => "int64",
            Self::Bool(_) => "bool",
            Self::Float64(_) => "float64",
            Self::Timestamp(_) => "timestamp",
            Self::Unsupported(name) => name,
        }
    }
}

/// Wire kind of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CellKind {
    String,
    Int64,
    Bool,
    Double,
}

impl CellKind {
    /// Returns the kind as it appears on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Int64 => "INT64",
            Self::Bool => "BOOL",
            Self::Double => "DOUBLE",
        }
    }
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single typed value occupying one column position in one row.
///
/// Serialises as `{"kind": "INT64", "value": 42}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Cell {
    #[serde(rename = "STRING")]
    String(String),

    #[serde(rename = "INT64")]
    Int64(i64),

    #[serde(rename = "BOOL")]
    Bool(bool),

    #[serde(rename = "DOUBLE")]
    Double(f64),
}

impl Cell {
    /// Classifies a raw driver value into a cell.
    ///
    /// The arms are checked in order: string, integer, boolean, float,
    /// timestamp (as epoch milliseconds), then the diagnostic fallback.
    pub fn classify(raw: RawValue) -> Self {
        match raw {
            RawValue::Text(s) => Cell::String(s),
            RawValue::Int64(i) => Cell::Int64(i),
            RawValue::Bool(b) => Cell::Bool(b),
            RawValue::Float64(f) => Cell::Double(f),
            RawValue::Timestamp(ts) => Cell::Int64(epoch_millis(&ts)),
            RawValue::Unsupported(type_name) => Cell::String(missing_type(&type_name)),
        }
    }

    /// Returns the wire kind of this cell.
    pub fn kind(&self) -> CellKind {
        match self {
            Cell::String(_) => CellKind::String,
            Cell::Int64(_) => CellKind::Int64,
            Cell::Bool(_) => CellKind::Bool,
            Cell::Double(_) => CellKind::Double,
        }
    }

    /// Converts the stored payload back into a raw value.
    pub fn to_raw(&self) -> RawValue {
        match self {
            Cell::String(s) => RawValue::Text(s.clone()),
            Cell::Int64(i) => RawValue::Int64(*i),
            Cell::Bool(b) => RawValue::Bool(*b),
            Cell::Double(f) => RawValue::Float64(*f),
        }
    }

    /// Returns the string payload, if this is a STRING cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer payload, if this is an INT64 cell.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int64(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<RawValue> for Cell {
    fn from(raw: RawValue) -> Self {
        Cell::classify(raw)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::String(s) => f.write_str(s),
            Cell::Int64(i) => write!(f, "{i}"),
            Cell::Bool(b) => write!(f, "{b}"),
            Cell::Double(d) => write!(f, "{d}"),
        }
    }
}

/// A result-set column. Only the name is known; types are discovered per cell.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
}

impl Column {
    /// Creates a column with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// A row of cells, positionally matching the table's columns.
pub type Row = Vec<Cell>;

/// Milliseconds since the Unix epoch, truncated toward zero.
fn epoch_millis(ts: &DateTime<Utc>) -> i64 {
    let nanos = i128::from(ts.timestamp()) * 1_000_000_000
        + i128::from(ts.timestamp_subsec_nanos());
    (nanos / 1_000_000) as i64
}

fn missing_type(type_name: &str) -> String {
    format!("MISSING TYPE {type_name}!")
}
