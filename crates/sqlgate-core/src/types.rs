//! Core types for SQLGate

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A database value as delivered by a result cursor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit unsigned integer (values above `i64::MAX`)
    UInt64(u64),
    /// 32-bit floating point
    Float32(f32),
    /// 64-bit floating point
    Float64(f64),
    /// Decimal/Numeric (stored as string for precision)
    Decimal(String),
    /// UTF-8 string
    String(String),
    /// Binary data
    Bytes(Vec<u8>),
    /// Date (year, month, day)
    Date(NaiveDate),
    /// Time of day
    Time(NaiveTime),
    /// DateTime without timezone
    DateTime(NaiveDateTime),
}

impl Value {
    /// Check if the value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            Value::UInt64(v) => i64::try_from(*v).ok(),
            Value::Bool(v) => Some(*v as i64),
            Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Try to get as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float32(v) => Some(*v as f64),
            Value::Float64(v) => Some(*v),
            Value::Int64(v) => Some(*v as f64),
            Value::Decimal(s) | Value::String(s) => s.parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int64(v) => Some(*v != 0),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::UInt64(v) => write!(f, "{}", v),
            Value::Float32(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "<{} bytes>", v.len()),
            Value::Date(v) => write!(f, "{}", v),
            Value::Time(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// One fetched row, shaped the way the caller asked for it
#[derive(Debug, Clone, PartialEq)]
pub enum RowData {
    /// Field name to value, in column order. Later duplicate names overwrite earlier ones.
    Associative(IndexMap<String, Value>),
    /// Values in column order
    Positional(Vec<Value>),
}

impl RowData {
    /// Build a row from column names and values
    pub fn from_parts(names: &[String], values: Vec<Value>, associative: bool) -> Self {
        if associative {
            let mut map = IndexMap::with_capacity(values.len());
            for (name, value) in names.iter().zip(values) {
                map.insert(name.clone(), value);
            }
            RowData::Associative(map)
        } else {
            RowData::Positional(values)
        }
    }

    /// Get a value by position
    pub fn get(&self, index: usize) -> Option<&Value> {
        match self {
            RowData::Associative(map) => map.get_index(index).map(|(_, v)| v),
            RowData::Positional(values) => values.get(index),
        }
    }

    /// Get a value by field name (associative rows only)
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        match self {
            RowData::Associative(map) => map.get(name),
            RowData::Positional(_) => None,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RowData::Associative(map) => map.len(),
            RowData::Positional(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values in column order, dropping field names
    pub fn into_values(self) -> Vec<Value> {
        match self {
            RowData::Associative(map) => map.into_values().collect(),
            RowData::Positional(values) => values,
        }
    }
}

/// Richer semantic type for a result column than the engine's native tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SqlType {
    Text,
    Binary,
    Bool,
    Integer,
    Float,
    Date,
    DateTime,
    Time,
    /// A duration rather than a wall-clock time
    TimeInterval,
}

/// Metadata for one column of a result set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultColumn {
    /// Column name (alias if the query gave one)
    pub name: String,
    /// Original table the column belongs to, empty for computed columns
    pub table: String,
    /// `table.name` when the column has a table, otherwise just the name
    pub full_name: String,
    /// Engine type tag, e.g. `INT`, `VAR_STRING`
    pub native_type: String,
    /// Derived semantic type when the native tag alone is misleading
    pub semantic_type: Option<SqlType>,
    /// Raw vendor metadata record
    pub vendor: IndexMap<String, Value>,
}
