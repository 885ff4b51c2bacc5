//! Column values exchanged with the relational executor.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ErrorCode, ShadowError, ShadowResult};

/// Text encoding of timestamps. Fixed-width so string comparison orders them.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// A single column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Bool(bool),
    Timestamp(DateTime<Utc>),
}

/// Column name to value mapping for one row. Ordered so generated SQL is stable.
pub type Row = BTreeMap<String, Value>;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Integer(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Timestamps come back from storage as text; both forms are accepted.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Timestamp(t) => Some(*t),
            Value::Text(s) => parse_timestamp(s),
            _ => None,
        }
    }

    /// Encode a timestamp the way it is persisted.
    pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
        ts.format(TIMESTAMP_FORMAT).to_string()
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.fZ")
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
        })
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Typed accessors used by `Entity::from_row` implementations.
pub trait RowExt {
    fn require(&self, column: &str) -> ShadowResult<&Value>;
    fn get_i64(&self, column: &str) -> ShadowResult<i64>;
    fn get_string(&self, column: &str) -> ShadowResult<String>;
    fn get_opt_string(&self, column: &str) -> ShadowResult<Option<String>>;
    fn get_opt_timestamp(&self, column: &str) -> ShadowResult<Option<DateTime<Utc>>>;
}

impl RowExt for Row {
    fn require(&self, column: &str) -> ShadowResult<&Value> {
        self.get(column).ok_or_else(|| ShadowError::Parse {
            message: format!("column '{}' missing from row", column),
            code: ErrorCode::ParseMissingField,
        })
    }

    fn get_i64(&self, column: &str) -> ShadowResult<i64> {
        self.require(column)?
            .as_i64()
            .ok_or_else(|| ShadowError::parse(format!("column '{}' is not an integer", column)))
    }

    fn get_string(&self, column: &str) -> ShadowResult<String> {
        self.require(column)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ShadowError::parse(format!("column '{}' is not text", column)))
    }

    fn get_opt_string(&self, column: &str) -> ShadowResult<Option<String>> {
        match self.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v
                .as_str()
                .map(|s| Some(s.to_string()))
                .ok_or_else(|| ShadowError::parse(format!("column '{}' is not text", column))),
        }
    }

    fn get_opt_timestamp(&self, column: &str) -> ShadowResult<Option<DateTime<Utc>>> {
        match self.get(column) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => v.as_timestamp().map(Some).ok_or_else(|| {
                ShadowError::parse(format!("column '{}' is not a timestamp", column))
            }),
        }
    }
}
