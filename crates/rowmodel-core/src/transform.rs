//! Value transformers: storage representation <-> domain representation.
//!
//! A transformer is attached to a model column. Hydration calls
//! [`ValueTransformer::from_storage`] on raw row values; serialization and
//! where-clause binding call [`ValueTransformer::to_storage`]. NULL passes
//! through both directions unchanged.

use crate::Result;
use crate::error::{Error, TypeError};
use crate::value::Value;
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;

/// Storage format for date-time columns.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Storage format for date columns.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Bidirectional, stateless column converter.
///
/// For every valid domain value `x`, `from_storage(to_storage(x)) == x`.
pub trait ValueTransformer: Send + Sync + fmt::Debug {
    /// Domain value -> value written to the database.
    fn to_storage(&self, value: Value) -> Result<Value>;

    /// Value read from the database -> domain value.
    fn from_storage(&self, value: Value) -> Result<Value>;
}

fn invalid(expected: &'static str, value: &Value) -> Error {
    Error::Type(TypeError {
        expected,
        actual: value.type_name().to_string(),
        column: None,
    })
}

fn unparseable(expected: &'static str, text: &str) -> Error {
    Error::Type(TypeError {
        expected,
        actual: format!("unparseable text '{}'", text),
        column: None,
    })
}

/// `NaiveDateTime` <-> `'YYYY-MM-DD HH:MM:SS'` text.
///
/// Sub-second precision does not survive storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTimeTransformer;

impl ValueTransformer for DateTimeTransformer {
    fn to_storage(&self, value: Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::DateTime(dt) => Ok(Value::Text(dt.format(DATETIME_FORMAT).to_string())),
            // Already in storage form, e.g. a literal bound in a where clause.
            Value::Text(s) => Ok(Value::Text(s)),
            other => Err(invalid("DATETIME", &other)),
        }
    }

    fn from_storage(&self, value: Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::DateTime(dt) => Ok(Value::DateTime(dt)),
            Value::Text(s) => NaiveDateTime::parse_from_str(&s, DATETIME_FORMAT)
                .map(Value::DateTime)
                .map_err(|_| unparseable("DATETIME", &s)),
            other => Err(invalid("TEXT", &other)),
        }
    }
}

/// `NaiveDate` <-> `'YYYY-MM-DD'` text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateTransformer;

impl ValueTransformer for DateTransformer {
    fn to_storage(&self, value: Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Date(d) => Ok(Value::Text(d.format(DATE_FORMAT).to_string())),
            Value::Text(s) => Ok(Value::Text(s)),
            other => Err(invalid("DATE", &other)),
        }
    }

    fn from_storage(&self, value: Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Date(d) => Ok(Value::Date(d)),
            Value::Text(s) => NaiveDate::parse_from_str(&s, DATE_FORMAT)
                .map(Value::Date)
                .map_err(|_| unparseable("DATE", &s)),
            other => Err(invalid("TEXT", &other)),
        }
    }
}

/// `bool` <-> integer flag.
///
/// Storage `1` reads as true and anything else as false; `true` is stored
/// as `1` and `false` as `0`.
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanTransformer;

impl ValueTransformer for BooleanTransformer {
    fn to_storage(&self, value: Value) -> Result<Value> {
        match value {
            Value::Null => Ok(Value::Null),
            Value::Bool(b) => Ok(Value::Int(i32::from(b))),
            Value::Int(n) => Ok(Value::Int(i32::from(n != 0))),
            Value::BigInt(n) => Ok(Value::Int(i32::from(n != 0))),
            Value::Double(n) => Ok(Value::Int(i32::from(n.abs() > 0.0))),
            Value::Text(s) => Ok(Value::Int(i32::from(!s.is_empty() && s != "0"))),
            other => Err(invalid("BOOLEAN", &other)),
        }
    }

    fn from_storage(&self, value: Value) -> Result<Value> {
        let flag = match &value {
            Value::Null => return Ok(Value::Null),
            Value::Bool(b) => *b,
            Value::Text(s) => s.trim() == "1",
            other => other.as_i64() == Some(1),
        };
        Ok(Value::Bool(flag))
    }
}
