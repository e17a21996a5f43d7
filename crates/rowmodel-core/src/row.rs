//! Database row representation.
//!
//! Result columns are keyed by the names the driver reports. Model columns
//! arrive as `alias.column`; to-many aggregates arrive under the relation
//! name, which some drivers report with a leading dot.

use crate::Result;
use crate::error::{Error, TypeError};
use crate::value::Value;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::sync::Arc;

static NULL: Value = Value::Null;

/// Column metadata shared across all rows in a result set.
///
/// Wrapped in `Arc` so every row of one query shares a single copy.
#[derive(Debug, Clone)]
pub struct ColumnInfo {
    /// Column names in order
    names: Vec<String>,
    /// Name -> index mapping for O(1) lookup
    name_to_index: HashMap<String, usize>,
}

impl ColumnInfo {
    /// Create new column info from a list of column names.
    pub fn new(names: Vec<String>) -> Self {
        let name_to_index = names
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self {
            names,
            name_to_index,
        }
    }

    /// Get the number of columns.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Check if there are no columns.
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Get the index of a column by name.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    /// Get all column names.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

/// A single row returned from a database query.
#[derive(Debug, Clone)]
pub struct Row {
    values: Vec<Value>,
    columns: Arc<ColumnInfo>,
}

impl Row {
    /// Create a new row with the given columns and values.
    ///
    /// For multiple rows from the same result set, prefer `with_columns`.
    pub fn new(column_names: Vec<String>, values: Vec<Value>) -> Self {
        let columns = Arc::new(ColumnInfo::new(column_names));
        Self { values, columns }
    }

    /// Create a new row with shared column metadata.
    pub fn with_columns(columns: Arc<ColumnInfo>, values: Vec<Value>) -> Self {
        Self { values, columns }
    }

    /// Build a row from `(name, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let (names, values): (Vec<String>, Vec<Value>) = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .unzip();
        Self::new(names, values)
    }

    /// Get the number of columns in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if this row is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Get a value by column index.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Get a value by column name.
    pub fn get_by_name(&self, name: &str) -> Option<&Value> {
        self.columns.index_of(name).and_then(|i| self.values.get(i))
    }

    /// Value of `alias.column`, or NULL when the row has no such key.
    pub fn get_qualified(&self, alias: &str, column: &str) -> &Value {
        self.get_by_name(&format!("{alias}.{column}"))
            .unwrap_or(&NULL)
    }

    /// Value of an aggregate selected as `name`.
    ///
    /// Accepts both `name` and `.name`, since drivers that report
    /// `table.column` keys prefix table-less expressions with a dot.
    pub fn get_aggregate(&self, name: &str) -> &Value {
        self.get_by_name(name)
            .or_else(|| self.get_by_name(&format!(".{name}")))
            .unwrap_or(&NULL)
    }

    /// Get a typed value by column name.
    #[allow(clippy::result_large_err)]
    pub fn get_named<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.get_by_name(name).ok_or_else(|| {
            Error::Type(TypeError {
                expected: std::any::type_name::<T>(),
                actual: format!("column '{}' not found", name),
                column: Some(name.to_string()),
            })
        })?;
        T::from_value(value).map_err(|e| match e {
            Error::Type(mut te) => {
                te.column = Some(name.to_string());
                Error::Type(te)
            }
            e => e,
        })
    }

    /// Get all column names.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.names().iter().map(String::as_str)
    }

    /// Iterate over (column_name, value) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }
}

/// Trait for converting from a `Value` to a typed value.
pub trait FromValue: Sized {
    /// Convert from a Value, returning an error if the conversion fails.
    #[allow(clippy::result_large_err)]
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch(expected: &'static str, value: &Value) -> Error {
    Error::Type(TypeError {
        expected,
        actual: value.type_name().to_string(),
        column: None,
    })
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_bool().ok_or_else(|| mismatch("bool", value))
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        let v = value.as_i64().ok_or_else(|| mismatch("i32", value))?;
        i32::try_from(v).map_err(|_| {
            Error::Type(TypeError {
                expected: "i32",
                actual: format!("value {} out of range", v),
                column: None,
            })
        })
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_i64().ok_or_else(|| mismatch("i64", value))
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| mismatch("f64", value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(s) => Ok(s.clone()),
            Value::Int(v) => Ok(v.to_string()),
            Value::BigInt(v) => Ok(v.to_string()),
            _ => Err(mismatch("String", value)),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Date(d) => Ok(*d),
            _ => Err(mismatch("NaiveDate", value)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            _ => Err(mismatch("NaiveDateTime", value)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Row {
        Row::from_pairs([
            ("p.id", Value::Int(1)),
            ("p.title", Value::Text("T".into())),
            (".userPosts", Value::Text("3,5".into())),
            ("tags", Value::Null),
        ])
    }

    #[test]
    fn qualified_lookup_defaults_to_null() {
        let row = sample();
        assert_eq!(row.get_qualified("p", "title"), &Value::Text("T".into()));
        assert_eq!(row.get_qualified("p", "body"), &Value::Null);
        assert_eq!(row.get_qualified("u", "id"), &Value::Null);
    }

    #[test]
    fn aggregate_lookup_accepts_leading_dot() {
        let row = sample();
        assert_eq!(row.get_aggregate("userPosts"), &Value::Text("3,5".into()));
        assert_eq!(row.get_aggregate("tags"), &Value::Null);
        assert_eq!(row.get_aggregate("missing"), &Value::Null);
    }

    #[test]
    fn typed_access_reports_column() {
        let row = sample();
        assert_eq!(row.get_named::<i64>("p.id").unwrap(), 1);
        assert_eq!(row.get_named::<Option<i64>>("tags").unwrap(), None);

        let err = row.get_named::<bool>("p.title").unwrap_err();
        match err {
            Error::Type(te) => assert_eq!(te.column.as_deref(), Some("p.title")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn out_of_range_i32() {
        let err = i32::from_value(&Value::BigInt(i64::MAX)).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }
}
