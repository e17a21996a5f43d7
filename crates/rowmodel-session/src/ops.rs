//! Write statements derived from a model's serialized form.
//!
//! - INSERT lists every declared column except `id`
//! - UPDATE sets every declared column except `id`, keyed on `id`
//! - DELETE is keyed on `id` alone

use rowmodel_core::error::{Error, UsageErrorKind};
use rowmodel_core::{ID_COLUMN, Model, Registry, Result, Value, quote_ident, serialize};

/// A pending database write.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingOp {
    /// Insert a new row; the storage assigns the id.
    Insert {
        /// Table name.
        table: &'static str,
        /// Column names, `id` excluded.
        columns: Vec<&'static str>,
        /// Values to insert.
        values: Vec<Value>,
    },
    /// Overwrite an existing row.
    Update {
        table: &'static str,
        columns: Vec<&'static str>,
        values: Vec<Value>,
        id: i64,
    },
    /// Delete an existing row.
    Delete { table: &'static str, id: i64 },
}

impl PendingOp {
    /// INSERT for a new model, UPDATE for a stored one.
    pub fn save<M: Model>(registry: &Registry, model: &M) -> Result<Self> {
        if model.is_deleted() {
            return Err(Error::usage(
                UsageErrorKind::DeletedModel,
                format!("Cannot save a deleted {}", M::model_name()),
            ));
        }

        let meta = registry.meta::<M>()?;
        let raw = serialize(registry, model)?;
        let mut columns = Vec::with_capacity(meta.columns().len());
        let mut values = Vec::with_capacity(meta.columns().len());
        for (&column, value) in meta.columns().iter().zip(raw.iter().map(|(_, v)| v)) {
            if column != ID_COLUMN {
                columns.push(column);
                values.push(value.clone());
            }
        }

        Ok(match model.id() {
            None => PendingOp::Insert {
                table: meta.table_name(),
                columns,
                values,
            },
            Some(id) => PendingOp::Update {
                table: meta.table_name(),
                columns,
                values,
                id,
            },
        })
    }

    /// DELETE for a stored model.
    pub fn delete<M: Model>(registry: &Registry, model: &M) -> Result<Self> {
        if model.is_deleted() {
            return Err(Error::usage(
                UsageErrorKind::DeletedModel,
                format!("Cannot delete a deleted {}", M::model_name()),
            ));
        }
        let Some(id) = model.id() else {
            return Err(Error::usage(
                UsageErrorKind::UnsavedModel,
                format!("Cannot delete an unsaved {}", M::model_name()),
            ));
        };
        Ok(PendingOp::Delete {
            table: registry.table_name::<M>()?,
            id,
        })
    }

    /// SQL text and positional parameters.
    pub fn to_sql(&self) -> (String, Vec<Value>) {
        match self {
            PendingOp::Insert {
                table,
                columns,
                values,
            } => {
                let cols: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
                let placeholders = vec!["?"; columns.len()].join(", ");
                (
                    format!(
                        "INSERT INTO {} ({}) VALUES ({})",
                        quote_ident(table),
                        cols.join(", "),
                        placeholders
                    ),
                    values.clone(),
                )
            }
            PendingOp::Update {
                table,
                columns,
                values,
                id,
            } => {
                let sets: Vec<String> = columns
                    .iter()
                    .map(|c| format!("{} = ?", quote_ident(c)))
                    .collect();
                let mut params = values.clone();
                params.push(Value::BigInt(*id));
                (
                    format!(
                        "UPDATE {} SET {} WHERE {} = ?",
                        quote_ident(table),
                        sets.join(", "),
                        quote_ident(ID_COLUMN)
                    ),
                    params,
                )
            }
            PendingOp::Delete { table, id } => (
                format!(
                    "DELETE FROM {} WHERE {} = ?",
                    quote_ident(table),
                    quote_ident(ID_COLUMN)
                ),
                vec![Value::BigInt(*id)],
            ),
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            PendingOp::Insert { table, .. }
            | PendingOp::Update { table, .. }
            | PendingOp::Delete { table, .. } => table,
        }
    }
}
