//! Core types and traits for rowmodel.
//!
//! This crate provides the foundations the query and session layers build on:
//!
//! - `Model` trait mapping a struct to a table, with hydration and serialization
//! - `Relation` descriptors for belongs-to, has-many and many-to-many edges
//! - `Registry` memoizing per-model metadata behind a `Cache`
//! - `ValueTransformer` for storage <-> domain column conversion
//! - `Connection` trait for synchronous database access
//! - `Value`/`Row` for dynamically typed result data

pub mod cache;
pub mod connection;
pub mod error;
pub mod identifiers;
pub mod metadata;
pub mod model;
pub mod relationship;
pub mod row;
pub mod transform;
pub mod value;

pub use cache::{Cache, MemoryCache};
pub use connection::{Connection, Transaction};
pub use error::{
    ConfigError, ConnectionError, ConnectionErrorKind, ConsistencyError, ConsistencyErrorKind,
    Error, QueryError, QueryErrorKind, Result, TransactionError, TransactionErrorKind, TypeError,
    UsageError, UsageErrorKind,
};
pub use identifiers::{quote_ident, quote_qualified};
pub use metadata::{ModelMeta, Registry};
pub use model::{
    AnyModel, ID_COLUMN, Model, ModelState, Related, RowContext, Timestamps, hydrate,
    hydrate_boxed, serialize, unknown_column,
};
pub use relationship::{LinkTable, ModelRef, Relation, RelationKind};
pub use row::{ColumnInfo, FromValue, Row};
pub use transform::{BooleanTransformer, DateTimeTransformer, DateTransformer, ValueTransformer};
pub use value::Value;
