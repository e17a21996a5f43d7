//! rowmodel - relational rows to typed models.
//!
//! rowmodel maps rows of a relational database onto plain Rust structs,
//! builds SQL for queries that follow declared relations, and writes model
//! state back:
//!
//! - Fluent query builder with alias-qualified `where` and `order by` clauses
//! - Belongs-to joins hydrated inline from the same row
//! - Has-many and many-to-many joins collapsed to id lists and resolved with
//!   one follow-up query per relation, not one per row
//! - Value transformers for booleans, dates and datetimes
//! - A session for inserts, updates and deletes, with transactional bulk forms
//!
//! # Quick Start
//!
//! ```ignore
//! use rowmodel::prelude::*;
//!
//! #[derive(Debug, Clone, Default)]
//! struct Post {
//!     state: ModelState,
//!     title: Option<String>,
//!     author_id: Option<i64>,
//!     author: Option<User>,
//! }
//!
//! impl Model for Post {
//!     fn table_name() -> &'static str { "posts" }
//!     fn columns() -> Vec<&'static str> { vec!["id", "title", "authorId"] }
//!     fn relations() -> Vec<Relation> {
//!         vec![Relation::belongs_to::<User>("author", "authorId")]
//!     }
//!     // state, get_column, set_column, set_related ...
//! }
//!
//! let session = rowmodel::open_sqlite(&SqliteConfig::memory())?;
//!
//! let posts = session
//!     .find::<Post>("p")?
//!     .join("author", "u")?
//!     .filter("u.username = ?", ["alice"])?
//!     .order_by("p.id", "DESC")?
//!     .fetch_all()
//!     .collect::<Result<Vec<_>>>()?;
//! ```
//!
//! # Crates
//!
//! - `rowmodel-core`: `Model`, `Value`, `Row`, `Connection`, errors, metadata
//! - `rowmodel-query`: clause grammar, `QueryBuilder`, pre-fetch, `ModelIter`
//! - `rowmodel-session`: `Session` and `SessionConfig`
//! - `rowmodel-sqlite`: a blocking SQLite `Connection`

pub use rowmodel_core::error::{
    ConfigError, ConnectionError, ConnectionErrorKind, ConsistencyError, ConsistencyErrorKind,
    QueryError, QueryErrorKind, TransactionError, TransactionErrorKind, TypeError, UsageError,
    UsageErrorKind,
};
pub use rowmodel_core::{
    AnyModel, BooleanTransformer, Cache, ColumnInfo, Connection, DateTimeTransformer,
    DateTransformer, Error, FromValue, ID_COLUMN, LinkTable, MemoryCache, Model, ModelMeta,
    ModelRef, ModelState, Registry, Related, Relation, RelationKind, Result, Row, RowContext,
    Timestamps, Transaction, Value, ValueTransformer, hydrate, quote_ident, quote_qualified,
    serialize, unknown_column,
};
pub use rowmodel_query::{
    Clause, CompiledQuery, Dialect, Join, JoinType, ModelIter, OrderBy, OrderDirection,
    PrefetchCache, QueryBuilder, QueryContext, QueryPlan,
};
pub use rowmodel_session::{PendingOp, Session, SessionConfig, utc_now_seconds};
pub use rowmodel_sqlite::{OpenFlags, SqliteConfig, SqliteConnection};

/// Open a SQLite database and wrap it in a session using the SQLite dialect.
pub fn open_sqlite(config: &SqliteConfig) -> Result<Session<SqliteConnection>> {
    let conn = SqliteConnection::open(config)?;
    tracing::info!(
        path = %config.path,
        version = rowmodel_sqlite::sqlite_version(),
        "opened sqlite session"
    );
    Ok(Session::with_config(
        conn,
        SessionConfig::default().dialect(Dialect::Sqlite),
    ))
}

/// Commonly used types, for glob import.
pub mod prelude {
    pub use crate::{
        BooleanTransformer, Connection, DateTimeTransformer, DateTransformer, Dialect, Error,
        FromValue, LinkTable, Model, ModelState, OrderDirection, QueryBuilder, Related, Relation,
        Result, Row, Session, SessionConfig, SqliteConfig, SqliteConnection, Timestamps, Value,
        ValueTransformer, unknown_column,
    };
}
