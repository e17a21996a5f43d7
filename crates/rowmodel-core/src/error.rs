//! Error types for rowmodel operations.

use std::fmt;

/// The primary error type for all rowmodel operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (open, close)
    Connection(ConnectionError),
    /// Statement preparation or execution errors reported by the driver
    Query(QueryError),
    /// Type conversion errors
    Type(TypeError),
    /// Transaction errors
    Transaction(TransactionError),
    /// Misuse of the API, raised at the call that caused it
    Usage(UsageError),
    /// Result data that contradicts what the query promised
    Consistency(ConsistencyError),
    /// Configuration errors
    Config(ConfigError),
    /// Serialization/deserialization errors
    Serde(String),
    /// Custom error with message
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to open the database
    Connect,
    /// Connection is no longer usable
    Disconnected,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// Constraint violation (unique, foreign key, etc.)
    Constraint,
    /// Table or column not found
    NotFound,
    /// Permission denied
    Permission,
    /// Data too large for column
    DataTruncation,
    /// Database locked or busy
    Busy,
    /// Interrupted
    Cancelled,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
}

#[derive(Debug)]
pub struct TransactionError {
    pub kind: TransactionErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionErrorKind {
    /// A transaction is already open on this connection
    AlreadyActive,
    /// Commit or rollback without an open transaction
    NotActive,
}

/// A caller used the API incorrectly.
///
/// Raised eagerly (at `join`, `filter`, `set_id`, `save`, ...) and never
/// deferred to execution time.
#[derive(Debug, Clone)]
pub struct UsageError {
    pub kind: UsageErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageErrorKind {
    /// Relation name not declared on the model
    UnknownRelation,
    /// Relation joined twice on one query
    DuplicateRelation,
    /// Alias already bound in the query
    DuplicateAlias,
    /// Clause references an alias the query does not know
    UnknownAlias,
    /// Clause text does not match `alias.column <suffix>`
    MalformedClause,
    /// Bound value count does not match the placeholders
    ArityMismatch,
    /// Primary key already assigned
    ImmutablePrimaryKey,
    /// Model was deleted and cannot be written again
    DeletedModel,
    /// Model has no primary key yet
    UnsavedModel,
    /// Column not declared on the model
    UnknownColumn,
}

/// Rows returned by the database disagree with the query that produced them.
#[derive(Debug, Clone)]
pub struct ConsistencyError {
    pub kind: ConsistencyErrorKind,
    pub model: String,
    pub relation: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsistencyErrorKind {
    /// A row references a related id the pre-fetch did not return
    PartialCache,
    /// An aggregated id list could not be parsed
    MalformedIdList,
    /// The driver reported a failed fetch
    FetchFailed,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl UsageError {
    pub fn new(kind: UsageErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl ConsistencyError {
    /// A pre-fetch left a referenced id unresolved.
    pub fn partial_cache(model: impl Into<String>, relation: impl Into<String>) -> Self {
        let model = model.into();
        let relation = relation.into();
        Self {
            kind: ConsistencyErrorKind::PartialCache,
            message: format!("Cannot use partially-filled cache for {model}.{relation}"),
            model,
            relation: Some(relation),
        }
    }
}

impl Error {
    /// Shorthand for building a usage error.
    pub fn usage(kind: UsageErrorKind, message: impl Into<String>) -> Self {
        Error::Usage(UsageError::new(kind, message))
    }

    /// Is this a misuse of the API?
    pub fn is_usage(&self) -> bool {
        matches!(self, Error::Usage(_))
    }

    /// The usage error kind, if this is one.
    pub fn usage_kind(&self) -> Option<UsageErrorKind> {
        match self {
            Error::Usage(u) => Some(u.kind),
            _ => None,
        }
    }

    /// Is this a data-consistency failure?
    pub fn is_consistency(&self) -> bool {
        matches!(self, Error::Consistency(_))
    }

    /// The consistency error kind, if this is one.
    pub fn consistency_kind(&self) -> Option<ConsistencyErrorKind> {
        match self {
            Error::Consistency(c) => Some(c.kind),
            _ => None,
        }
    }

    /// Get the SQL that caused this error, if available
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "Connection error: {}", e.message),
            Error::Query(e) => write!(f, "Query error: {}", e.message),
            Error::Type(e) => {
                if let Some(col) = &e.column {
                    write!(
                        f,
                        "Type error in column '{}': expected {}, found {}",
                        col, e.expected, e.actual
                    )
                } else {
                    write!(f, "Type error: expected {}, found {}", e.expected, e.actual)
                }
            }
            Error::Transaction(e) => write!(f, "Transaction error: {}", e.message),
            Error::Usage(e) => write!(f, "Usage error: {}", e.message),
            Error::Consistency(e) => write!(f, "Consistency error: {}", e.message),
            Error::Config(e) => write!(f, "Configuration error: {}", e.message),
            Error::Serde(msg) => write!(f, "Serialization error: {}", msg),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for UsageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<TransactionError> for Error {
    fn from(err: TransactionError) -> Self {
        Error::Transaction(err)
    }
}

impl From<UsageError> for Error {
    fn from(err: UsageError) -> Self {
        Error::Usage(err)
    }
}

impl From<ConsistencyError> for Error {
    fn from(err: ConsistencyError) -> Self {
        Error::Consistency(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serde(err.to_string())
    }
}

/// Result type alias for rowmodel operations.
pub type Result<T> = std::result::Result<T, Error>;
