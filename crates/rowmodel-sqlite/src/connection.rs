//! SQLite connection implementation.
//!
//! Safe wrappers around SQLite's C API implementing the blocking
//! [`Connection`] trait from rowmodel-core.

// Allow casts in FFI code where we need to match C types exactly
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::result_large_err)] // Error type is defined in rowmodel-core
#![allow(clippy::borrow_as_ptr)] // FFI requires raw pointers

use crate::ffi;
use crate::types;
use rowmodel_core::error::{
    ConnectionError, ConnectionErrorKind, QueryError, QueryErrorKind, TransactionError,
    TransactionErrorKind,
};
use rowmodel_core::{ColumnInfo, Connection, Error, Result, Row, Value};
use serde::{Deserialize, Serialize};
use std::ffi::{CStr, CString, c_int};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard};

/// Configuration for opening SQLite connections.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// Path to the database file, or ":memory:" for in-memory database.
    pub path: String,
    /// Open flags (read-only, read-write, create, etc.)
    pub flags: OpenFlags,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
}

/// Flags controlling how the database is opened.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenFlags {
    /// Open for reading only.
    pub read_only: bool,
    /// Open for reading and writing.
    pub read_write: bool,
    /// Create the database if it doesn't exist.
    pub create: bool,
    /// Enable URI filename interpretation.
    pub uri: bool,
    /// Open in multi-thread mode (connections not shared between threads).
    pub no_mutex: bool,
    /// Open in serialized mode (connections can be shared).
    pub full_mutex: bool,
    /// Enable shared cache mode.
    pub shared_cache: bool,
    /// Disable shared cache mode.
    pub private_cache: bool,
}

impl OpenFlags {
    /// Create flags for read-only access.
    pub fn read_only() -> Self {
        Self {
            read_only: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access (database must exist).
    pub fn read_write() -> Self {
        Self {
            read_write: true,
            ..Default::default()
        }
    }

    /// Create flags for read-write access with creation if needed.
    pub fn create_read_write() -> Self {
        Self {
            read_write: true,
            create: true,
            ..Default::default()
        }
    }

    fn to_sqlite_flags(self) -> c_int {
        let mut flags = 0;

        if self.read_only {
            flags |= ffi::SQLITE_OPEN_READONLY;
        }
        if self.read_write {
            flags |= ffi::SQLITE_OPEN_READWRITE;
        }
        if self.create {
            flags |= ffi::SQLITE_OPEN_CREATE;
        }
        if self.uri {
            flags |= ffi::SQLITE_OPEN_URI;
        }
        if self.no_mutex {
            flags |= ffi::SQLITE_OPEN_NOMUTEX;
        }
        if self.full_mutex {
            flags |= ffi::SQLITE_OPEN_FULLMUTEX;
        }
        if self.shared_cache {
            flags |= ffi::SQLITE_OPEN_SHAREDCACHE;
        }
        if self.private_cache {
            flags |= ffi::SQLITE_OPEN_PRIVATECACHE;
        }

        // Default to read-write if no mode specified
        if flags & (ffi::SQLITE_OPEN_READONLY | ffi::SQLITE_OPEN_READWRITE) == 0 {
            flags |= ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE;
        }

        flags
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: ":memory:".to_string(),
            flags: OpenFlags::create_read_write(),
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Create a new config for a file-based database.
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Create a new config for an in-memory database.
    pub fn memory() -> Self {
        Self::default()
    }

    /// Set open flags.
    pub fn flags(mut self, flags: OpenFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Set busy timeout.
    pub fn busy_timeout(mut self, ms: u32) -> Self {
        self.busy_timeout_ms = ms;
        self
    }
}

/// Inner state of the SQLite connection, protected by a mutex.
struct SqliteInner {
    db: *mut ffi::sqlite3,
    in_transaction: bool,
}

// SAFETY: the handle is only touched while the owning Mutex is held, so it is
// never used from two threads at once.
unsafe impl Send for SqliteInner {}

/// A connection to a SQLite database.
///
/// A mutex-guarded SQLite handle; every call takes the lock for the duration
/// of one statement.
pub struct SqliteConnection {
    inner: Mutex<SqliteInner>,
    path: String,
}

impl SqliteConnection {
    /// Open a new SQLite connection with the given configuration.
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let c_path = CString::new(config.path.as_str()).map_err(|_| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: "Invalid path: contains null byte".to_string(),
                source: None,
            })
        })?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        let flags = config.flags.to_sqlite_flags();

        // SAFETY: We pass valid pointers and check the return value
        let rc = unsafe { ffi::sqlite3_open_v2(c_path.as_ptr(), &mut db, flags, ptr::null()) };

        if rc != ffi::SQLITE_OK {
            let msg = if db.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: db was allocated by open_v2 and is closed right after
                unsafe {
                    let msg = ffi::last_error(db);
                    ffi::sqlite3_close(db);
                    msg
                }
            };

            return Err(Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Connect,
                message: format!("Failed to open database: {}", msg),
                source: None,
            }));
        }

        if config.busy_timeout_ms > 0 {
            let ms = c_int::try_from(config.busy_timeout_ms).unwrap_or(c_int::MAX);
            // SAFETY: db is valid
            unsafe {
                ffi::sqlite3_busy_timeout(db, ms);
            }
        }

        tracing::debug!(path = %config.path, "sqlite database opened");

        Ok(Self {
            inner: Mutex::new(SqliteInner {
                db,
                in_transaction: false,
            }),
            path: config.path.clone(),
        })
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self> {
        Self::open(&SqliteConfig::memory())
    }

    /// Open a file-based database.
    pub fn open_file(path: impl Into<String>) -> Result<Self> {
        Self::open(&SqliteConfig::file(path))
    }

    /// Get the database path.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Whether a transaction opened through [`Connection::begin`] is active.
    pub fn in_transaction(&self) -> Result<bool> {
        Ok(self.lock()?.in_transaction)
    }

    fn lock(&self) -> Result<MutexGuard<'_, SqliteInner>> {
        self.inner.lock().map_err(|_| {
            Error::Connection(ConnectionError {
                kind: ConnectionErrorKind::Disconnected,
                message: "SQLite connection mutex poisoned".to_string(),
                source: None,
            })
        })
    }

    /// Execute SQL directly without preparing (for DDL, several statements, etc.)
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        let inner = self.lock()?;
        exec(inner.db, sql)
    }

    /// Get the last insert rowid.
    pub fn last_insert_rowid(&self) -> Result<i64> {
        let inner = self.lock()?;
        // SAFETY: db is valid
        Ok(unsafe { ffi::sqlite3_last_insert_rowid(inner.db) })
    }

    /// Get the number of rows changed by the last statement.
    pub fn changes(&self) -> Result<u64> {
        let inner = self.lock()?;
        // SAFETY: db is valid
        let changes = unsafe { ffi::sqlite3_changes(inner.db) };
        Ok(u64::try_from(changes).unwrap_or(0))
    }

    /// Prepare and execute a query, returning all rows.
    fn query_sync(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let inner = self.lock()?;
        let stmt = Statement::prepare(inner.db, sql)?;
        stmt.bind_all(params)?;

        // SAFETY: stmt is valid
        let col_count = unsafe { ffi::sqlite3_column_count(stmt.raw) };
        let mut col_names = Vec::with_capacity(col_count.max(0) as usize);
        for i in 0..col_count {
            // SAFETY: stmt is valid, i < col_count
            let name =
                unsafe { types::column_name(stmt.raw, i) }.unwrap_or_else(|| format!("col{}", i));
            col_names.push(name);
        }
        let columns = Arc::new(ColumnInfo::new(col_names));

        let mut rows = Vec::new();
        loop {
            // SAFETY: stmt is valid
            match unsafe { ffi::sqlite3_step(stmt.raw) } {
                ffi::SQLITE_ROW => {
                    let mut values = Vec::with_capacity(columns.len());
                    for i in 0..col_count {
                        // SAFETY: stmt is valid, we just got SQLITE_ROW
                        values.push(unsafe { types::read_column(stmt.raw, i) });
                    }
                    rows.push(Row::with_columns(Arc::clone(&columns), values));
                }
                ffi::SQLITE_DONE => break,
                _ => return Err(step_error(inner.db, sql)),
            }
        }

        tracing::trace!(sql, rows = rows.len(), "sqlite query");
        Ok(rows)
    }

    /// Prepare and execute a statement, returning rows affected.
    fn execute_sync(&self, sql: &str, params: &[Value]) -> Result<(u64, i64)> {
        let inner = self.lock()?;
        let stmt = Statement::prepare(inner.db, sql)?;
        stmt.bind_all(params)?;

        // SAFETY: stmt is valid
        let rc = unsafe { ffi::sqlite3_step(stmt.raw) };
        match rc {
            ffi::SQLITE_DONE | ffi::SQLITE_ROW => {
                // SAFETY: db is valid; both reads happen under the same lock
                let (changes, rowid) = unsafe {
                    (
                        ffi::sqlite3_changes(inner.db),
                        ffi::sqlite3_last_insert_rowid(inner.db),
                    )
                };
                let changes = u64::try_from(changes).unwrap_or(0);
                tracing::trace!(sql, changes, "sqlite execute");
                Ok((changes, rowid))
            }
            _ => Err(step_error(inner.db, sql)),
        }
    }

    fn begin_sync(&self) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.in_transaction {
            return Err(Error::Transaction(TransactionError {
                kind: TransactionErrorKind::AlreadyActive,
                message: "Already in a transaction".to_string(),
            }));
        }
        exec(inner.db, "BEGIN")?;
        inner.in_transaction = true;
        tracing::debug!("sqlite BEGIN");
        Ok(())
    }

    fn finish_sync(&self, statement: &'static str) -> Result<()> {
        let mut inner = self.lock()?;
        if !inner.in_transaction {
            return Err(Error::Transaction(TransactionError {
                kind: TransactionErrorKind::NotActive,
                message: "Not in a transaction".to_string(),
            }));
        }
        let result = exec(inner.db, statement);
        // SQLite may have ended the transaction on its own after an error;
        // only a failed COMMIT can leave it open.
        if result.is_ok() || statement == "ROLLBACK" {
            inner.in_transaction = false;
        }
        tracing::debug!("sqlite {}", statement);
        result
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        if let Ok(inner) = self.inner.get_mut() {
            if !inner.db.is_null() {
                // SAFETY: db is valid and no statement outlives the call that
                // prepared it
                unsafe {
                    ffi::sqlite3_close(inner.db);
                }
                inner.db = ptr::null_mut();
            }
        }
    }
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Connection for SqliteConnection {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.query_sync(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.execute_sync(sql, params).map(|(changes, _)| changes)
    }

    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64> {
        self.execute_sync(sql, params).map(|(_, rowid)| rowid)
    }

    fn begin(&self) -> Result<()> {
        self.begin_sync()
    }

    fn commit(&self) -> Result<()> {
        self.finish_sync("COMMIT")
    }

    fn rollback(&self) -> Result<()> {
        self.finish_sync("ROLLBACK")
    }
}

/// A prepared statement, finalized on drop.
struct Statement<'a> {
    raw: *mut ffi::sqlite3_stmt,
    db: *mut ffi::sqlite3,
    sql: &'a str,
}

impl<'a> Statement<'a> {
    fn prepare(db: *mut ffi::sqlite3, sql: &'a str) -> Result<Self> {
        let c_sql = CString::new(sql).map_err(|_| null_byte(sql))?;
        let len = c_int::try_from(c_sql.as_bytes().len()).map_err(|_| {
            Error::Query(QueryError {
                kind: QueryErrorKind::DataTruncation,
                sql: Some(sql.to_string()),
                message: "SQL text too long".to_string(),
                source: None,
            })
        })?;

        let mut raw: *mut ffi::sqlite3_stmt = ptr::null_mut();
        // SAFETY: All pointers are valid
        let rc =
            unsafe { ffi::sqlite3_prepare_v2(db, c_sql.as_ptr(), len, &mut raw, ptr::null_mut()) };

        if rc != ffi::SQLITE_OK {
            if !raw.is_null() {
                // SAFETY: raw came from prepare_v2
                unsafe { ffi::sqlite3_finalize(raw) };
            }
            return Err(driver_error(db, sql, None));
        }

        Ok(Self { raw, db, sql })
    }

    fn bind_all(&self, params: &[Value]) -> Result<()> {
        for (i, param) in params.iter().enumerate() {
            let index = c_int::try_from(i + 1).unwrap_or(c_int::MAX);
            // SAFETY: stmt is valid, index is 1-based
            let rc = unsafe { types::bind_value(self.raw, index, param) };
            if rc != ffi::SQLITE_OK {
                return Err(driver_error(self.db, self.sql, Some(i + 1)));
            }
        }
        Ok(())
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        // SAFETY: raw is a valid statement that has not been finalized yet
        unsafe {
            ffi::sqlite3_finalize(self.raw);
        }
    }
}

fn exec(db: *mut ffi::sqlite3, sql: &str) -> Result<()> {
    let c_sql = CString::new(sql).map_err(|_| null_byte(sql))?;
    let mut errmsg: *mut std::ffi::c_char = ptr::null_mut();

    // SAFETY: All pointers are valid
    let rc = unsafe { ffi::sqlite3_exec(db, c_sql.as_ptr(), None, ptr::null_mut(), &mut errmsg) };

    if rc != ffi::SQLITE_OK {
        let message = if errmsg.is_null() {
            ffi::error_string(rc).to_string()
        } else {
            // SAFETY: errmsg was allocated by sqlite3_exec and is freed once
            unsafe {
                let msg = CStr::from_ptr(errmsg).to_string_lossy().into_owned();
                ffi::sqlite3_free(errmsg.cast());
                msg
            }
        };

        return Err(Error::Query(QueryError {
            kind: error_code_to_kind(rc),
            sql: Some(sql.to_string()),
            message,
            source: None,
        }));
    }

    Ok(())
}

fn null_byte(sql: &str) -> Error {
    Error::Query(QueryError {
        kind: QueryErrorKind::Syntax,
        sql: Some(sql.to_string()),
        message: "SQL contains null byte".to_string(),
        source: None,
    })
}

fn driver_error(db: *mut ffi::sqlite3, sql: &str, param_index: Option<usize>) -> Error {
    // SAFETY: db is valid
    let (msg, code) = unsafe { (ffi::last_error(db), ffi::sqlite3_errcode(db)) };
    let (kind, message) = match param_index {
        Some(index) => (
            QueryErrorKind::Database,
            format!("Failed to bind parameter {}: {}", index, msg),
        ),
        None => (error_code_to_kind(code), msg),
    };

    Error::Query(QueryError {
        kind,
        sql: Some(sql.to_string()),
        message,
        source: None,
    })
}

fn step_error(db: *mut ffi::sqlite3, sql: &str) -> Error {
    driver_error(db, sql, None)
}

fn error_code_to_kind(code: c_int) -> QueryErrorKind {
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => QueryErrorKind::Busy,
        ffi::SQLITE_PERM | ffi::SQLITE_AUTH => QueryErrorKind::Permission,
        ffi::SQLITE_NOTFOUND => QueryErrorKind::NotFound,
        ffi::SQLITE_TOOBIG => QueryErrorKind::DataTruncation,
        ffi::SQLITE_INTERRUPT => QueryErrorKind::Cancelled,
        _ => QueryErrorKind::Database,
    }
}
