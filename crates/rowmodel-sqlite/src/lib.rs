//! SQLite driver for rowmodel.
//!
// FFI bindings require unsafe code - this is expected for database drivers
#![allow(unsafe_code)]
//!
//! A blocking [`rowmodel_core::Connection`] over the bundled SQLite
//! amalgamation from `libsqlite3-sys`. Pair it with the SQLite dialect so
//! result rows carry `alias.column` keys:
//!
//! ```rust,ignore
//! use rowmodel_sqlite::SqliteConnection;
//! use rowmodel_core::{Connection, Value};
//!
//! let conn = SqliteConnection::open_memory()?;
//! conn.execute_raw("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")?;
//! let id = conn.insert("INSERT INTO users (name) VALUES (?)", &[Value::from("Alice")])?;
//! ```
//!
//! # Type Mapping
//!
//! | Value | SQLite Type |
//! |-------|-------------|
//! | `Bool` | INTEGER (0/1) |
//! | `Int`, `BigInt` | INTEGER |
//! | `Double` | REAL |
//! | `Text` | TEXT |
//! | `Bytes` | BLOB |
//! | `Date` | TEXT (`YYYY-MM-DD`) |
//! | `DateTime` | TEXT (`YYYY-MM-DD HH:MM:SS`) |
//! | `Json` | TEXT |
//!
//! # Thread Safety
//!
//! `SqliteConnection` is `Send` and `Sync`; a mutex serializes access to the
//! underlying handle.

pub mod connection;
pub mod ffi;
pub mod types;

pub use connection::{OpenFlags, SqliteConfig, SqliteConnection};

/// The SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// The SQLite library version number.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}
