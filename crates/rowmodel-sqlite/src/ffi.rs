//! The slice of the SQLite C API this driver uses.
//!
//! Bindings come from `libsqlite3-sys` with the bundled amalgamation, so the
//! names here are the C names unchanged.

use std::ffi::{CStr, c_int};

pub use libsqlite3_sys::{
    SQLITE_AUTH, SQLITE_BLOB, SQLITE_BUSY, SQLITE_CONSTRAINT, SQLITE_DONE, SQLITE_ERROR,
    SQLITE_FLOAT, SQLITE_INTEGER, SQLITE_INTERRUPT, SQLITE_LOCKED, SQLITE_NOTFOUND, SQLITE_NULL,
    SQLITE_OK, SQLITE_OPEN_CREATE, SQLITE_OPEN_FULLMUTEX, SQLITE_OPEN_NOMUTEX,
    SQLITE_OPEN_PRIVATECACHE, SQLITE_OPEN_READONLY, SQLITE_OPEN_READWRITE,
    SQLITE_OPEN_SHAREDCACHE, SQLITE_OPEN_URI, SQLITE_PERM, SQLITE_ROW, SQLITE_TEXT,
    SQLITE_TOOBIG, SQLITE_TRANSIENT, sqlite3, sqlite3_bind_blob, sqlite3_bind_double,
    sqlite3_bind_int, sqlite3_bind_int64, sqlite3_bind_null, sqlite3_bind_text,
    sqlite3_busy_timeout, sqlite3_changes, sqlite3_close, sqlite3_column_blob,
    sqlite3_column_bytes, sqlite3_column_count, sqlite3_column_double, sqlite3_column_int64,
    sqlite3_column_name, sqlite3_column_text, sqlite3_column_type, sqlite3_errcode,
    sqlite3_errmsg, sqlite3_errstr, sqlite3_exec, sqlite3_finalize, sqlite3_free,
    sqlite3_last_insert_rowid, sqlite3_libversion, sqlite3_libversion_number, sqlite3_open_v2,
    sqlite3_prepare_v2, sqlite3_step, sqlite3_stmt,
};

/// Get the SQLite library version as a string.
pub fn version() -> &'static str {
    // SAFETY: sqlite3_libversion returns a static string
    unsafe {
        let ptr = sqlite3_libversion();
        CStr::from_ptr(ptr).to_str().unwrap_or("unknown")
    }
}

/// Get the SQLite library version as a number.
pub fn version_number() -> i32 {
    // SAFETY: sqlite3_libversion_number is always safe to call
    unsafe { sqlite3_libversion_number() }
}

/// Convert an SQLite result code to a human-readable string.
pub fn error_string(code: c_int) -> &'static str {
    // SAFETY: sqlite3_errstr returns a static string for any code
    unsafe {
        let ptr = sqlite3_errstr(code);
        if ptr.is_null() {
            return "unknown error";
        }
        CStr::from_ptr(ptr).to_str().unwrap_or("unknown error")
    }
}

/// Last error message recorded on `db`.
///
/// # Safety
/// `db` must be a valid, open connection handle.
pub unsafe fn last_error(db: *mut sqlite3) -> String {
    // SAFETY: caller guarantees db is valid; errmsg never returns dangling memory
    unsafe {
        let ptr = sqlite3_errmsg(db);
        if ptr.is_null() {
            return error_string(sqlite3_errcode(db)).to_string();
        }
        CStr::from_ptr(ptr).to_string_lossy().into_owned()
    }
}
