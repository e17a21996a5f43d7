//! SQL dialect differences the compiler has to care about.

use rowmodel_core::{Connection, Result, quote_ident, quote_qualified};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Target SQL dialect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// MySQL / MariaDB
    #[default]
    Mysql,
    /// SQLite
    Sqlite,
}

impl Dialect {
    /// Select-list entry for every column of a model under `alias`.
    ///
    /// MySQL reports `alias.column` keys for `` `alias`.* ``; SQLite does
    /// not, so each column is aliased explicitly.
    pub fn select_columns(self, alias: &str, columns: &[&str]) -> String {
        match self {
            Dialect::Mysql => format!("{}.*", quote_ident(alias)),
            Dialect::Sqlite => columns
                .iter()
                .map(|column| {
                    format!(
                        "{} AS {}",
                        quote_qualified(alias, column),
                        quote_ident(&format!("{alias}.{column}"))
                    )
                })
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Comma-joined list of `alias.column` values, selected as `name`.
    pub fn group_concat(self, alias: &str, column: &str, name: &str) -> String {
        format!(
            "GROUP_CONCAT({}) AS {}",
            quote_qualified(alias, column),
            quote_ident(name)
        )
    }

    /// LIMIT value that means "no limit", for offset-only queries.
    pub const fn unbounded_limit(self) -> &'static str {
        match self {
            Dialect::Mysql => "18446744073709551615",
            Dialect::Sqlite => "-1",
        }
    }
}

/// Explicit `GROUP_CONCAT` length limit for a connection.
///
/// MySQL truncates aggregated id lists at `group_concat_max_len` bytes
/// (1024 by default). When a limit is configured it is set on the
/// connection once, before the first query with a to-many join.
#[derive(Debug, Default)]
pub struct GroupConcatLimit {
    max_len: Option<u64>,
    applied: AtomicBool,
}

impl GroupConcatLimit {
    pub fn new(max_len: Option<u64>) -> Self {
        Self {
            max_len,
            applied: AtomicBool::new(false),
        }
    }

    pub fn max_len(&self) -> Option<u64> {
        self.max_len
    }

    /// Issue the session statement if it has not run yet.
    pub fn apply(&self, conn: &dyn Connection, dialect: Dialect) -> Result<()> {
        let Some(max_len) = self.max_len else {
            return Ok(());
        };
        if dialect != Dialect::Mysql || self.applied.load(Ordering::Acquire) {
            return Ok(());
        }
        let sql = format!("SET SESSION group_concat_max_len = {max_len}");
        tracing::debug!(%sql, "raising group_concat limit");
        conn.execute(&sql, &[])?;
        self.applied.store(true, Ordering::Release);
        Ok(())
    }
}
