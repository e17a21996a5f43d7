//! Database connection traits.
//!
//! - [`Connection`] - the SQL-executing collaborator the engine runs against
//! - [`Transaction`] - scope guard that rolls back unless committed
//!
//! Every call is a blocking round trip. Statements use `?` positional
//! placeholders and rows come back keyed by the driver's column names.

use crate::error::Result;
use crate::row::Row;
use crate::value::Value;

/// A database connection capable of executing queries.
///
/// # Example
///
/// ```rust,ignore
/// let rows = conn.query("SELECT * FROM `users` AS `u` WHERE `u`.`id` = ?", &[Value::Int(1)])?;
///
/// let tx = Transaction::begin(&conn)?;
/// conn.execute("DELETE FROM `users` WHERE `id` = ?", &[Value::Int(1)])?;
/// tx.commit()?;
/// ```
pub trait Connection {
    /// Execute a query and return all rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a query and return the first row, if any.
    fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    /// Execute a query and return the first column of the first row.
    ///
    /// NULL when the query produced no rows.
    fn query_scalar(&self, sql: &str, params: &[Value]) -> Result<Value> {
        Ok(self
            .query_one(sql, params)?
            .and_then(|row| row.get(0).cloned())
            .unwrap_or(Value::Null))
    }

    /// Execute a statement and return the number of affected rows.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute an INSERT and return the storage-generated identity.
    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64>;

    /// Open a transaction.
    fn begin(&self) -> Result<()>;

    /// Commit the open transaction.
    fn commit(&self) -> Result<()>;

    /// Roll back the open transaction.
    fn rollback(&self) -> Result<()>;
}

impl<C: Connection + ?Sized> Connection for &C {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        (**self).query(sql, params)
    }

    fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        (**self).query_one(sql, params)
    }

    fn query_scalar(&self, sql: &str, params: &[Value]) -> Result<Value> {
        (**self).query_scalar(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        (**self).execute(sql, params)
    }

    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64> {
        (**self).insert(sql, params)
    }

    fn begin(&self) -> Result<()> {
        (**self).begin()
    }

    fn commit(&self) -> Result<()> {
        (**self).commit()
    }

    fn rollback(&self) -> Result<()> {
        (**self).rollback()
    }
}

/// A database transaction.
///
/// If dropped without committing, the transaction is rolled back.
pub struct Transaction<'conn, C: Connection + ?Sized> {
    conn: &'conn C,
    /// Whether commit or rollback already ran
    finalized: bool,
}

impl<'conn, C: Connection + ?Sized> Transaction<'conn, C> {
    /// Begin a transaction on `conn`.
    pub fn begin(conn: &'conn C) -> Result<Self> {
        conn.begin()?;
        tracing::debug!("transaction opened");
        Ok(Self {
            conn,
            finalized: false,
        })
    }

    /// The connection this transaction runs on.
    pub fn connection(&self) -> &'conn C {
        self.conn
    }

    /// Commit the transaction.
    pub fn commit(mut self) -> Result<()> {
        self.finalized = true;
        self.conn.commit()?;
        tracing::debug!("transaction committed");
        Ok(())
    }

    /// Roll the transaction back.
    pub fn rollback(mut self) -> Result<()> {
        self.finalized = true;
        tracing::warn!("transaction rolled back");
        self.conn.rollback()
    }
}

impl<C: Connection + ?Sized> Drop for Transaction<'_, C> {
    fn drop(&mut self) {
        if !self.finalized {
            tracing::warn!("transaction dropped without commit, rolling back");
            if let Err(e) = self.conn.rollback() {
                tracing::warn!(error = %e, "rollback on drop failed");
            }
        }
    }
}
