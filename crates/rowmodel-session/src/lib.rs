//! Persistence gateway for rowmodel.
//!
//! `rowmodel-session` is the **write layer**. A [`Session`] owns a
//! connection and the metadata registry, hands out query builders, and turns
//! model state into INSERT, UPDATE and DELETE statements.
//!
//! # Role In The Architecture
//!
//! - **Queries**: [`Session::find`] roots a `QueryBuilder` on a model.
//! - **Single writes**: [`Session::save`] inserts or updates, [`Session::delete`]
//!   deletes by primary key.
//! - **Bulk writes**: [`Session::save_all`] and [`Session::delete_all`] run in
//!   one transaction and leave nothing behind when any item fails.
//!
//! # Example
//!
//! ```ignore
//! let session = Session::with_config(conn, SessionConfig::default().dialect(Dialect::Sqlite));
//!
//! let mut post = Post { title: Some("Hello".into()), ..Post::default() };
//! session.save(&mut post)?;
//!
//! let found = session.find::<Post>("p")?.by_id(post.id().unwrap_or_default())?.fetch_one()?;
//! ```

pub mod ops;

pub use ops::PendingOp;

use chrono::{NaiveDateTime, SubsecRound, Utc};
use rowmodel_core::error::ConfigError;
use rowmodel_core::{Connection, Error, Model, Registry, Result, Transaction};
use rowmodel_query::{Dialect, GroupConcatLimit, QueryBuilder, QueryContext};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Configuration for a [`Session`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// SQL dialect of the connection.
    pub dialect: Dialect,
    /// Explicit `GROUP_CONCAT` length limit (MySQL only).
    pub group_concat_max_len: Option<u64>,
}

impl SessionConfig {
    /// Parse a configuration from JSON, e.g. `{"dialect": "sqlite"}`.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| {
            Error::Config(ConfigError {
                message: format!("invalid session configuration: {e}"),
                source: Some(Box::new(e)),
            })
        })
    }

    #[must_use]
    pub fn dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    #[must_use]
    pub fn group_concat_max_len(mut self, max_len: u64) -> Self {
        self.group_concat_max_len = Some(max_len);
        self
    }
}

/// Current UTC time without sub-second precision.
pub fn utc_now_seconds() -> NaiveDateTime {
    Utc::now().naive_utc().trunc_subsecs(0)
}

/// A connection plus everything needed to query and persist models on it.
pub struct Session<C: Connection> {
    conn: C,
    registry: Arc<Registry>,
    config: SessionConfig,
    group_concat: GroupConcatLimit,
    clock: fn() -> NaiveDateTime,
}

impl<C: Connection> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl<C: Connection> Session<C> {
    /// Session with the default configuration and a fresh registry.
    pub fn new(conn: C) -> Self {
        Self::with_config(conn, SessionConfig::default())
    }

    pub fn with_config(conn: C, config: SessionConfig) -> Self {
        Self {
            group_concat: GroupConcatLimit::new(config.group_concat_max_len),
            conn,
            registry: Arc::new(Registry::new()),
            config,
            clock: utc_now_seconds,
        }
    }

    /// Share a registry between sessions.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = registry;
        self
    }

    /// Replace the clock used to stamp timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: fn() -> NaiveDateTime) -> Self {
        self.clock = clock;
        self
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Give back the connection.
    pub fn into_connection(self) -> C {
        self.conn
    }

    fn context(&self) -> QueryContext<'_> {
        QueryContext::new(&self.conn, &self.registry)
            .with_dialect(self.config.dialect)
            .with_group_concat_limit(&self.group_concat)
    }

    /// Start a query for `M`, with its table aliased `alias`.
    pub fn find<M: Model>(&self, alias: &str) -> Result<QueryBuilder<'_, M>> {
        QueryBuilder::new(self.context(), alias)
    }

    /// Stamp, serialize and build the write for one model.
    fn prepare_save<M: Model>(&self, model: &mut M) -> Result<PendingOp> {
        if !model.is_deleted() {
            model.before_serialize((self.clock)());
        }
        PendingOp::save(&self.registry, model)
    }

    /// Run a prepared write; inserts return the new id.
    fn run(&self, op: &PendingOp) -> Result<Option<i64>> {
        let (sql, params) = op.to_sql();
        tracing::debug!(%sql, params = params.len(), "executing write");
        match op {
            PendingOp::Insert { .. } => self.conn.insert(&sql, &params).map(Some),
            PendingOp::Update { .. } | PendingOp::Delete { .. } => {
                self.conn.execute(&sql, &params).map(|_| None)
            }
        }
    }

    /// Insert a new model or update a stored one.
    ///
    /// A new model receives the storage-generated id.
    #[tracing::instrument(level = "debug", skip_all, fields(model = M::model_name()))]
    pub fn save<M: Model>(&self, model: &mut M) -> Result<()> {
        let op = self.prepare_save(model)?;
        if let Some(id) = self.run(&op)? {
            model.set_id(id)?;
        }
        Ok(())
    }

    /// Save every model in one transaction.
    ///
    /// Ids and timestamps reach the models only once the transaction
    /// commits. On error everything is rolled back, the models are left
    /// untouched and the error is returned.
    #[tracing::instrument(level = "debug", skip_all, fields(model = M::model_name(), count = models.len()))]
    pub fn save_all<M: Model>(&self, models: &mut [M]) -> Result<()> {
        let tx = Transaction::begin(&self.conn)?;
        let mut staged = Vec::with_capacity(models.len());

        for model in models.iter() {
            let mut copy = model.clone();
            let written = self
                .prepare_save(&mut copy)
                .and_then(|op| self.run(&op));
            match written {
                Ok(id) => staged.push((copy, id)),
                Err(e) => {
                    tx.rollback()?;
                    return Err(e);
                }
            }
        }

        tx.commit()?;
        for (model, (mut copy, id)) in models.iter_mut().zip(staged) {
            if let Some(id) = id {
                copy.set_id(id)?;
            }
            *model = copy;
        }
        Ok(())
    }

    /// Delete a stored model by primary key.
    ///
    /// Returns whether a row was deleted; the model is marked deleted if so.
    #[tracing::instrument(level = "debug", skip_all, fields(model = M::model_name(), id = ?model.id()))]
    pub fn delete<M: Model>(&self, model: &mut M) -> Result<bool> {
        let op = PendingOp::delete(&self.registry, model)?;
        let (sql, params) = op.to_sql();
        tracing::debug!(%sql, "executing delete");
        let affected = self.conn.execute(&sql, &params)?;
        if affected == 0 {
            return Ok(false);
        }
        model.state_mut().mark_deleted();
        Ok(true)
    }

    /// Delete every model in one transaction.
    ///
    /// As soon as one delete matches no row the transaction is rolled back
    /// and `Ok(false)` is returned; errors roll back and propagate. Models
    /// are marked deleted only after the commit.
    #[tracing::instrument(level = "debug", skip_all, fields(model = M::model_name(), count = models.len()))]
    pub fn delete_all<M: Model>(&self, models: &mut [M]) -> Result<bool> {
        let tx = Transaction::begin(&self.conn)?;

        for model in models.iter() {
            let affected = PendingOp::delete(&self.registry, model).and_then(|op| {
                let (sql, params) = op.to_sql();
                tracing::debug!(%sql, "executing delete");
                self.conn.execute(&sql, &params)
            });
            match affected {
                Ok(0) => {
                    tx.rollback()?;
                    return Ok(false);
                }
                Ok(_) => {}
                Err(e) => {
                    tx.rollback()?;
                    return Err(e);
                }
            }
        }

        tx.commit()?;
        for model in models.iter_mut() {
            model.state_mut().mark_deleted();
        }
        Ok(true)
    }
}
