//! Per-model metadata and its memoizing registry.
//!
//! [`ModelMeta`] gathers what a model type declares about itself: table
//! name, ordered columns, value transformers and relations. The
//! [`Registry`] computes it at most once per model type and hands out
//! shared copies from a [`Cache`].

use crate::Result;
use crate::cache::{Cache, MemoryCache};
use crate::error::{Error, UsageErrorKind};
use crate::model::Model;
use crate::relationship::{ModelRef, Relation};
use crate::transform::ValueTransformer;
use crate::value::Value;
use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Class-level facts about one model type.
#[derive(Debug, Clone)]
pub struct ModelMeta {
    name: &'static str,
    table: &'static str,
    columns: Vec<&'static str>,
    transformers: HashMap<&'static str, Arc<dyn ValueTransformer>>,
    relations: Vec<Relation>,
}

impl ModelMeta {
    /// Call `M`'s class-level accessors once each.
    pub fn describe<M: Model>() -> Self {
        Self {
            name: M::model_name(),
            table: M::table_name(),
            columns: M::columns(),
            transformers: M::value_transformers().into_iter().collect(),
            relations: M::relations(),
        }
    }

    /// Short type name, used in error messages.
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn table_name(&self) -> &'static str {
        self.table
    }

    /// Declared columns in declaration order.
    pub fn columns(&self) -> &[&'static str] {
        &self.columns
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| *c == column)
    }

    pub fn value_transformers(&self) -> &HashMap<&'static str, Arc<dyn ValueTransformer>> {
        &self.transformers
    }

    pub fn transformer(&self, column: &str) -> Option<&dyn ValueTransformer> {
        self.transformers.get(column).map(|t| &**t)
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    /// Look up a declared relation by name.
    pub fn relation(&self, name: &str) -> Result<&Relation> {
        self.relations
            .iter()
            .find(|r| r.name() == name)
            .ok_or_else(|| {
                Error::usage(
                    UsageErrorKind::UnknownRelation,
                    format!("{} is not a relation of {}", name, self.name),
                )
            })
    }

    /// Apply the column's `to_storage` transform to a non-null value.
    pub fn to_storage(&self, column: &str, value: Value) -> Result<Value> {
        match self.transformer(column) {
            Some(t) if !value.is_null() => t.to_storage(value),
            _ => Ok(value),
        }
    }

    /// Apply the column's `from_storage` transform to a non-null value.
    pub fn from_storage(&self, column: &str, value: Value) -> Result<Value> {
        match self.transformer(column) {
            Some(t) if !value.is_null() => t.from_storage(value),
            _ => Ok(value),
        }
    }

    fn check(&self) -> Result<()> {
        for (i, relation) in self.relations.iter().enumerate() {
            if self.relations[..i].iter().any(|r| r.name() == relation.name()) {
                return Err(Error::usage(
                    UsageErrorKind::DuplicateRelation,
                    format!(
                        "relation {} is declared twice on {}",
                        relation.name(),
                        self.name
                    ),
                ));
            }
        }
        Ok(())
    }
}

/// Memoized metadata for every model type the engine touches.
///
/// Build one per process (or per session) and pass it by reference.
pub struct Registry {
    cache: Box<dyn Cache<TypeId, Arc<ModelMeta>>>,
}

impl Registry {
    /// Registry backed by an in-memory cache.
    pub fn new() -> Self {
        Self::with_cache(MemoryCache::new())
    }

    /// Registry backed by a caller-provided cache.
    pub fn with_cache(cache: impl Cache<TypeId, Arc<ModelMeta>> + 'static) -> Self {
        Self {
            cache: Box::new(cache),
        }
    }

    /// Metadata for `M`.
    pub fn meta<M: Model>(&self) -> Result<Arc<ModelMeta>> {
        self.resolve(&ModelRef::of::<M>())
    }

    /// Metadata for a model known only through a [`ModelRef`].
    ///
    /// Two callers racing on a cold key may both describe the model; the
    /// result is identical either way.
    pub fn resolve(&self, model: &ModelRef) -> Result<Arc<ModelMeta>> {
        let key = model.model_type_id();
        if let Some(meta) = self.cache.get(&key) {
            return Ok(meta);
        }
        let meta = model.describe();
        meta.check()?;
        tracing::trace!(model = meta.name(), table = meta.table_name(), "metadata cached");
        let meta = Arc::new(meta);
        self.cache.set(key, Arc::clone(&meta));
        Ok(meta)
    }

    pub fn table_name<M: Model>(&self) -> Result<&'static str> {
        Ok(self.meta::<M>()?.table_name())
    }

    pub fn columns<M: Model>(&self) -> Result<Vec<&'static str>> {
        Ok(self.meta::<M>()?.columns().to_vec())
    }

    pub fn value_transformers<M: Model>(
        &self,
    ) -> Result<HashMap<&'static str, Arc<dyn ValueTransformer>>> {
        Ok(self.meta::<M>()?.value_transformers().clone())
    }

    pub fn relations<M: Model>(&self) -> Result<Vec<Relation>> {
        Ok(self.meta::<M>()?.relations().to_vec())
    }

    /// A single relation of `M`, or an `UnknownRelation` usage error.
    pub fn relation<M: Model>(&self, name: &str) -> Result<Relation> {
        self.meta::<M>()?.relation(name).copied()
    }

    /// Forget everything; the next lookup describes models afresh.
    pub fn clear(&self) {
        self.cache.clear();
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry").finish_non_exhaustive()
    }
}
