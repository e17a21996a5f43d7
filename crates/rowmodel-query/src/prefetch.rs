//! Pre-fetch cache for to-many relations.
//!
//! A to-many join contributes one aggregated column per root row: the
//! comma-joined ids of its related rows. Before any root row is hydrated,
//! the ids of every row are unioned and the related models are fetched in
//! a single follow-up query per relation. Each root row then looks its ids
//! up in the cache; an id the follow-up did not return is an error.

use crate::builder::{QueryContext, QueryPlan};
use crate::clause::Clause;
use rowmodel_core::error::{ConsistencyError, ConsistencyErrorKind, Error};
use rowmodel_core::{AnyModel, ID_COLUMN, Result, Row, Value};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Related models keyed by relation name, then primary key.
///
/// Scoped to one top-level fetch.
#[derive(Debug, Default)]
pub struct PrefetchCache {
    relations: HashMap<&'static str, HashMap<i64, Box<dyn AnyModel>>>,
}

fn malformed(model: &str, relation: &str, raw: &str) -> Error {
    Error::Consistency(ConsistencyError {
        kind: ConsistencyErrorKind::MalformedIdList,
        model: model.to_string(),
        relation: Some(relation.to_string()),
        message: format!("Cannot parse id list '{raw}' for {model}.{relation}"),
    })
}

/// Ids in an aggregated column, deduplicated in first-seen order.
///
/// NULL and empty text mean no related rows.
pub fn parse_id_list(model: &str, relation: &str, raw: &Value) -> Result<Vec<i64>> {
    let text = match raw {
        Value::Null => return Ok(Vec::new()),
        Value::Text(s) => s.as_str(),
        Value::Bytes(b) => std::str::from_utf8(b)
            .map_err(|_| malformed(model, relation, &String::from_utf8_lossy(b)))?,
        other => {
            return other
                .as_i64()
                .map(|id| vec![id])
                .ok_or_else(|| malformed(model, relation, other.type_name()));
        }
    };

    let mut seen = HashSet::new();
    let mut ids = Vec::new();
    for part in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let id: i64 = part
            .parse()
            .map_err(|_| malformed(model, relation, text))?;
        if seen.insert(id) {
            ids.push(id);
        }
    }
    Ok(ids)
}

impl PrefetchCache {
    /// Fetch every related model referenced by `rows`, one query per
    /// to-many join of `plan`.
    pub(crate) fn build(ctx: QueryContext<'_>, plan: &QueryPlan, rows: &[Row]) -> Result<Self> {
        let mut cache = Self::default();
        let model = plan.meta().name();

        for join in plan.joins().iter().filter(|j| j.is_to_many()) {
            let name = join.name();
            let mut seen = HashSet::new();
            let mut ids = Vec::new();
            for row in rows {
                for id in parse_id_list(model, name, row.get_aggregate(name))? {
                    if seen.insert(id) {
                        ids.push(id);
                    }
                }
            }
            tracing::trace!(relation = name, ids = ids.len(), "pre-fetch id union");

            let mut by_id = HashMap::with_capacity(ids.len());
            if !ids.is_empty() {
                let mut follow_up = QueryPlan::new(Arc::clone(join.meta()), name);
                let clause = format!("{name}.{ID_COLUMN} IN ?");
                follow_up.filter(Clause::parse(&clause, ids.into_iter().map(Value::BigInt).collect())?)?;
                let compiled = follow_up.compile(ctx.dialect())?;
                tracing::debug!(sql = %compiled.sql, params = compiled.params.len(), "pre-fetching relation");

                for row in ctx.connection().query(&compiled.sql, &compiled.params)? {
                    let related = join.relation().model().hydrate(ctx.registry(), &row, name)?;
                    let Some(id) = related.primary_key() else {
                        return Err(Error::Consistency(ConsistencyError {
                            kind: ConsistencyErrorKind::FetchFailed,
                            model: model.to_string(),
                            relation: Some(name.to_string()),
                            message: format!(
                                "Pre-fetch for {model}.{name} returned a row without an id"
                            ),
                        }));
                    };
                    by_id.insert(id, related);
                }
            }
            cache.relations.insert(name, by_id);
        }

        Ok(cache)
    }

    /// Related models for one root row, in id-list order.
    pub fn resolve(
        &self,
        model: &str,
        relation: &str,
        raw: &Value,
    ) -> Result<Vec<Box<dyn AnyModel>>> {
        let ids = parse_id_list(model, relation, raw)?;
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let by_id = self
            .relations
            .get(relation)
            .ok_or_else(|| ConsistencyError::partial_cache(model, relation))?;
        ids.iter()
            .map(|id| {
                by_id
                    .get(id)
                    .cloned()
                    .ok_or_else(|| ConsistencyError::partial_cache(model, relation).into())
            })
            .collect()
    }

    /// Whether `relation` has a cached model with primary key `id`.
    pub fn contains(&self, relation: &str, id: i64) -> bool {
        self.relations
            .get(relation)
            .is_some_and(|by_id| by_id.contains_key(&id))
    }
}
