//! Lazy, single-pass model sequence.

use crate::builder::QueryBuilder;
use crate::prefetch::PrefetchCache;
use rowmodel_core::{Model, Result, Row};
use std::fmt;
use std::iter::FusedIterator;
use std::vec;

enum State<'a, M: Model> {
    Pending(QueryBuilder<'a, M>),
    Streaming {
        query: QueryBuilder<'a, M>,
        rows: vec::IntoIter<Row>,
        cache: PrefetchCache,
    },
    Done,
}

/// Models produced by [`QueryBuilder::fetch_all`].
///
/// The query and its pre-fetches run on the first call to `next`. Rows are
/// hydrated one at a time in result order. The sequence cannot be
/// restarted; the first error ends it, and so does exhaustion, which also
/// releases the buffered rows and the pre-fetch cache.
pub struct ModelIter<'a, M: Model> {
    state: State<'a, M>,
}

impl<'a, M: Model> ModelIter<'a, M> {
    pub(crate) fn new(query: QueryBuilder<'a, M>) -> Self {
        Self {
            state: State::Pending(query),
        }
    }

    /// Whether the query has not run yet.
    pub fn is_pending(&self) -> bool {
        matches!(self.state, State::Pending(_))
    }
}

impl<M: Model> Iterator for ModelIter<'_, M> {
    type Item = Result<M>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match std::mem::replace(&mut self.state, State::Done) {
                State::Pending(query) => match query.execute() {
                    Ok((rows, cache)) => {
                        self.state = State::Streaming {
                            query,
                            rows: rows.into_iter(),
                            cache,
                        };
                    }
                    Err(e) => return Some(Err(e)),
                },
                State::Streaming {
                    query,
                    mut rows,
                    cache,
                } => {
                    let row = rows.next()?;
                    let item = query.hydrate_row(&row, &cache);
                    if item.is_ok() {
                        self.state = State::Streaming { query, rows, cache };
                    }
                    return Some(item);
                }
                State::Done => return None,
            }
        }
    }
}

impl<M: Model> FusedIterator for ModelIter<'_, M> {}

impl<M: Model> fmt::Debug for ModelIter<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Pending(_) => "pending",
            State::Streaming { .. } => "streaming",
            State::Done => "done",
        };
        f.debug_struct("ModelIter")
            .field("model", &M::model_name())
            .field("state", &state)
            .finish()
    }
}
