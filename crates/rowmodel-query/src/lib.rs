//! Query construction and row hydration for rowmodel.
//!
//! `rowmodel-query` turns a fluent query description into parameterized SQL,
//! runs it through a [`Connection`](rowmodel_core::Connection), and rebuilds
//! typed models from the rows that come back.
//!
//! # Role In The Architecture
//!
//! - **Clauses**: `alias.column <operator>` strings parsed into [`Clause`]
//!   and [`OrderBy`], with `IN ?` placeholder expansion.
//! - **Joins**: belongs-to relations are joined inline and hydrated from the
//!   same row; to-many relations are aggregated into id lists.
//! - **Pre-fetch**: one follow-up query per to-many relation resolves every
//!   aggregated id of a result set, avoiding a query per row.
//! - **Dialects**: MySQL and SQLite differ in how result columns are named
//!   and how an unbounded LIMIT is spelled.
//!
//! Most users reach the builder through `Session::find` in the `rowmodel`
//! facade crate.

pub mod builder;
pub mod clause;
pub mod dialect;
pub mod iter;
pub mod join;
pub mod prefetch;

#[cfg(test)]
mod fixtures;

pub use builder::{CompiledQuery, QueryBuilder, QueryContext, QueryPlan};
pub use clause::{Clause, OrderBy, OrderDirection};
pub use dialect::{Dialect, GroupConcatLimit};
pub use iter::ModelIter;
pub use join::{Join, JoinType};
pub use prefetch::{PrefetchCache, parse_id_list};
