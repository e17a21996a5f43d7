//! Fluent query builder.
//!
//! [`QueryBuilder`] accumulates joins, WHERE clauses, ordering and paging
//! for one root model, compiles them to parameterized SQL, and hydrates the
//! result rows. Builder methods take `self` by value and return the
//! extended builder, so a configured builder is a plain value that can be
//! cloned and reused.
//!
//! The model-independent part of a query lives in [`QueryPlan`] so that the
//! follow-up queries issued for to-many relations can be compiled for a
//! related model known only through its metadata.

use crate::clause::{Clause, OrderBy};
use crate::dialect::{Dialect, GroupConcatLimit};
use crate::iter::ModelIter;
use crate::join::Join;
use crate::prefetch::PrefetchCache;
use rowmodel_core::error::{Error, UsageErrorKind};
use rowmodel_core::{
    Connection, ID_COLUMN, Model, ModelMeta, Registry, Result, Row, RowContext, Value, hydrate,
    quote_ident, quote_qualified,
};
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::Arc;

/// Everything a query needs from its surroundings.
#[derive(Clone, Copy)]
pub struct QueryContext<'a> {
    conn: &'a dyn Connection,
    registry: &'a Registry,
    dialect: Dialect,
    group_concat: Option<&'a GroupConcatLimit>,
}

impl<'a> QueryContext<'a> {
    /// Context for the default (MySQL) dialect.
    pub fn new(conn: &'a dyn Connection, registry: &'a Registry) -> Self {
        Self {
            conn,
            registry,
            dialect: Dialect::default(),
            group_concat: None,
        }
    }

    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = dialect;
        self
    }

    /// Apply `limit` before the first query that aggregates ids.
    pub fn with_group_concat_limit(mut self, limit: &'a GroupConcatLimit) -> Self {
        self.group_concat = Some(limit);
        self
    }

    pub fn connection(&self) -> &'a dyn Connection {
        self.conn
    }

    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }
}

impl fmt::Debug for QueryContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryContext")
            .field("dialect", &self.dialect)
            .field("group_concat", &self.group_concat)
            .finish_non_exhaustive()
    }
}

/// Finalized SQL text and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// What an alias in a clause refers to.
enum Target<'p> {
    Model(&'p ModelMeta),
    LinkTable,
}

/// Model-independent description of a query.
#[derive(Debug, Clone)]
pub struct QueryPlan {
    meta: Arc<ModelMeta>,
    alias: String,
    joins: Vec<Join>,
    clauses: Vec<Clause>,
    order: Vec<OrderBy>,
    limit: u64,
    offset: u64,
}

impl QueryPlan {
    /// An unfiltered query over the model described by `meta`.
    pub fn new(meta: Arc<ModelMeta>, alias: impl Into<String>) -> Self {
        Self {
            meta,
            alias: alias.into(),
            joins: Vec::new(),
            clauses: Vec::new(),
            order: Vec::new(),
            limit: 0,
            offset: 0,
        }
    }

    pub fn meta(&self) -> &Arc<ModelMeta> {
        &self.meta
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn has_to_many(&self) -> bool {
        self.joins.iter().any(Join::is_to_many)
    }

    /// Only aliases declared in the FROM and JOIN parts resolve.
    fn target(&self, alias: &str) -> Option<Target<'_>> {
        if alias == self.alias {
            return Some(Target::Model(&self.meta));
        }
        for join in &self.joins {
            if join.alias() == alias {
                return Some(Target::Model(join.meta()));
            }
            if join.relation().link().is_some() && join.link_alias() == alias {
                return Some(Target::LinkTable);
            }
        }
        None
    }

    fn require_alias(&self, alias: &str, text: &str) -> Result<()> {
        if self.target(alias).is_none() {
            return Err(Error::usage(
                UsageErrorKind::UnknownAlias,
                format!("Unknown alias {alias} in clause: {text}"),
            ));
        }
        Ok(())
    }

    /// Join the root model's relation `name` under `alias`.
    pub fn join(&mut self, registry: &Registry, name: &str, alias: &str) -> Result<()> {
        let relation = *self.meta.relation(name)?;

        if self.joins.iter().any(|j| j.name() == relation.name()) {
            return Err(Error::usage(
                UsageErrorKind::DuplicateRelation,
                format!("Relation {name} is already joined"),
            ));
        }
        let meta = registry.resolve(relation.model())?;
        let join = Join::new(relation, alias, meta);

        let mut declared = vec![join.alias().to_string()];
        if relation.link().is_some() {
            declared.push(join.link_alias());
        }
        if let Some(taken) = declared.iter().find(|a| self.target(a).is_some()) {
            return Err(Error::usage(
                UsageErrorKind::DuplicateAlias,
                format!("Alias {taken} is already in use"),
            ));
        }

        self.joins.push(join);
        Ok(())
    }

    pub fn filter(&mut self, clause: Clause) -> Result<()> {
        self.require_alias(clause.alias(), &clause.to_sql())?;
        self.clauses.push(clause);
        Ok(())
    }

    pub fn order_by(&mut self, order: OrderBy) -> Result<()> {
        self.require_alias(order.alias(), &order.to_sql())?;
        self.order.push(order);
        Ok(())
    }

    /// Zero clears the limit.
    pub fn set_limit(&mut self, limit: u64) {
        self.limit = limit;
    }

    /// Zero clears the offset.
    pub fn set_offset(&mut self, offset: u64) {
        self.offset = offset;
    }

    fn from_and_joins(&self) -> String {
        let mut sql = format!(
            " FROM {} AS {}",
            quote_ident(self.meta.table_name()),
            quote_ident(&self.alias)
        );
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(&join.to_sql(&self.alias));
        }
        if !self.clauses.is_empty() {
            let conditions: Vec<String> = self.clauses.iter().map(Clause::to_sql).collect();
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql
    }

    /// WHERE values in clause order, transformed for storage, NULLs omitted.
    pub fn params(&self) -> Result<Vec<Value>> {
        let mut params = Vec::new();
        for clause in &self.clauses {
            let meta = match self.target(clause.alias()) {
                Some(Target::Model(meta)) => Some(meta),
                _ => None,
            };
            for value in clause.values() {
                let value = match meta {
                    Some(meta) => meta.to_storage(clause.column(), value.clone())?,
                    None => value.clone(),
                };
                if !value.is_null() {
                    params.push(value);
                }
            }
        }
        Ok(params)
    }

    pub fn compile(&self, dialect: Dialect) -> Result<CompiledQuery> {
        let mut select = vec![dialect.select_columns(&self.alias, self.meta.columns())];
        for join in &self.joins {
            if join.is_to_many() {
                select.push(dialect.group_concat(join.alias(), ID_COLUMN, join.name()));
            } else {
                select.push(dialect.select_columns(join.alias(), join.meta().columns()));
            }
        }

        let mut sql = format!("SELECT {}", select.join(", "));
        sql.push_str(&self.from_and_joins());

        if self.has_to_many() {
            sql.push_str(" GROUP BY ");
            sql.push_str(&quote_qualified(&self.alias, ID_COLUMN));
        }
        if !self.order.is_empty() {
            let terms: Vec<String> = self.order.iter().map(OrderBy::to_sql).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&terms.join(", "));
        }
        match (self.limit, self.offset) {
            (0, 0) => {}
            (0, offset) => {
                sql.push_str(&format!(
                    " LIMIT {} OFFSET {offset}",
                    dialect.unbounded_limit()
                ));
            }
            (limit, 0) => sql.push_str(&format!(" LIMIT {limit}")),
            (limit, offset) => sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}")),
        }

        Ok(CompiledQuery {
            sql,
            params: self.params()?,
        })
    }

    /// `COUNT(DISTINCT root.id)` over the same joins and WHERE clauses.
    pub fn compile_count(&self) -> Result<CompiledQuery> {
        let sql = format!(
            "SELECT COUNT(DISTINCT {}){}",
            quote_qualified(&self.alias, ID_COLUMN),
            self.from_and_joins()
        );
        Ok(CompiledQuery {
            sql,
            params: self.params()?,
        })
    }
}

type Hook<'a> = Rc<dyn Fn(&CompiledQuery) -> Result<()> + 'a>;

/// Fluent query over model `M`.
///
/// # Example
///
/// ```ignore
/// let posts = session
///     .find::<Post>("p")?
///     .join("author", "a")?
///     .filter("a.username = ?", ["bob"])?
///     .order_by("p.createdAt", "DESC")?
///     .limit(10)
///     .fetch_all();
///
/// for post in posts {
///     let post = post?;
///     println!("{:?}", post.author);
/// }
/// ```
pub struct QueryBuilder<'a, M: Model> {
    ctx: QueryContext<'a>,
    plan: QueryPlan,
    hook: Option<Hook<'a>>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for QueryBuilder<'_, M> {
    fn clone(&self) -> Self {
        Self {
            ctx: self.ctx,
            plan: self.plan.clone(),
            hook: self.hook.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> fmt::Debug for QueryBuilder<'_, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("model", &M::model_name())
            .field("plan", &self.plan)
            .field("hook", &self.hook.is_some())
            .finish_non_exhaustive()
    }
}

impl<'a, M: Model> QueryBuilder<'a, M> {
    /// Query all `M` rows, with the root table aliased `alias`.
    pub fn new(ctx: QueryContext<'a>, alias: &str) -> Result<Self> {
        let meta = ctx.registry.meta::<M>()?;
        Ok(Self {
            ctx,
            plan: QueryPlan::new(meta, alias),
            hook: None,
            _model: PhantomData,
        })
    }

    pub fn alias(&self) -> &str {
        self.plan.alias()
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    /// Join relation `relation` of `M` under `alias`.
    ///
    /// Fails without touching the connection when the relation is not
    /// declared, is already joined, or the alias is taken.
    pub fn join(mut self, relation: &str, alias: &str) -> Result<Self> {
        self.plan.join(self.ctx.registry, relation, alias)?;
        Ok(self)
    }

    /// Add an `alias.column <operator>` condition, AND-ed with the others.
    pub fn filter<V: Into<Value>>(
        mut self,
        clause: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Self> {
        let values = values.into_iter().map(Into::into).collect();
        self.plan.filter(Clause::parse(clause, values)?)?;
        Ok(self)
    }

    /// Add a condition that binds no values, such as `p.deletedAt IS NULL`.
    pub fn condition(mut self, clause: &str) -> Result<Self> {
        self.plan.filter(Clause::parse(clause, Vec::new())?)?;
        Ok(self)
    }

    /// Restrict to the root row with primary key `id`.
    pub fn by_id(self, id: i64) -> Result<Self> {
        let clause = format!("{}.{} = ?", self.plan.alias(), ID_COLUMN);
        self.filter(&clause, [id])
    }

    /// Sort by `alias.column`; `direction` other than `DESC` sorts ascending.
    pub fn order_by(mut self, column: &str, direction: &str) -> Result<Self> {
        self.plan.order_by(OrderBy::parse(column, direction)?)?;
        Ok(self)
    }

    /// Zero means no limit.
    pub fn limit(mut self, limit: u64) -> Self {
        self.plan.set_limit(limit);
        self
    }

    /// Zero means no offset.
    pub fn offset(mut self, offset: u64) -> Self {
        self.plan.set_offset(offset);
        self
    }

    /// Run `hook` on the compiled query right before it executes.
    ///
    /// An error from the hook aborts execution and is returned to the caller.
    pub fn inspect(mut self, hook: impl Fn(&CompiledQuery) -> Result<()> + 'a) -> Self {
        self.hook = Some(Rc::new(hook));
        self
    }

    /// The SQL and parameters `fetch_all` would run.
    pub fn compile(&self) -> Result<CompiledQuery> {
        self.plan.compile(self.ctx.dialect)
    }

    /// The SQL and parameters `count` would run.
    pub fn compile_count(&self) -> Result<CompiledQuery> {
        self.plan.compile_count()
    }

    /// Number of distinct root rows matching the WHERE clauses.
    ///
    /// Ordering, limit and offset are ignored.
    #[tracing::instrument(level = "debug", skip(self), fields(model = M::model_name()))]
    pub fn count(&self) -> Result<u64> {
        let compiled = self.compile_count()?;
        self.run_hook(&compiled)?;
        tracing::debug!(sql = %compiled.sql, params = compiled.params.len(), "counting");

        let value = self
            .ctx
            .conn
            .query_scalar(&compiled.sql, &compiled.params)?;
        if value.is_null() {
            return Ok(0);
        }
        value
            .as_i64()
            .and_then(|n| u64::try_from(n).ok())
            .ok_or_else(|| {
                Error::Type(rowmodel_core::TypeError {
                    expected: "non-negative integer count",
                    actual: value.type_name().to_string(),
                    column: None,
                })
            })
    }

    /// The first matching model, or `None` when nothing matches.
    #[tracing::instrument(level = "debug", skip(self), fields(model = M::model_name()))]
    pub fn fetch_one(self) -> Result<Option<M>> {
        self.limit(1).fetch_all().next().transpose()
    }

    /// Lazily run the query; nothing executes until the first `next()`.
    pub fn fetch_all(self) -> ModelIter<'a, M> {
        ModelIter::new(self)
    }

    fn run_hook(&self, compiled: &CompiledQuery) -> Result<()> {
        match &self.hook {
            Some(hook) => hook(compiled),
            None => Ok(()),
        }
    }

    /// Run the main query and the to-many pre-fetches.
    #[tracing::instrument(level = "debug", skip_all, fields(model = M::model_name()))]
    pub(crate) fn execute(&self) -> Result<(Vec<Row>, PrefetchCache)> {
        let compiled = self.compile()?;
        self.run_hook(&compiled)?;

        if self.plan.has_to_many() {
            if let Some(limit) = self.ctx.group_concat {
                limit.apply(self.ctx.conn, self.ctx.dialect)?;
            }
        }

        tracing::debug!(sql = %compiled.sql, params = compiled.params.len(), "executing query");
        let rows = self.ctx.conn.query(&compiled.sql, &compiled.params)?;
        let cache = PrefetchCache::build(self.ctx, &self.plan, &rows)?;
        Ok((rows, cache))
    }

    /// Build one `M` from a result row.
    pub(crate) fn hydrate_row(&self, row: &Row, cache: &PrefetchCache) -> Result<M> {
        let mut ctx = RowContext::default();
        for join in self.plan.joins() {
            if join.is_to_many() {
                let related =
                    cache.resolve(self.plan.meta().name(), join.name(), row.get_aggregate(join.name()))?;
                ctx.to_many.insert(join.name(), related);
            } else {
                ctx.join_aliases.insert(join.name(), join.alias());
            }
        }
        hydrate::<M>(self.ctx.registry, row, self.plan.alias(), ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{Post, Scripted, User};
    use rowmodel_core::{ConsistencyErrorKind, UsageErrorKind};

    fn text(s: &str) -> Value {
        Value::Text(s.to_string())
    }

    #[test]
    fn compiles_belongs_to_join() {
        let conn = Scripted::default();
        let registry = Registry::new();
        let compiled = QueryBuilder::<Post>::new(QueryContext::new(&conn, &registry), "p")
            .unwrap()
            .join("author", "a")
            .unwrap()
            .filter("a.username = ?", ["bob"])
            .unwrap()
            .order_by("p.id", "desc")
            .unwrap()
            .limit(10)
            .offset(20)
            .compile()
            .unwrap();

        assert_eq!(
            compiled.sql,
            "SELECT `p`.*, `a`.* FROM `posts` AS `p` \
             INNER JOIN `users` AS `a` ON `a`.`id` = `p`.`authorId` \
             WHERE `a`.`username` = ? ORDER BY `p`.`id` DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(compiled.params, [text("bob")]);
        assert!(conn.statements().is_empty());
    }

    #[test]
    fn compiles_has_many_with_group_by() {
        let conn = Scripted::default();
        let registry = Registry::new();
        let query = QueryBuilder::<User>::new(QueryContext::new(&conn, &registry), "u")
            .unwrap()
            .join("userPosts", "up")
            .unwrap()
            .filter("up.title LIKE ?", ["%rust%"])
            .unwrap();

        assert_eq!(
            query.compile().unwrap().sql,
            "SELECT `u`.*, GROUP_CONCAT(`up`.`id`) AS `userPosts` FROM `users` AS `u` \
             LEFT OUTER JOIN `posts` AS `up` ON `up`.`userId` = `u`.`id` \
             WHERE `up`.`title` LIKE ? GROUP BY `u`.`id`"
        );
    }

    #[test]
    fn compiles_many_to_many_for_sqlite() {
        let conn = Scripted::default();
        let registry = Registry::new();
        let ctx = QueryContext::new(&conn, &registry).with_dialect(Dialect::Sqlite);
        let compiled = QueryBuilder::<Post>::new(ctx, "p")
            .unwrap()
            .join("tags", "t")
            .unwrap()
            .offset(5)
            .compile()
            .unwrap();

        assert_eq!(
            compiled.sql,
            "SELECT `p`.`id` AS `p.id`, `p`.`title` AS `p.title`, \
             `p`.`authorId` AS `p.authorId`, `p`.`userId` AS `p.userId`, \
             GROUP_CONCAT(`t`.`id`) AS `tags` FROM `posts` AS `p` \
             LEFT OUTER JOIN `posts_tags` AS `t__link` ON `t__link`.`postId` = `p`.`id` \
             LEFT OUTER JOIN `tags` AS `t` ON `t`.`id` = `t__link`.`tagId` \
             GROUP BY `p`.`id` LIMIT -1 OFFSET 5"
        );
    }

    #[test]
    fn params_use_column_transformers() {
        let conn = Scripted::default();
        let registry = Registry::new();
        let compiled = QueryBuilder::<User>::new(QueryContext::new(&conn, &registry), "u")
            .unwrap()
            .filter("u.enabled = ?", [true])
            .unwrap()
            .filter("u.id IN ?", [3_i64, 4])
            .unwrap()
            .condition("u.username IS NOT NULL")
            .unwrap()
            .compile()
            .unwrap();

        assert!(
            compiled
                .sql
                .ends_with("WHERE `u`.`enabled` = ? AND `u`.`id` IN (?, ?) AND `u`.`username` IS NOT NULL")
        );
        assert_eq!(
            compiled.params,
            [Value::Int(1), Value::BigInt(3), Value::BigInt(4)]
        );
    }

    #[test]
    fn count_drops_order_and_paging() {
        let conn = Scripted::default();
        let registry = Registry::new();
        let query = QueryBuilder::<User>::new(QueryContext::new(&conn, &registry), "u")
            .unwrap()
            .join("userPosts", "up")
            .unwrap()
            .filter("u.enabled = ?", [true])
            .unwrap()
            .order_by("u.username", "ASC")
            .unwrap()
            .limit(3)
            .offset(1);

        assert_eq!(
            query.compile_count().unwrap().sql,
            "SELECT COUNT(DISTINCT `u`.`id`) FROM `users` AS `u` \
             LEFT OUTER JOIN `posts` AS `up` ON `up`.`userId` = `u`.`id` \
             WHERE `u`.`enabled` = ?"
        );
    }

    #[test]
    fn count_reads_scalar() {
        let conn = Scripted::new([vec![Row::from_pairs([("n", Value::BigInt(3))])]]);
        let registry = Registry::new();
        let n = QueryBuilder::<User>::new(QueryContext::new(&conn, &registry), "u")
            .unwrap()
            .count()
            .unwrap();
        assert_eq!(n, 3);
    }

    #[test]
    fn join_errors_are_raised_before_any_sql() {
        let conn = Scripted::default();
        let registry = Registry::new();
        let query = QueryBuilder::<Post>::new(QueryContext::new(&conn, &registry), "p").unwrap();

        let err = query.clone().join("editor", "e").unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::UnknownRelation));

        let joined = query.clone().join("author", "a").unwrap();
        let err = joined.clone().join("author", "b").unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::DuplicateRelation));
        let err = joined.join("tags", "a").unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::DuplicateAlias));
        let err = query.clone().join("tags", "p").unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::DuplicateAlias));

        let err = query.filter("x.id = ?", [1]).unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::UnknownAlias));

        assert!(conn.statements().is_empty());
    }

    #[test]
    fn relation_name_is_not_an_alias() {
        let conn = Scripted::default();
        let registry = Registry::new();
        let joined = QueryBuilder::<Post>::new(QueryContext::new(&conn, &registry), "p")
            .unwrap()
            .join("author", "a")
            .unwrap();

        let err = joined.clone().filter("author.username = ?", ["bob"]).unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::UnknownAlias));
        let err = joined.order_by("author.username", "ASC").unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::UnknownAlias));
        assert!(conn.statements().is_empty());
    }

    #[test]
    fn link_alias_cannot_shadow_a_declared_alias() {
        let conn = Scripted::default();
        let registry = Registry::new();
        let query = QueryBuilder::<Post>::new(QueryContext::new(&conn, &registry), "p").unwrap();

        let err = query
            .clone()
            .join("author", "t__link")
            .unwrap()
            .join("tags", "t")
            .unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::DuplicateAlias));
        assert!(err.to_string().contains("t__link"));

        let rooted = QueryBuilder::<Post>::new(QueryContext::new(&conn, &registry), "x__link").unwrap();
        let err = rooted.join("tags", "x").unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::DuplicateAlias));

        let err = query
            .join("tags", "t")
            .unwrap()
            .join("author", "t__link")
            .unwrap_err();
        assert_eq!(err.usage_kind(), Some(UsageErrorKind::DuplicateAlias));
    }

    #[test]
    fn fetch_one_hydrates_belongs_to() {
        let conn = Scripted::new([vec![Row::from_pairs([
            ("p.id", Value::Int(1)),
            ("p.title", text("T")),
            ("p.authorId", Value::Int(2)),
            ("a.id", Value::Int(2)),
            ("a.username", text("bob")),
        ])]]);
        let registry = Registry::new();

        let post = QueryBuilder::<Post>::new(QueryContext::new(&conn, &registry), "p")
            .unwrap()
            .join("author", "a")
            .unwrap()
            .fetch_one()
            .unwrap()
            .unwrap();

        assert_eq!(post.title.as_deref(), Some("T"));
        let author = post.author.unwrap();
        assert_eq!(author.username.as_deref(), Some("bob"));
        assert_eq!(author.state.id(), Some(2));
        assert!(conn.statements()[0].ends_with("LIMIT 1"));
    }

    #[test]
    fn fetch_one_without_rows_is_none() {
        let conn = Scripted::new([Vec::new()]);
        let registry = Registry::new();
        let found = QueryBuilder::<Post>::new(QueryContext::new(&conn, &registry), "p")
            .unwrap()
            .by_id(42)
            .unwrap()
            .fetch_one()
            .unwrap();
        assert!(found.is_none());
        assert_eq!(conn.log.borrow()[0].1, [Value::BigInt(42)]);
    }

    #[test]
    fn has_many_resolved_through_one_follow_up() {
        let conn = Scripted::new([
            vec![Row::from_pairs([("u.id", Value::Int(1)), ("userPosts", text("3,5"))])],
            vec![
                Row::from_pairs([("userPosts.id", Value::Int(5)), ("userPosts.title", text("five"))]),
                Row::from_pairs([("userPosts.id", Value::Int(3)), ("userPosts.title", text("three"))]),
            ],
        ]);
        let registry = Registry::new();

        let users: Vec<User> = QueryBuilder::<User>::new(QueryContext::new(&conn, &registry), "u")
            .unwrap()
            .join("userPosts", "up")
            .unwrap()
            .fetch_all()
            .collect::<Result<_>>()
            .unwrap();

        let posts = users[0].posts.as_ref().unwrap();
        let ids: Vec<Option<i64>> = posts.iter().map(|p| p.state.id()).collect();
        assert_eq!(ids, [Some(3), Some(5)]);

        let log = conn.log.borrow();
        assert_eq!(log.len(), 2);
        assert_eq!(
            log[1].0,
            "SELECT `userPosts`.* FROM `posts` AS `userPosts` WHERE `userPosts`.`id` IN (?, ?)"
        );
        assert_eq!(log[1].1, [Value::BigInt(3), Value::BigInt(5)]);
    }

    #[test]
    fn missing_prefetched_id_is_partial_cache() {
        let conn = Scripted::new([
            vec![Row::from_pairs([("u.id", Value::Int(1)), ("userPosts", text("2,3"))])],
            vec![Row::from_pairs([("userPosts.id", Value::Int(2))])],
        ]);
        let registry = Registry::new();

        let mut users = QueryBuilder::<User>::new(QueryContext::new(&conn, &registry), "u")
            .unwrap()
            .join("userPosts", "up")
            .unwrap()
            .fetch_all();

        let err = users.next().unwrap().unwrap_err();
        assert_eq!(err.consistency_kind(), Some(ConsistencyErrorKind::PartialCache));
        assert!(err.to_string().contains("User.userPosts"));
        assert!(users.next().is_none());
    }

    #[test]
    fn empty_id_union_skips_follow_up() {
        let conn = Scripted::new([vec![Row::from_pairs([
            ("u.id", Value::Int(1)),
            ("userPosts", Value::Null),
        ])]]);
        let registry = Registry::new();

        let user = QueryBuilder::<User>::new(QueryContext::new(&conn, &registry), "u")
            .unwrap()
            .join("userPosts", "up")
            .unwrap()
            .fetch_one()
            .unwrap()
            .unwrap();

        assert_eq!(user.posts.map(|p| p.len()), Some(0));
        assert_eq!(conn.statements().len(), 1);
    }

    #[test]
    fn fetch_all_is_lazy() {
        let conn = Scripted::new([Vec::new()]);
        let registry = Registry::new();
        let iter = QueryBuilder::<Post>::new(QueryContext::new(&conn, &registry), "p")
            .unwrap()
            .fetch_all();
        assert!(iter.is_pending());
        assert!(conn.statements().is_empty());

        let mut iter = iter;
        assert!(iter.next().is_none());
        assert_eq!(conn.statements().len(), 1);
        assert!(iter.next().is_none());
    }

    #[test]
    fn inspect_hook_sees_and_can_abort() {
        let conn = Scripted::new([Vec::new()]);
        let registry = Registry::new();
        let seen = std::cell::RefCell::new(Vec::new());

        let result = QueryBuilder::<Post>::new(QueryContext::new(&conn, &registry), "p")
            .unwrap()
            .inspect(|q| {
                seen.borrow_mut().push(q.sql.clone());
                Err(Error::Custom("stop".into()))
            })
            .fetch_one();

        assert!(matches!(result, Err(Error::Custom(ref m)) if m == "stop"));
        assert_eq!(seen.borrow().len(), 1);
        assert!(conn.statements().is_empty());
    }

    #[test]
    fn group_concat_limit_set_once_for_mysql() {
        let conn = Scripted::new([Vec::new(), Vec::new()]);
        let registry = Registry::new();
        let limit = GroupConcatLimit::new(Some(65_536));
        let ctx = QueryContext::new(&conn, &registry).with_group_concat_limit(&limit);

        for _ in 0..2 {
            let users: Vec<User> = QueryBuilder::<User>::new(ctx, "u")
                .unwrap()
                .join("userPosts", "up")
                .unwrap()
                .fetch_all()
                .collect::<Result<_>>()
                .unwrap();
            assert!(users.is_empty());
        }

        let statements = conn.statements();
        assert_eq!(statements.len(), 3);
        assert_eq!(statements[0], "SET SESSION group_concat_max_len = 65536");
        assert!(statements[1].starts_with("SELECT"));
        assert!(statements[2].starts_with("SELECT"));
    }
}
