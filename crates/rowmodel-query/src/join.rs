//! JOIN clause types.

use rowmodel_core::{ModelMeta, Relation, RelationKind, quote_ident, quote_qualified};
use std::sync::Arc;

/// Types of SQL joins the compiler emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    LeftOuter,
}

impl JoinType {
    /// Get the SQL keyword for this join type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::LeftOuter => "LEFT OUTER JOIN",
        }
    }
}

/// A relation joined into a query under an alias.
#[derive(Debug, Clone)]
pub struct Join {
    relation: Relation,
    alias: String,
    /// Metadata of the related model
    meta: Arc<ModelMeta>,
}

impl Join {
    pub fn new(relation: Relation, alias: impl Into<String>, meta: Arc<ModelMeta>) -> Self {
        Self {
            relation,
            alias: alias.into(),
            meta,
        }
    }

    pub fn relation(&self) -> &Relation {
        &self.relation
    }

    /// Relation name, which is also the name of the aggregated id column.
    pub fn name(&self) -> &'static str {
        self.relation.name()
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn meta(&self) -> &Arc<ModelMeta> {
        &self.meta
    }

    pub fn is_to_many(&self) -> bool {
        self.relation.is_to_many()
    }

    /// Belongs-to joins must match; to-many joins keep roots without matches.
    pub fn join_type(&self) -> JoinType {
        match self.relation.kind() {
            RelationKind::BelongsTo => JoinType::Inner,
            RelationKind::HasMany | RelationKind::ManyToMany => JoinType::LeftOuter,
        }
    }

    /// Alias of the link table of a many-to-many join.
    pub fn link_alias(&self) -> String {
        format!("{}__link", self.alias)
    }

    /// Render the JOIN clause(s) against `root_alias`.
    pub fn to_sql(&self, root_alias: &str) -> String {
        let keyword = self.join_type().as_str();
        let table = quote_ident(self.meta.table_name());
        let alias = quote_ident(&self.alias);
        let local = quote_qualified(root_alias, self.relation.local_column());
        let foreign = quote_qualified(&self.alias, self.relation.foreign_column());

        match self.relation.link() {
            Some(link) if self.relation.kind() == RelationKind::ManyToMany => {
                let link_alias = self.link_alias();
                format!(
                    "{keyword} {} AS {} ON {} = {local} {keyword} {table} AS {alias} ON {foreign} = {}",
                    quote_ident(link.table_name),
                    quote_ident(&link_alias),
                    quote_qualified(&link_alias, link.local_column),
                    quote_qualified(&link_alias, link.remote_column),
                )
            }
            _ => format!("{keyword} {table} AS {alias} ON {foreign} = {local}"),
        }
    }
}
