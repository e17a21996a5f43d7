//! Relation descriptors.
//!
//! A model declares its named edges to other models through
//! [`Model::relations`](crate::Model::relations). Each [`Relation`] carries
//! enough information to render its join and to hydrate the far side
//! without knowing the related type statically: the related model is held
//! as a [`ModelRef`], a bundle of plain function pointers.

use crate::Result;
use crate::metadata::{ModelMeta, Registry};
use crate::model::{AnyModel, Model, hydrate_boxed};
use crate::row::Row;
use std::any::TypeId;
use std::fmt;

/// The cardinality of a relation, seen from the declaring model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
    /// Foreign key on this table, one related row: `Post` belongs to `User`.
    BelongsTo,
    /// Foreign key on the other table, many related rows: `User` has many `Post`s.
    HasMany,
    /// Link table with a key for each side: `Post`s have many `Tag`s.
    ManyToMany,
}

impl RelationKind {
    /// Whether the relation yields a list rather than a single model.
    pub const fn is_to_many(self) -> bool {
        matches!(self, RelationKind::HasMany | RelationKind::ManyToMany)
    }
}

/// Link table for many-to-many relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTable {
    /// The link table name (e.g. `"posts_tags"`).
    pub table_name: &'static str,

    /// Column in the link table pointing at the declaring model (e.g. `"postId"`).
    pub local_column: &'static str,

    /// Column in the link table pointing at the related model (e.g. `"tagId"`).
    pub remote_column: &'static str,
}

impl LinkTable {
    /// Create a new link-table definition.
    #[must_use]
    pub const fn new(
        table_name: &'static str,
        local_column: &'static str,
        remote_column: &'static str,
    ) -> Self {
        Self {
            table_name,
            local_column,
            remote_column,
        }
    }
}

/// Type-erased handle to a model type.
///
/// Lets the registry describe, and the query layer hydrate, a related model
/// that is only known through a relation declaration.
#[derive(Clone, Copy)]
pub struct ModelRef {
    type_id: fn() -> TypeId,
    describe: fn() -> ModelMeta,
    hydrate: fn(&Registry, &Row, &str) -> Result<Box<dyn AnyModel>>,
}

impl ModelRef {
    /// Handle for model type `M`.
    pub fn of<M: Model>() -> Self {
        Self {
            type_id: TypeId::of::<M>,
            describe: ModelMeta::describe::<M>,
            hydrate: hydrate_boxed::<M>,
        }
    }

    /// The `TypeId` of the model this handle refers to.
    pub fn model_type_id(&self) -> TypeId {
        (self.type_id)()
    }

    /// Collect the model's class-level facts. Uncached; go through the
    /// [`Registry`] instead.
    pub fn describe(&self) -> ModelMeta {
        (self.describe)()
    }

    /// Build an instance from the columns of `row` found under `alias`.
    ///
    /// To-many relations of the built instance stay unset.
    pub fn hydrate(&self, registry: &Registry, row: &Row, alias: &str) -> Result<Box<dyn AnyModel>> {
        (self.hydrate)(registry, row, alias)
    }
}

impl fmt::Debug for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelRef")
            .field("type_id", &self.model_type_id())
            .finish_non_exhaustive()
    }
}

/// A named edge from one model to another.
#[derive(Debug, Clone, Copy)]
pub struct Relation {
    name: &'static str,
    kind: RelationKind,
    model: ModelRef,
    /// Column on the declaring table used by the join.
    local_column: &'static str,
    /// Column on the related table used by the join.
    foreign_column: &'static str,
    link: Option<LinkTable>,
}

impl Relation {
    /// `name` resolves to one `M`, whose `id` is stored in `local_column`.
    pub fn belongs_to<M: Model>(name: &'static str, local_column: &'static str) -> Self {
        Self {
            name,
            kind: RelationKind::BelongsTo,
            model: ModelRef::of::<M>(),
            local_column,
            foreign_column: crate::model::ID_COLUMN,
            link: None,
        }
    }

    /// `name` resolves to every `M` whose `foreign_column` holds this model's `id`.
    pub fn has_many<M: Model>(name: &'static str, foreign_column: &'static str) -> Self {
        Self {
            name,
            kind: RelationKind::HasMany,
            model: ModelRef::of::<M>(),
            local_column: crate::model::ID_COLUMN,
            foreign_column,
            link: None,
        }
    }

    /// `name` resolves to every `M` linked to this model through `link`.
    pub fn many_to_many<M: Model>(name: &'static str, link: LinkTable) -> Self {
        Self {
            name,
            kind: RelationKind::ManyToMany,
            model: ModelRef::of::<M>(),
            local_column: crate::model::ID_COLUMN,
            foreign_column: crate::model::ID_COLUMN,
            link: Some(link),
        }
    }

    /// Override the column the belongs-to side references (default `id`).
    pub fn references(mut self, column: &'static str) -> Self {
        if self.kind == RelationKind::BelongsTo {
            self.foreign_column = column;
        }
        self
    }

    /// Override the local column a has-many side is keyed on (default `id`).
    pub fn local_key(mut self, column: &'static str) -> Self {
        if self.kind == RelationKind::HasMany {
            self.local_column = column;
        }
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> RelationKind {
        self.kind
    }

    pub fn model(&self) -> &ModelRef {
        &self.model
    }

    /// Column on the declaring table the join condition uses.
    ///
    /// The foreign key for belongs-to, the referenced key otherwise.
    pub fn local_column(&self) -> &'static str {
        self.local_column
    }

    /// Column on the related table the join condition uses.
    ///
    /// The referenced key for belongs-to and many-to-many, the foreign key
    /// for has-many.
    pub fn foreign_column(&self) -> &'static str {
        self.foreign_column
    }

    pub fn link(&self) -> Option<&LinkTable> {
        self.link.as_ref()
    }

    pub fn is_to_many(&self) -> bool {
        self.kind.is_to_many()
    }
}
