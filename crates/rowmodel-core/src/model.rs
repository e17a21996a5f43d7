//! Model trait, hydration and serialization.
//!
//! A model is a plain struct that owns a [`ModelState`] (primary key and
//! deleted flag) and exposes its other columns by name. The engine never
//! touches fields directly: [`hydrate`] writes through
//! [`Model::set_column`] and [`serialize`] reads through
//! [`Model::get_column`]. The `id` column is always routed to the state,
//! so implementations never see it.

use crate::Result;
use crate::error::{Error, TypeError, UsageErrorKind};
use crate::metadata::Registry;
use crate::relationship::{Relation, RelationKind};
use crate::row::Row;
use crate::transform::ValueTransformer;
use crate::value::Value;
use chrono::NaiveDateTime;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Name of the primary key column every model carries.
pub const ID_COLUMN: &str = "id";

/// Persistence state shared by every model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelState {
    id: Option<i64>,
    deleted: bool,
}

impl ModelState {
    /// State of a row read back from storage.
    pub fn persisted(id: Option<i64>) -> Self {
        Self { id, deleted: false }
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Whether the model has never been stored.
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Assign the primary key. Legal once.
    pub fn assign_id(&mut self, id: i64, model: &str) -> Result<()> {
        if let Some(current) = self.id {
            return Err(Error::usage(
                UsageErrorKind::ImmutablePrimaryKey,
                format!(
                    "You cannot change the primary key of an existing {} (id {}).",
                    model, current
                ),
            ));
        }
        self.id = Some(id);
        Ok(())
    }

    pub fn mark_deleted(&mut self) {
        self.deleted = true;
    }
}

/// A typed in-memory representation of one table row.
///
/// Class-level accessors (`table_name`, `columns`, `value_transformers`,
/// `relations`) are read through the [`Registry`], which calls each of them
/// once per model type.
///
/// # Example
///
/// ```
/// use rowmodel_core::{Model, ModelState, Result, Value, unknown_column};
/// use rowmodel_core::row::FromValue;
///
/// #[derive(Debug, Clone, Default)]
/// struct Tag {
///     state: ModelState,
///     name: Option<String>,
/// }
///
/// impl Model for Tag {
///     fn table_name() -> &'static str {
///         "tags"
///     }
///
///     fn columns() -> Vec<&'static str> {
///         vec!["id", "name"]
///     }
///
///     fn state(&self) -> &ModelState {
///         &self.state
///     }
///
///     fn state_mut(&mut self) -> &mut ModelState {
///         &mut self.state
///     }
///
///     fn get_column(&self, column: &str) -> Result<Value> {
///         match column {
///             "name" => Ok(self.name.clone().into()),
///             _ => Err(unknown_column::<Self>(column)),
///         }
///     }
///
///     fn set_column(&mut self, column: &str, value: Value) -> Result<()> {
///         match column {
///             "name" => self.name = FromValue::from_value(&value)?,
///             _ => return Err(unknown_column::<Self>(column)),
///         }
///         Ok(())
///     }
/// }
/// ```
pub trait Model: Default + Clone + fmt::Debug + 'static {
    /// The table this model maps to.
    fn table_name() -> &'static str;

    /// Declared columns in order, including `id`.
    fn columns() -> Vec<&'static str>;

    /// Transformers keyed by column.
    fn value_transformers() -> Vec<(&'static str, Arc<dyn ValueTransformer>)> {
        Vec::new()
    }

    /// Declared relations. Names must be unique.
    fn relations() -> Vec<Relation> {
        Vec::new()
    }

    /// Short name used in error messages.
    fn model_name() -> &'static str {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }

    fn state(&self) -> &ModelState;

    fn state_mut(&mut self) -> &mut ModelState;

    /// Domain value of a non-`id` column.
    fn get_column(&self, column: &str) -> Result<Value>;

    /// Assign a domain value to a non-`id` column.
    fn set_column(&mut self, column: &str, value: Value) -> Result<()>;

    /// Attach a resolved relation.
    fn set_related(&mut self, relation: &str, related: Related) -> Result<()> {
        let _ = related;
        Err(Error::usage(
            UsageErrorKind::UnknownRelation,
            format!("{} is not a relation of {}", relation, Self::model_name()),
        ))
    }

    /// Hook run by the persistence layer right before a write.
    fn before_serialize(&mut self, now: NaiveDateTime) {
        let _ = now;
    }

    fn id(&self) -> Option<i64> {
        self.state().id()
    }

    /// Assign the primary key; fails if one is already set.
    fn set_id(&mut self, id: i64) -> Result<()> {
        self.state_mut().assign_id(id, Self::model_name())
    }

    fn is_new(&self) -> bool {
        self.state().is_new()
    }

    fn is_deleted(&self) -> bool {
        self.state().is_deleted()
    }
}

/// Error for a column name a model does not recognise.
pub fn unknown_column<M: Model>(column: &str) -> Error {
    Error::usage(
        UsageErrorKind::UnknownColumn,
        format!("{} is not a column of {}", column, M::model_name()),
    )
}

/// Models that carry `createdAt`/`updatedAt` columns.
pub trait Timestamps {
    fn created_at(&self) -> Option<NaiveDateTime>;

    fn set_created_at(&mut self, at: NaiveDateTime);

    fn set_updated_at(&mut self, at: NaiveDateTime);

    /// Set `created_at` when absent and always refresh `updated_at`.
    fn stamp_timestamps(&mut self, now: NaiveDateTime) {
        if self.created_at().is_none() {
            self.set_created_at(now);
        }
        self.set_updated_at(now);
    }
}

/// Object-safe view of any model, used to move related instances through
/// code that does not know their type.
pub trait AnyModel: Any + fmt::Debug {
    fn primary_key(&self) -> Option<i64>;

    fn type_label(&self) -> &'static str;

    fn clone_boxed(&self) -> Box<dyn AnyModel>;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<M: Model> AnyModel for M {
    fn primary_key(&self) -> Option<i64> {
        self.state().id()
    }

    fn type_label(&self) -> &'static str {
        M::model_name()
    }

    fn clone_boxed(&self) -> Box<dyn AnyModel> {
        Box::new(self.clone())
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

impl Clone for Box<dyn AnyModel> {
    fn clone(&self) -> Self {
        self.clone_boxed()
    }
}

fn downcast<M: Model>(boxed: Box<dyn AnyModel>) -> Result<M> {
    let label = boxed.type_label();
    boxed.into_any().downcast::<M>().map(|m| *m).map_err(|_| {
        Error::Type(TypeError {
            expected: M::model_name(),
            actual: label.to_string(),
            column: None,
        })
    })
}

/// A resolved relation value handed to [`Model::set_related`].
#[derive(Debug, Clone)]
pub enum Related {
    /// Belongs-to target.
    One(Box<dyn AnyModel>),
    /// Has-many or many-to-many targets, in id-list order.
    Many(Vec<Box<dyn AnyModel>>),
}

impl Related {
    /// Unwrap a single related `M`.
    pub fn into_one<M: Model>(self) -> Result<M> {
        match self {
            Related::One(boxed) => downcast(boxed),
            Related::Many(_) => Err(Error::Type(TypeError {
                expected: M::model_name(),
                actual: "list of related models".to_string(),
                column: None,
            })),
        }
    }

    /// Unwrap a list of related `M`.
    pub fn into_many<M: Model>(self) -> Result<Vec<M>> {
        match self {
            Related::Many(items) => items.into_iter().map(downcast).collect(),
            Related::One(_) => Err(Error::Type(TypeError {
                expected: "list of related models",
                actual: "single related model".to_string(),
                column: None,
            })),
        }
    }
}

/// Per-row inputs from the query layer.
#[derive(Debug, Default)]
pub struct RowContext<'a> {
    /// Join alias keyed by relation name.
    pub join_aliases: HashMap<&'a str, &'a str>,
    /// Pre-resolved to-many lists keyed by relation name.
    pub to_many: HashMap<&'a str, Vec<Box<dyn AnyModel>>>,
}

/// Build an `M` from the columns of `row` found under `alias`.
///
/// Missing keys read as NULL. Joined belongs-to relations whose key is
/// present under their join alias are hydrated recursively from the same
/// row; to-many relations are taken from `ctx`.
pub fn hydrate<M: Model>(
    registry: &Registry,
    row: &Row,
    alias: &str,
    mut ctx: RowContext<'_>,
) -> Result<M> {
    let meta = registry.meta::<M>()?;
    let mut model = M::default();

    for &column in meta.columns() {
        let raw = row.get_qualified(alias, column).clone();
        let value = meta.from_storage(column, raw)?;
        if column == ID_COLUMN {
            let id = if value.is_null() {
                None
            } else {
                Some(crate::row::FromValue::from_value(&value)?)
            };
            *model.state_mut() = ModelState::persisted(id);
        } else {
            model.set_column(column, value)?;
        }
    }

    for relation in meta.relations() {
        match relation.kind() {
            RelationKind::BelongsTo => {
                let Some(join_alias) = ctx.join_aliases.get(relation.name()).copied() else {
                    continue;
                };
                if row
                    .get_qualified(join_alias, relation.foreign_column())
                    .is_blank()
                {
                    continue;
                }
                let nested = relation.model().hydrate(registry, row, join_alias)?;
                model.set_related(relation.name(), Related::One(nested))?;
            }
            RelationKind::HasMany | RelationKind::ManyToMany => {
                if let Some(list) = ctx.to_many.remove(relation.name()) {
                    model.set_related(relation.name(), Related::Many(list))?;
                }
            }
        }
    }

    tracing::trace!(model = meta.name(), alias, id = ?model.id(), "hydrated");
    Ok(model)
}

/// Type-erased [`hydrate`] with no joins, used for related models.
pub fn hydrate_boxed<M: Model>(
    registry: &Registry,
    row: &Row,
    alias: &str,
) -> Result<Box<dyn AnyModel>> {
    let model: M = hydrate(registry, row, alias, RowContext::default())?;
    Ok(Box::new(model))
}

/// Storage form of `model`, keyed `table.column`, in column order.
pub fn serialize<M: Model>(registry: &Registry, model: &M) -> Result<Row> {
    let meta = registry.meta::<M>()?;
    let mut names = Vec::with_capacity(meta.columns().len());
    let mut values = Vec::with_capacity(meta.columns().len());

    for &column in meta.columns() {
        let value = if column == ID_COLUMN {
            Value::from(model.id())
        } else {
            model.get_column(column)?
        };
        names.push(format!("{}.{}", meta.table_name(), column));
        values.push(meta.to_storage(column, value)?);
    }

    Ok(Row::new(names, values))
}
