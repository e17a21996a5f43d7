//! Models and a scripted connection shared by the unit tests.

use rowmodel_core::error::{Error, QueryError, QueryErrorKind};
use rowmodel_core::{
    BooleanTransformer, Connection, FromValue, LinkTable, Model, ModelState, Related, Relation,
    Result, Row, Value, ValueTransformer, unknown_column,
};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct User {
    pub state: ModelState,
    pub username: Option<String>,
    pub enabled: Option<bool>,
    pub posts: Option<Vec<Post>>,
}

impl Model for User {
    fn table_name() -> &'static str {
        "users"
    }

    fn columns() -> Vec<&'static str> {
        vec!["id", "username", "enabled"]
    }

    fn value_transformers() -> Vec<(&'static str, Arc<dyn ValueTransformer>)> {
        vec![("enabled", Arc::new(BooleanTransformer))]
    }

    fn relations() -> Vec<Relation> {
        vec![Relation::has_many::<Post>("userPosts", "userId")]
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }

    fn get_column(&self, column: &str) -> Result<Value> {
        match column {
            "username" => Ok(self.username.clone().into()),
            "enabled" => Ok(self.enabled.into()),
            _ => Err(unknown_column::<Self>(column)),
        }
    }

    fn set_column(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "username" => self.username = FromValue::from_value(&value)?,
            "enabled" => self.enabled = FromValue::from_value(&value)?,
            _ => return Err(unknown_column::<Self>(column)),
        }
        Ok(())
    }

    fn set_related(&mut self, relation: &str, related: Related) -> Result<()> {
        match relation {
            "userPosts" => self.posts = Some(related.into_many()?),
            _ => return Err(unknown_column::<Self>(relation)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Tag {
    pub state: ModelState,
    pub name: Option<String>,
}

impl Model for Tag {
    fn table_name() -> &'static str {
        "tags"
    }

    fn columns() -> Vec<&'static str> {
        vec!["id", "name"]
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }

    fn get_column(&self, column: &str) -> Result<Value> {
        match column {
            "name" => Ok(self.name.clone().into()),
            _ => Err(unknown_column::<Self>(column)),
        }
    }

    fn set_column(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "name" => self.name = FromValue::from_value(&value)?,
            _ => return Err(unknown_column::<Self>(column)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Post {
    pub state: ModelState,
    pub title: Option<String>,
    pub author_id: Option<i64>,
    pub user_id: Option<i64>,
    pub author: Option<User>,
    pub tags: Option<Vec<Tag>>,
}

impl Model for Post {
    fn table_name() -> &'static str {
        "posts"
    }

    fn columns() -> Vec<&'static str> {
        vec!["id", "title", "authorId", "userId"]
    }

    fn relations() -> Vec<Relation> {
        vec![
            Relation::belongs_to::<User>("author", "authorId"),
            Relation::many_to_many::<Tag>("tags", LinkTable::new("posts_tags", "postId", "tagId")),
        ]
    }

    fn state(&self) -> &ModelState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut ModelState {
        &mut self.state
    }

    fn get_column(&self, column: &str) -> Result<Value> {
        match column {
            "title" => Ok(self.title.clone().into()),
            "authorId" => Ok(self.author_id.into()),
            "userId" => Ok(self.user_id.into()),
            _ => Err(unknown_column::<Self>(column)),
        }
    }

    fn set_column(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "title" => self.title = FromValue::from_value(&value)?,
            "authorId" => self.author_id = FromValue::from_value(&value)?,
            "userId" => self.user_id = FromValue::from_value(&value)?,
            _ => return Err(unknown_column::<Self>(column)),
        }
        Ok(())
    }

    fn set_related(&mut self, relation: &str, related: Related) -> Result<()> {
        match relation {
            "author" => self.author = Some(related.into_one()?),
            "tags" => self.tags = Some(related.into_many()?),
            _ => return Err(unknown_column::<Self>(relation)),
        }
        Ok(())
    }
}

/// Answers each query with the next scripted result set and records
/// every statement it sees.
#[derive(Debug, Default)]
pub struct Scripted {
    results: RefCell<VecDeque<Vec<Row>>>,
    pub log: RefCell<Vec<(String, Vec<Value>)>>,
}

impl Scripted {
    pub fn new(results: impl IntoIterator<Item = Vec<Row>>) -> Self {
        Self {
            results: RefCell::new(results.into_iter().collect()),
            log: RefCell::default(),
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.log.borrow().iter().map(|(sql, _)| sql.clone()).collect()
    }
}

impl Connection for Scripted {
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.log.borrow_mut().push((sql.to_string(), params.to_vec()));
        self.results.borrow_mut().pop_front().ok_or_else(|| {
            Error::Query(QueryError {
                kind: QueryErrorKind::Database,
                sql: Some(sql.to_string()),
                message: "no scripted result".to_string(),
                source: None,
            })
        })
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.log.borrow_mut().push((sql.to_string(), params.to_vec()));
        Ok(0)
    }

    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64> {
        self.log.borrow_mut().push((sql.to_string(), params.to_vec()));
        Ok(0)
    }

    fn begin(&self) -> Result<()> {
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        Ok(())
    }
}
