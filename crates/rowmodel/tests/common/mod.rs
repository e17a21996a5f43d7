//! Models and schema shared by the integration tests.

#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use rowmodel::prelude::*;
use std::sync::Arc;

pub const SCHEMA: &str = "
    CREATE TABLE users (
        id INTEGER PRIMARY KEY,
        username TEXT NOT NULL,
        enabled INTEGER NOT NULL DEFAULT 0,
        createdAt TEXT,
        updatedAt TEXT
    );
    CREATE TABLE posts (
        id INTEGER PRIMARY KEY,
        title TEXT NOT NULL,
        authorId INTEGER REFERENCES users(id),
        publishedOn TEXT
    );
    CREATE TABLE tags (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE
    );
    CREATE TABLE posts_tags (
        postId INTEGER NOT NULL REFERENCES posts(id),
        tagId INTEGER NOT NULL REFERENCES tags(id)
    );
";

#[derive(Debug, Clone, Default)]
pub struct User {
    pub state: ModelState,
    pub username: Option<String>,
    pub enabled: Option<bool>,
    pub created_at: Option<NaiveDateTime>,
    pub updated_at: Option<NaiveDateTime>,
    pub posts: Option<Vec<Post>>,
}

impl Model for User {
    fn table_name() -> &'static str {
        "users"
    }

    fn columns() -> Vec<&'static str> {
        vec!["id", "username", "enabled", "createdAt", "updatedAt"]
    }

    fn value_transformers() -> Vec<(&'static str, Arc<dyn ValueTransformer>)> {
        vec![
            ("enabled", Arc::new(BooleanTransformer)),
            ("createdAt", Arc::new(DateTimeTransformer)),
            ("updatedAt", Arc::new(DateTimeTransformer)),
        ]
    }

    fn relations() -> Vec<Relation> {
        vec![Relation::has_many::<Post>("posts", "authorId")]
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
            "createdAt" => Ok(self.created_at.into()),
            "updatedAt" => Ok(self.updated_at.into()),
            _ => Err(unknown_column::<Self>(column)),
        }
    }

    fn set_column(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "username" => self.username = FromValue::from_value(&value)?,
            "enabled" => self.enabled = FromValue::from_value(&value)?,
            "createdAt" => self.created_at = FromValue::from_value(&value)?,
            "updatedAt" => self.updated_at = FromValue::from_value(&value)?,
            _ => return Err(unknown_column::<Self>(column)),
        }
        Ok(())
    }

    fn set_related(&mut self, relation: &str, related: Related) -> Result<()> {
        match relation {
            "posts" => self.posts = Some(related.into_many()?),
            _ => return Err(unknown_column::<Self>(relation)),
        }
        Ok(())
    }

    fn before_serialize(&mut self, now: NaiveDateTime) {
        self.stamp_timestamps(now);
    }
}

impl Timestamps for User {
    fn created_at(&self) -> Option<NaiveDateTime> {
        self.created_at
    }

    fn set_created_at(&mut self, at: NaiveDateTime) {
        self.created_at = Some(at);
    }

    fn set_updated_at(&mut self, at: NaiveDateTime) {
        self.updated_at = Some(at);
    }
}

#[derive(Debug, Clone, Default)]
pub struct Post {
    pub state: ModelState,
    pub title: Option<String>,
    pub author_id: Option<i64>,
    pub published_on: Option<NaiveDate>,
    pub author: Option<User>,
    pub tags: Option<Vec<Tag>>,
}

impl Model for Post {
    fn table_name() -> &'static str {
        "posts"
    }

    fn columns() -> Vec<&'static str> {
        vec!["id", "title", "authorId", "publishedOn"]
    }

    fn value_transformers() -> Vec<(&'static str, Arc<dyn ValueTransformer>)> {
        vec![("publishedOn", Arc::new(DateTransformer))]
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
            "publishedOn" => Ok(self.published_on.into()),
            _ => Err(unknown_column::<Self>(column)),
        }
    }

    fn set_column(&mut self, column: &str, value: Value) -> Result<()> {
        match column {
            "title" => self.title = FromValue::from_value(&value)?,
            "authorId" => self.author_id = FromValue::from_value(&value)?,
            "publishedOn" => self.published_on = FromValue::from_value(&value)?,
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

pub fn user(username: &str, enabled: bool) -> User {
    User {
        username: Some(username.to_string()),
        enabled: Some(enabled),
        ..User::default()
    }
}

pub fn post(title: &str, author_id: Option<i64>) -> Post {
    Post {
        title: Some(title.to_string()),
        author_id,
        ..Post::default()
    }
}

pub fn tag(name: &str) -> Tag {
    Tag {
        name: Some(name.to_string()),
        ..Tag::default()
    }
}

pub fn fixed_clock() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 5, 6)
        .and_then(|d| d.and_hms_opt(7, 8, 9))
        .unwrap_or_default()
}
