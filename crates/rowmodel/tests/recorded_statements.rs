//! Statement-level behavior observed through a recording connection.

mod common;

use common::{Post, Tag, User, tag};
use rowmodel::prelude::*;
use rowmodel::{ConsistencyErrorKind, QueryError, QueryErrorKind, UsageErrorKind};
use std::cell::RefCell;
use std::collections::VecDeque;

/// Answers queries from a script and records every statement it sees.
#[derive(Debug, Default)]
struct Recording {
    rows: RefCell<VecDeque<Vec<Row>>>,
    affected: RefCell<VecDeque<Result<u64>>>,
    log: RefCell<Vec<String>>,
}

impl Recording {
    fn with_rows(rows: impl IntoIterator<Item = Vec<Row>>) -> Self {
        Self {
            rows: RefCell::new(rows.into_iter().collect()),
            ..Self::default()
        }
    }

    fn with_affected(affected: impl IntoIterator<Item = Result<u64>>) -> Self {
        Self {
            affected: RefCell::new(affected.into_iter().collect()),
            ..Self::default()
        }
    }

    fn log(&self) -> Vec<String> {
        self.log.borrow().clone()
    }
}

impl Connection for Recording {
    fn query(&self, sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
        self.log.borrow_mut().push(sql.to_string());
        Ok(self.rows.borrow_mut().pop_front().unwrap_or_default())
    }

    fn execute(&self, sql: &str, _params: &[Value]) -> Result<u64> {
        self.log.borrow_mut().push(sql.to_string());
        self.affected.borrow_mut().pop_front().unwrap_or(Ok(1))
    }

    fn insert(&self, sql: &str, _params: &[Value]) -> Result<i64> {
        self.log.borrow_mut().push(sql.to_string());
        Ok(1)
    }

    fn begin(&self) -> Result<()> {
        self.log.borrow_mut().push("BEGIN".to_string());
        Ok(())
    }

    fn commit(&self) -> Result<()> {
        self.log.borrow_mut().push("COMMIT".to_string());
        Ok(())
    }

    fn rollback(&self) -> Result<()> {
        self.log.borrow_mut().push("ROLLBACK".to_string());
        Ok(())
    }
}

fn post_row(id: i64, title: &str, tags: Value) -> Row {
    Row::from_pairs([
        ("p.id", Value::BigInt(id)),
        ("p.title", Value::Text(title.to_string())),
        ("tags", tags),
    ])
}

fn tag_row(id: i64, name: &str) -> Row {
    Row::from_pairs([
        ("tags.id", Value::BigInt(id)),
        ("tags.name", Value::Text(name.to_string())),
    ])
}

fn stored_tag(id: i64) -> Tag {
    let mut t = tag("t");
    t.set_id(id).unwrap();
    t
}

#[test]
fn unknown_relation_issues_no_sql() {
    let session = Session::new(Recording::default());

    let err = session
        .find::<Post>("p")
        .unwrap()
        .join("comments", "c")
        .unwrap_err();

    assert_eq!(err.usage_kind(), Some(UsageErrorKind::UnknownRelation));
    assert!(session.connection().log().is_empty());
}

#[test]
fn many_to_many_compiles_through_link_alias() {
    let session = Session::new(Recording::default());
    let compiled = session
        .find::<Post>("p")
        .unwrap()
        .join("tags", "t")
        .unwrap()
        .filter("t.name = ?", ["rust"])
        .unwrap()
        .compile()
        .unwrap();

    assert_eq!(
        compiled.sql,
        "SELECT `p`.*, GROUP_CONCAT(`t`.`id`) AS `tags` FROM `posts` AS `p` \
         LEFT OUTER JOIN `posts_tags` AS `t__link` ON `t__link`.`postId` = `p`.`id` \
         LEFT OUTER JOIN `tags` AS `t` ON `t`.`id` = `t__link`.`tagId` \
         WHERE `t`.`name` = ? GROUP BY `p`.`id`"
    );
    assert_eq!(compiled.params, [Value::Text("rust".to_string())]);
}

#[test]
fn prefetch_runs_one_follow_up_per_relation() {
    let session = Session::new(Recording::with_rows([
        vec![
            post_row(1, "First", Value::Text("10,11".to_string())),
            post_row(2, "Second", Value::Null),
            post_row(3, "Third", Value::Text("11".to_string())),
        ],
        vec![tag_row(10, "rust"), tag_row(11, "sql")],
    ]));

    let posts: Vec<Post> = session
        .find::<Post>("p")
        .unwrap()
        .join("tags", "t")
        .unwrap()
        .fetch_all()
        .collect::<Result<_>>()
        .unwrap();

    let log = session.connection().log();
    assert_eq!(log.len(), 2);
    assert_eq!(
        log[1],
        "SELECT `tags`.* FROM `tags` AS `tags` WHERE `tags`.`id` IN (?, ?)"
    );

    let names = |p: &Post| -> Vec<String> {
        p.tags
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|t| t.name.clone())
            .collect()
    };
    assert_eq!(names(&posts[0]), ["rust", "sql"]);
    assert!(names(&posts[1]).is_empty());
    assert_eq!(names(&posts[2]), ["sql"]);
}

#[test]
fn empty_id_union_skips_follow_up() {
    let session = Session::new(Recording::with_rows([vec![post_row(
        1,
        "Lonely",
        Value::Null,
    )]]));

    let post = session
        .find::<Post>("p")
        .unwrap()
        .join("tags", "t")
        .unwrap()
        .fetch_one()
        .unwrap()
        .unwrap();

    assert_eq!(session.connection().log().len(), 1);
    assert!(post.tags.unwrap().is_empty());
}

#[test]
fn partially_filled_cache_is_an_error() {
    let session = Session::new(Recording::with_rows([
        vec![post_row(1, "First", Value::Text("10,11".to_string()))],
        vec![tag_row(10, "rust")],
    ]));

    let mut posts = session
        .find::<Post>("p")
        .unwrap()
        .join("tags", "t")
        .unwrap()
        .fetch_all();
    let err = posts.next().unwrap().unwrap_err();

    assert_eq!(
        err.consistency_kind(),
        Some(ConsistencyErrorKind::PartialCache)
    );
    assert!(
        err.to_string()
            .ends_with("Cannot use partially-filled cache for Post.tags")
    );
    assert!(posts.next().is_none());
}

#[test]
fn iteration_is_lazy() {
    let session = Session::new(Recording::with_rows([vec![]]));
    let users = session.find::<User>("u").unwrap().fetch_all();

    assert!(users.is_pending());
    assert!(session.connection().log().is_empty());

    assert_eq!(users.count(), 0);
    assert_eq!(session.connection().log().len(), 1);
}

#[test]
fn inspect_hook_can_abort_execution() {
    let session = Session::new(Recording::default());
    let seen = RefCell::new(Vec::new());

    let result = session
        .find::<User>("u")
        .unwrap()
        .filter("u.username = ?", ["alice"])
        .unwrap()
        .inspect(|compiled| {
            seen.borrow_mut().push(compiled.sql.clone());
            Err(Error::Custom("read-only replica".to_string()))
        })
        .fetch_one();

    assert!(matches!(result, Err(Error::Custom(ref m)) if m == "read-only replica"));
    assert_eq!(
        *seen.borrow(),
        ["SELECT `u`.* FROM `users` AS `u` WHERE `u`.`username` = ? LIMIT 1"]
    );
    assert!(session.connection().log().is_empty());
}

#[test]
fn group_concat_limit_is_set_once_before_to_many_queries() {
    let config = SessionConfig::from_json(r#"{"dialect": "mysql", "group_concat_max_len": 65536}"#)
        .unwrap();
    let session = Session::with_config(Recording::default(), config);

    session.find::<User>("u").unwrap().fetch_all().for_each(drop);
    for _ in 0..2 {
        session
            .find::<User>("u")
            .unwrap()
            .join("posts", "p")
            .unwrap()
            .fetch_all()
            .for_each(drop);
    }

    let log = session.connection().log();
    let set: Vec<_> = log.iter().filter(|s| s.starts_with("SET SESSION")).collect();
    assert_eq!(set, ["SET SESSION group_concat_max_len = 65536"]);
    assert_eq!(log.iter().position(|s| s.starts_with("SET SESSION")), Some(1));
}

#[test]
fn invalid_session_config_is_a_config_error() {
    let err = SessionConfig::from_json(r#"{"dialect": "oracle"}"#).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[test]
fn delete_all_rolls_back_when_a_row_is_missing() {
    let session = Session::new(Recording::with_affected([Ok(1), Ok(0)]));
    let mut tags = [stored_tag(1), stored_tag(2), stored_tag(3)];

    assert!(!session.delete_all(&mut tags).unwrap());

    let log = session.connection().log();
    assert_eq!(log.first().map(String::as_str), Some("BEGIN"));
    assert_eq!(log.last().map(String::as_str), Some("ROLLBACK"));
    assert_eq!(log.iter().filter(|s| s.starts_with("DELETE")).count(), 2);
    assert!(tags.iter().all(|t| !t.is_deleted()));
}

#[test]
fn delete_all_rolls_back_and_propagates_errors() {
    let failure = Error::Query(QueryError {
        kind: QueryErrorKind::Busy,
        sql: None,
        message: "database is locked".to_string(),
        source: None,
    });
    let session = Session::new(Recording::with_affected([Ok(1), Err(failure)]));
    let mut tags = [stored_tag(1), stored_tag(2)];

    let err = session.delete_all(&mut tags).unwrap_err();

    assert!(matches!(err, Error::Query(ref q) if q.kind == QueryErrorKind::Busy));
    assert_eq!(session.connection().log().last().map(String::as_str), Some("ROLLBACK"));
    assert!(!session.connection().log().iter().any(|s| s == "COMMIT"));
}

#[test]
fn delete_all_commits_then_marks_deleted() {
    let session = Session::new(Recording::default());
    let mut tags = [stored_tag(1), stored_tag(2)];

    assert!(session.delete_all(&mut tags).unwrap());

    assert_eq!(session.connection().log().last().map(String::as_str), Some("COMMIT"));
    assert!(tags.iter().all(Model::is_deleted));
}
