//! Shared fixtures: entity types, table definitions and a session whose
//! clock and time provider the tests control.

#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::sync::{Arc, Mutex};

use timeshadow_core::{
    Db, Entity, EntitySchema, ExecOutcome, Executor, FieldSchema, FixedTimeMachine, ManualClock,
    Plugin, Record, Relation, Row, RowExt, ShadowConfig, ShadowPlugin, ShadowResult, TimeMachine,
    Value,
};
use timeshadow_sqlite::SqliteExecutor;

pub const SCHEMA: &str = r#"
CREATE TABLE users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT,
    manager_id INTEGER,
    login_count INTEGER NOT NULL DEFAULT 0,
    deleted_at TEXT
);
CREATE TABLE shadow_users (
    shadow_seq INTEGER PRIMARY KEY AUTOINCREMENT,
    shadow_timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    id INTEGER,
    name TEXT,
    email TEXT,
    manager_id INTEGER,
    deleted_at TEXT
);
CREATE INDEX idx_shadow_users_timestamp ON shadow_users(shadow_timestamp);

CREATE TABLE posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER NOT NULL,
    title TEXT NOT NULL
);
CREATE TABLE shadow_posts (
    shadow_seq INTEGER PRIMARY KEY AUTOINCREMENT,
    shadow_timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    id INTEGER,
    user_id INTEGER,
    title TEXT
);
CREATE INDEX idx_shadow_posts_timestamp ON shadow_posts(shadow_timestamp);

CREATE TABLE comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    post_id INTEGER NOT NULL,
    body TEXT NOT NULL
);
CREATE TABLE shadow_comments (
    shadow_seq INTEGER PRIMARY KEY AUTOINCREMENT,
    shadow_timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    id INTEGER,
    post_id INTEGER,
    body TEXT
);
CREATE INDEX idx_shadow_comments_timestamp ON shadow_comments(shadow_timestamp);

CREATE TABLE tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    label TEXT NOT NULL
);

-- Versioned, but its log table is never created.
CREATE TABLE widgets (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL
);
"#;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
    pub manager_id: Option<i64>,
    pub login_count: i64,
    pub deleted_at: Option<DateTime<Utc>>,
    pub posts: Vec<Post>,
    pub manager: Option<Box<User>>,
}

impl User {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            name: name.to_string(),
            email: Some(email.to_string()),
            ..Default::default()
        }
    }
}

impl Entity for User {
    const NAME: &'static str = "User";

    fn schema() -> EntitySchema {
        EntitySchema::new("User", "users")
            .field(FieldSchema::column("id").primary_key().auto_increment())
            .field(FieldSchema::column("name"))
            .field(FieldSchema::column("email"))
            .field(FieldSchema::column("manager_id"))
            .field(FieldSchema::column("login_count").non_versioned())
            .field(FieldSchema::column("deleted_at"))
            .soft_delete("deleted_at")
            .relation(Relation::has_many("Posts", "Post", "user_id", "id"))
            .relation(Relation::belongs_to("Manager", "User", "manager_id", "id"))
    }

    fn shadow_table() -> Option<&'static str> {
        Some("shadow_users")
    }

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), Value::from(self.id));
        row.insert("name".into(), Value::from(self.name.as_str()));
        row.insert("email".into(), Value::from(self.email.clone()));
        row.insert("manager_id".into(), Value::from(self.manager_id));
        row.insert("login_count".into(), Value::from(self.login_count));
        row.insert("deleted_at".into(), Value::from(self.deleted_at));
        row
    }

    fn from_row(row: &Row) -> ShadowResult<Self> {
        Ok(Self {
            id: row.get_i64("id")?,
            name: row.get_string("name")?,
            email: row.get_opt_string("email")?,
            manager_id: row.get("manager_id").and_then(Value::as_i64),
            // Not versioned: absent from historical rows.
            login_count: row.get("login_count").and_then(Value::as_i64).unwrap_or(0),
            deleted_at: row.get_opt_timestamp("deleted_at")?,
            posts: Vec::new(),
            manager: None,
        })
    }

    fn from_record(record: &Record) -> ShadowResult<Self> {
        let mut user = Self::from_row(&record.row)?;
        user.posts = record
            .related("Posts")
            .iter()
            .map(Post::from_record)
            .collect::<ShadowResult<_>>()?;
        user.manager = record
            .related("Manager")
            .first()
            .map(Self::from_record)
            .transpose()?
            .map(Box::new);
        Ok(user)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Post {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub comments: Vec<Comment>,
}

impl Post {
    pub fn new(user_id: i64, title: &str) -> Self {
        Self {
            user_id,
            title: title.to_string(),
            ..Default::default()
        }
    }
}

impl Entity for Post {
    const NAME: &'static str = "Post";

    fn schema() -> EntitySchema {
        EntitySchema::new("Post", "posts")
            .field(FieldSchema::column("id").primary_key().auto_increment())
            .field(FieldSchema::column("user_id"))
            .field(FieldSchema::column("title"))
            .relation(Relation::has_many("Comments", "Comment", "post_id", "id"))
            .relation(Relation::belongs_to("Author", "User", "user_id", "id"))
    }

    fn shadow_table() -> Option<&'static str> {
        Some("shadow_posts")
    }

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), Value::from(self.id));
        row.insert("user_id".into(), Value::from(self.user_id));
        row.insert("title".into(), Value::from(self.title.as_str()));
        row
    }

    fn from_row(row: &Row) -> ShadowResult<Self> {
        Ok(Self {
            id: row.get_i64("id")?,
            user_id: row.get_i64("user_id")?,
            title: row.get_string("title")?,
            comments: Vec::new(),
        })
    }

    fn from_record(record: &Record) -> ShadowResult<Self> {
        let mut post = Self::from_row(&record.row)?;
        post.comments = record
            .related("Comments")
            .iter()
            .map(Comment::from_record)
            .collect::<ShadowResult<_>>()?;
        Ok(post)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub body: String,
}

impl Comment {
    pub fn new(post_id: i64, body: &str) -> Self {
        Self {
            post_id,
            body: body.to_string(),
            ..Default::default()
        }
    }
}

impl Entity for Comment {
    const NAME: &'static str = "Comment";

    fn schema() -> EntitySchema {
        EntitySchema::new("Comment", "comments")
            .field(FieldSchema::column("id").primary_key().auto_increment())
            .field(FieldSchema::column("post_id"))
            .field(FieldSchema::column("body"))
    }

    fn shadow_table() -> Option<&'static str> {
        Some("shadow_comments")
    }

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), Value::from(self.id));
        row.insert("post_id".into(), Value::from(self.post_id));
        row.insert("body".into(), Value::from(self.body.as_str()));
        row
    }

    fn from_row(row: &Row) -> ShadowResult<Self> {
        Ok(Self {
            id: row.get_i64("id")?,
            post_id: row.get_i64("post_id")?,
            body: row.get_string("body")?,
        })
    }
}

/// Never versioned.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tag {
    pub id: i64,
    pub label: String,
}

impl Entity for Tag {
    const NAME: &'static str = "Tag";

    fn schema() -> EntitySchema {
        EntitySchema::new("Tag", "tags")
            .field(FieldSchema::column("id").primary_key().auto_increment())
            .field(FieldSchema::column("label"))
    }

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), Value::from(self.id));
        row.insert("label".into(), Value::from(self.label.as_str()));
        row
    }

    fn from_row(row: &Row) -> ShadowResult<Self> {
        Ok(Self {
            id: row.get_i64("id")?,
            label: row.get_string("label")?,
        })
    }
}

/// Versioned into a log table that does not exist, so every append fails.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Widget {
    pub id: i64,
    pub name: String,
}

impl Entity for Widget {
    const NAME: &'static str = "Widget";

    fn schema() -> EntitySchema {
        EntitySchema::new("Widget", "widgets")
            .field(FieldSchema::column("id").primary_key().auto_increment())
            .field(FieldSchema::column("name"))
    }

    fn shadow_table() -> Option<&'static str> {
        Some("shadow_widgets")
    }

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), Value::from(self.id));
        row.insert("name".into(), Value::from(self.name.as_str()));
        row
    }

    fn from_row(row: &Row) -> ShadowResult<Self> {
        Ok(Self {
            id: row.get_i64("id")?,
            name: row.get_string("name")?,
        })
    }
}

/// Executor wrapper that remembers every statement it ran.
pub struct Recording {
    inner: SqliteExecutor,
    statements: Mutex<Vec<String>>,
}

impl Recording {
    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.statements.lock().unwrap().clear();
    }

    pub fn count(&self, table: &str) -> i64 {
        let rows = self
            .inner
            .query(&format!("SELECT COUNT(*) AS n FROM {}", table), &[])
            .unwrap();
        rows[0]["n"].as_i64().unwrap()
    }

    fn record(&self, sql: &str) {
        self.statements.lock().unwrap().push(sql.to_string());
    }
}

impl Executor for Recording {
    fn execute(&self, sql: &str, params: &[Value]) -> ShadowResult<ExecOutcome> {
        self.record(sql);
        self.inner.execute(sql, params)
    }

    fn query(&self, sql: &str, params: &[Value]) -> ShadowResult<Vec<Row>> {
        self.record(sql);
        self.inner.query(sql, params)
    }

    fn begin(&self) -> ShadowResult<()> {
        self.inner.begin()
    }

    fn commit(&self) -> ShadowResult<()> {
        self.inner.commit()
    }

    fn rollback(&self) -> ShadowResult<()> {
        self.inner.rollback()
    }
}

pub struct Harness {
    pub db: Db<Recording>,
    pub clock: Arc<ManualClock>,
    pub time: Arc<FixedTimeMachine>,
    pub plugin: ShadowPlugin,
}

impl Harness {
    /// Move the clock forward and return the new time. Writes after this
    /// call are stamped with it.
    pub fn tick(&self) -> DateTime<Utc> {
        self.clock.advance(Duration::seconds(10))
    }

    pub fn executor(&self) -> &Recording {
        self.db.executor()
    }

    /// Every snapshot of one user, oldest first.
    pub fn user_history(&self, id: i64) -> Vec<timeshadow_core::Snapshot> {
        let mut key = Row::new();
        key.insert("id".into(), Value::from(id));
        self.plugin
            .store()
            .history(self.executor(), "shadow_users", &["id".to_string()], &key)
            .unwrap()
    }
}

pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap()
}

/// Session with a fixed, settable as-of time.
pub fn harness() -> Harness {
    let time = Arc::new(FixedTimeMachine::new());
    build(time.clone(), time)
}

/// Session whose as-of time comes from each request's context.
pub fn harness_with(time_machine: Arc<dyn TimeMachine>) -> Harness {
    build(Arc::new(FixedTimeMachine::new()), time_machine)
}

fn build(time: Arc<FixedTimeMachine>, time_machine: Arc<dyn TimeMachine>) -> Harness {
    let inner = SqliteExecutor::in_memory().unwrap();
    inner.execute_batch(SCHEMA).unwrap();
    let executor = Recording {
        inner,
        statements: Mutex::new(Vec::new()),
    };

    let clock = Arc::new(ManualClock::new(start()));
    let mut db = Db::with_clock(executor, clock.clone());
    db.register::<User>().unwrap();
    db.register::<Post>().unwrap();
    db.register::<Comment>().unwrap();
    db.register::<Tag>().unwrap();
    db.register::<Widget>().unwrap();

    let plugin = ShadowPlugin::with_config(ShadowConfig::default(), time_machine, clock.clone());
    assert_eq!(plugin.name(), "shadow");
    db.use_plugin(&plugin).unwrap();

    Harness {
        db,
        clock,
        time,
        plugin,
    }
}
