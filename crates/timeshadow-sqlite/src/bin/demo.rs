//! timeshadow-demo - rename an account and read it back at two points in time.
//!
//! Uses an in-memory database unless `TIMESHADOW_DB_PATH` is set.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use timeshadow_core::{
    Db, Entity, EntitySchema, FieldSchema, FixedTimeMachine, Query, Row, RowExt, ShadowPlugin,
    ShadowResult, Value,
};
use timeshadow_sqlite::{SqliteConfig, SqliteExecutor};
use tracing::{info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    email TEXT
);
CREATE TABLE IF NOT EXISTS shadow_accounts (
    shadow_seq INTEGER PRIMARY KEY AUTOINCREMENT,
    shadow_timestamp TEXT NOT NULL,
    id INTEGER,
    name TEXT,
    email TEXT
);
CREATE INDEX IF NOT EXISTS idx_shadow_accounts_timestamp ON shadow_accounts(shadow_timestamp);
"#;

#[derive(Debug, Default)]
struct Account {
    id: i64,
    name: String,
    email: Option<String>,
}

impl Entity for Account {
    const NAME: &'static str = "Account";

    fn schema() -> EntitySchema {
        EntitySchema::new("Account", "accounts")
            .field(FieldSchema::column("id").primary_key().auto_increment())
            .field(FieldSchema::column("name"))
            .field(FieldSchema::column("email"))
    }

    fn shadow_table() -> Option<&'static str> {
        Some("shadow_accounts")
    }

    fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("id".into(), Value::from(self.id));
        row.insert("name".into(), Value::from(self.name.as_str()));
        row.insert("email".into(), Value::from(self.email.clone()));
        row
    }

    fn from_row(row: &Row) -> ShadowResult<Self> {
        Ok(Self {
            id: row.get_i64("id")?,
            name: row.get_string("name")?,
            email: row.get_opt_string("email")?,
        })
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let config = if std::env::var("TIMESHADOW_DB_PATH").is_ok() {
        SqliteConfig::from_env()?
    } else {
        SqliteConfig::in_memory()
    };
    let executor = SqliteExecutor::open(&config)?;
    executor.execute_batch(SCHEMA)?;
    info!(path = %config.path.display(), "Database ready");

    let time = Arc::new(FixedTimeMachine::new());
    let plugin = ShadowPlugin::new(time.clone());
    let mut db = Db::new(executor);
    db.register::<Account>()?;
    db.use_plugin(&plugin)?;

    let mut account = Account {
        name: "John Doe".to_string(),
        email: Some("john.doe@example.com".to_string()),
        ..Default::default()
    };
    db.create(&mut account)?;
    let created_at = Utc::now();
    std::thread::sleep(Duration::from_millis(5));

    account.name = "Jane Doe".to_string();
    db.save(&account)?;

    let by_id = || Query::new().eq("id", account.id);

    time.set(created_at);
    if let Some(then) = db.first::<Account>(by_id())? {
        info!(at = %created_at, name = %then.name, "Historical read");
    }

    time.clear();
    if let Some(now) = db.first::<Account>(by_id())? {
        info!(name = %now.name, email = ?now.email, "Current read");
    }

    for snapshot in plugin.store().history(
        db.executor(),
        "shadow_accounts",
        &["id".to_string()],
        &account.to_row(),
    )? {
        info!(seq = snapshot.seq, at = %snapshot.timestamp, "Snapshot");
    }

    Ok(())
}
