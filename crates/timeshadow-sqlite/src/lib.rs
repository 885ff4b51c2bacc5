//! timeshadow-sqlite - SQLite executor for timeshadow.
//!
//! Runs the SQL rendered by `timeshadow-core` on a single `rusqlite`
//! connection. Log tables rely on `INTEGER PRIMARY KEY AUTOINCREMENT` for
//! their sequence column and store timestamps as fixed-width UTC text.

mod config;
mod executor;

pub use config::{SqliteConfig, MEMORY_PATH};
pub use executor::SqliteExecutor;
