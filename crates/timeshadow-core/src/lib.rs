//! timeshadow-core - Point-in-time reads over append-only entity logs.
//!
//! Every committed write to a versioned entity appends a full snapshot of the
//! row to the entity's log table. Reads that carry an as-of timestamp are
//! rewritten to return the rows as they were at that instant, including
//! eager-loaded relations.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use timeshadow_core::{Db, FixedTimeMachine, Query, ShadowPlugin};
//!
//! let time = Arc::new(FixedTimeMachine::new());
//! let mut db = Db::new(executor);
//! db.register::<User>()?;
//! db.use_plugin(&ShadowPlugin::new(time.clone()))?;
//!
//! db.create(&mut user)?;
//! time.set(yesterday);
//! let then: Vec<User> = db.find(Query::new().preload("Posts"))?;
//! ```

pub mod config;
pub mod error;
pub mod hooks;
pub mod plugin;
pub mod schema;
pub mod session;
pub mod statement;
pub mod traits;
pub mod types;
pub mod versioning;

// Re-export commonly used types
pub use config::ShadowConfig;
pub use error::{ErrorCode, ShadowError, ShadowResult};
pub use hooks::{Callbacks, Operation, Plugin, Scope};
pub use plugin::ShadowPlugin;
pub use schema::{Entity, EntitySchema, FieldSchema, Relation, RelationKind, SchemaRegistry};
pub use session::{Db, Query};
pub use statement::{Arg, Expr, PreloadCondition, Statement};
pub use traits::{
    Clock, ContextTimeMachine, ExecOutcome, Executor, ExecutorExt, FixedTimeMachine, ManualClock,
    SystemClock, TimeMachine,
};
pub use types::{Record, RequestContext, Row, RowExt, Value};
pub use versioning::{
    PointInTimeRewriter, RelationRewriter, RewriteOutcome, ShadowLayout, Snapshot,
    SnapshotWriter, SqlLogStore, VersionLogStore,
};
