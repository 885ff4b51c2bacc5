//! The versioning plugin: wires the snapshot writer and the read rewriters
//! into a host's handler chains.

use std::sync::Arc;

use crate::config::ShadowConfig;
use crate::error::ShadowResult;
use crate::hooks::{Callbacks, Plugin, HOST_COMMIT, HOST_DELETE, HOST_PRELOAD, HOST_QUERY};
use crate::traits::{Clock, SystemClock, TimeMachine};
use crate::versioning::{
    PointInTimeRewriter, RelationRewriter, SnapshotWriter, SqlLogStore, VersionLogStore,
};

/// Handler names registered by [`ShadowPlugin`].
pub const CREATE_HOOK: &str = "shadow:create";
pub const UPDATE_HOOK: &str = "shadow:update";
pub const CAPTURE_HOOK: &str = "shadow:capture_delete";
pub const DELETE_HOOK: &str = "shadow:delete";
pub const QUERY_HOOK: &str = "shadow:query";
pub const PRELOAD_HOOK: &str = "shadow:preload";

/// Versions writes of versioned entities and rewrites reads that carry an
/// as-of timestamp.
///
/// Writes are snapshotted right before the host commits, so the append
/// shares the write's transaction. Rows a soft delete will mark are read
/// right before the host marks them. Reads are rewritten right before the host
/// executes the query and before it loads preloads.
pub struct ShadowPlugin {
    config: ShadowConfig,
    store: Arc<dyn VersionLogStore>,
    writer: SnapshotWriter,
    rewriter: PointInTimeRewriter,
    relations: RelationRewriter,
}

impl ShadowPlugin {
    pub const NAME: &'static str = "shadow";

    /// Plugin with default columns and the system clock.
    pub fn new(time_machine: Arc<dyn TimeMachine>) -> Self {
        Self::with_config(ShadowConfig::default(), time_machine, Arc::new(SystemClock))
    }

    pub fn with_config(
        config: ShadowConfig,
        time_machine: Arc<dyn TimeMachine>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = Arc::new(SqlLogStore::with_clock(config.clone(), clock));
        Self::with_store(config, store, time_machine)
    }

    /// Plugin over a custom log store.
    pub fn with_store(
        config: ShadowConfig,
        store: Arc<dyn VersionLogStore>,
        time_machine: Arc<dyn TimeMachine>,
    ) -> Self {
        Self {
            writer: SnapshotWriter::new(Arc::clone(&store), config.clone()),
            rewriter: PointInTimeRewriter::new(Arc::clone(&store), Arc::clone(&time_machine)),
            relations: RelationRewriter::new(Arc::clone(&store), time_machine),
            store,
            config,
        }
    }

    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    /// The log store, for history lookups.
    pub fn store(&self) -> &Arc<dyn VersionLogStore> {
        &self.store
    }
}

impl Plugin for ShadowPlugin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn initialize(&self, callbacks: &mut Callbacks) -> ShadowResult<()> {
        if !self.config.enabled {
            tracing::info!(plugin = Self::NAME, "Plugin disabled, no hooks registered");
            return Ok(());
        }

        let writer = self.writer.clone();
        callbacks
            .create()
            .register_before(HOST_COMMIT, CREATE_HOOK, move |scope| {
                writer.snapshot_write(scope)
            })?;

        let writer = self.writer.clone();
        callbacks
            .update()
            .register_before(HOST_COMMIT, UPDATE_HOOK, move |scope| {
                writer.snapshot_write(scope)
            })?;

        let writer = self.writer.clone();
        callbacks
            .delete()
            .register_before(HOST_DELETE, CAPTURE_HOOK, move |scope| {
                writer.capture_delete(scope)
            })?;

        let writer = self.writer.clone();
        callbacks
            .delete()
            .register_before(HOST_COMMIT, DELETE_HOOK, move |scope| {
                writer.snapshot_delete(scope)
            })?;

        let rewriter = self.rewriter.clone();
        callbacks
            .query()
            .register_before(HOST_QUERY, QUERY_HOOK, move |scope| {
                rewriter.rewrite_query(scope);
            })?;

        let relations = self.relations.clone();
        callbacks
            .query()
            .register_before(HOST_PRELOAD, PRELOAD_HOOK, move |scope| {
                relations.rewrite_preloads(scope);
            })?;

        tracing::info!(
            plugin = Self::NAME,
            seq_column = %self.config.seq_column,
            timestamp_column = %self.config.timestamp_column,
            "Plugin initialized"
        );
        Ok(())
    }
}
