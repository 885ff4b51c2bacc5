//! Point-in-time read rewriting.
//!
//! A read of a versioned entity with an as-of timestamp is redirected from
//! the live table to the entity's log table, aliased as the live table so
//! caller filters keep resolving, and restricted to the latest snapshot per
//! key appended at or before the timestamp:
//!
//! ```text
//! SELECT * FROM shadow_users AS users
//! WHERE (name = ?)
//!   AND shadow_seq IN (SELECT MAX(shadow_seq) AS shadow_seq FROM shadow_users
//!                      WHERE shadow_timestamp <= ? GROUP BY id)
//! ```

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use crate::hooks::Scope;
use crate::schema::EntitySchema;
use crate::statement::{Expr, Statement, TableRef};
use crate::traits::TimeMachine;
use crate::types::RequestContext;
use crate::versioning::VersionLogStore;

/// Why a read was left as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The statement already failed.
    ScopeError,
    /// Raw read requested by the caller.
    Unscoped,
    /// No schema, or the entity has no log table.
    NotVersioned,
    /// The time provider supplied no as-of timestamp.
    NoTimestamp,
    /// The statement already reads from the log table.
    AlreadyRewritten,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::ScopeError => "statement already failed",
            SkipReason::Unscoped => "unscoped read",
            SkipReason::NotVersioned => "entity is not versioned",
            SkipReason::NoTimestamp => "no as-of timestamp",
            SkipReason::AlreadyRewritten => "already reads from the log table",
        };
        f.write_str(reason)
    }
}

/// What a rewrite attempt did to a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    Rewritten { log_table: String },
    Skipped(SkipReason),
}

impl RewriteOutcome {
    pub fn is_rewritten(&self) -> bool {
        matches!(self, RewriteOutcome::Rewritten { .. })
    }
}

/// As-of timestamp for a request. Provider errors count as "no timestamp".
pub(crate) fn resolve_as_of(
    time_machine: &dyn TimeMachine,
    ctx: &RequestContext,
) -> Option<DateTime<Utc>> {
    match time_machine.get_time(ctx) {
        Ok(ts) => ts,
        Err(e) => {
            tracing::debug!(request_id = %ctx.request_id, "Time provider failed: {}", e);
            None
        }
    }
}

/// Redirect `stmt` to the log table of `schema` as of `as_of`.
///
/// Performs no I/O. Either the statement is fully rewritten or it is left
/// untouched.
pub fn apply_as_of(
    store: &dyn VersionLogStore,
    stmt: &mut Statement,
    as_of: DateTime<Utc>,
    schema: &EntitySchema,
) -> RewriteOutcome {
    if stmt.unscoped {
        return RewriteOutcome::Skipped(SkipReason::Unscoped);
    }
    let Some(log_table) = schema.shadow_table.as_deref() else {
        return RewriteOutcome::Skipped(SkipReason::NotVersioned);
    };
    if stmt.reads_from(log_table) {
        return RewriteOutcome::Skipped(SkipReason::AlreadyRewritten);
    }

    let source = stmt.source();
    let alias = source.alias.unwrap_or(source.name);
    let keys: Vec<String> = schema
        .primary_columns()
        .into_iter()
        .map(str::to_string)
        .collect();
    let latest = store.latest_seq_as_of(log_table, &keys, as_of);

    stmt.from = Some(TableRef::aliased(log_table, alias));
    stmt.wheres
        .push(Expr::in_subquery(store.seq_column().to_string(), latest));

    RewriteOutcome::Rewritten {
        log_table: log_table.to_string(),
    }
}

/// Rewrites root reads of versioned entities.
#[derive(Clone)]
pub struct PointInTimeRewriter {
    store: Arc<dyn VersionLogStore>,
    time_machine: Arc<dyn TimeMachine>,
}

impl PointInTimeRewriter {
    pub fn new(store: Arc<dyn VersionLogStore>, time_machine: Arc<dyn TimeMachine>) -> Self {
        Self {
            store,
            time_machine,
        }
    }

    /// Before-query handler.
    pub fn rewrite_query(&self, scope: &mut Scope<'_>) -> RewriteOutcome {
        let outcome = self.rewrite(scope);
        match &outcome {
            RewriteOutcome::Rewritten { log_table } => tracing::debug!(
                table = %scope.statement.table,
                log_table = %log_table,
                "Rewrote read to point in time"
            ),
            RewriteOutcome::Skipped(reason) => tracing::debug!(
                table = %scope.statement.table,
                reason = %reason,
                "Point-in-time rewrite skipped"
            ),
        }
        outcome
    }

    fn rewrite(&self, scope: &mut Scope<'_>) -> RewriteOutcome {
        if scope.has_error() {
            return RewriteOutcome::Skipped(SkipReason::ScopeError);
        }
        if scope.statement.unscoped {
            return RewriteOutcome::Skipped(SkipReason::Unscoped);
        }
        let Some(schema) = scope.schema.clone() else {
            return RewriteOutcome::Skipped(SkipReason::NotVersioned);
        };
        if !schema.is_versioned() {
            return RewriteOutcome::Skipped(SkipReason::NotVersioned);
        }
        let Some(as_of) = resolve_as_of(self.time_machine.as_ref(), &scope.statement.context)
        else {
            return RewriteOutcome::Skipped(SkipReason::NoTimestamp);
        };
        apply_as_of(self.store.as_ref(), &mut scope.statement, as_of, &schema)
    }
}
