//! Log table storage: appends and the latest-snapshot sub-query.

use chrono::{DateTime, SubsecRound, Utc};
use std::sync::{Arc, Mutex, PoisonError};

use crate::config::ShadowConfig;
use crate::error::{ShadowError, ShadowResult};
use crate::statement::{insert_sql, Arg, Expr, Statement};
use crate::traits::{Clock, Executor, ExecutorExt, SystemClock};
use crate::types::{Row, Value};
use crate::versioning::Snapshot;

/// Operations on append-only log tables.
pub trait VersionLogStore: Send + Sync {
    /// Append one snapshot and return its sequence number. The append time
    /// is assigned here, never taken from `snapshot`.
    fn append(&self, executor: &dyn Executor, log_table: &str, snapshot: &Row)
        -> ShadowResult<i64>;

    /// Sub-query selecting, per key, the highest sequence number appended at
    /// or before `as_of`. Composed into other statements; never executed on
    /// its own.
    fn latest_seq_as_of(
        &self,
        log_table: &str,
        key_columns: &[String],
        as_of: DateTime<Utc>,
    ) -> Statement;

    /// All snapshots of one key, oldest first.
    fn history(
        &self,
        executor: &dyn Executor,
        log_table: &str,
        key_columns: &[String],
        key: &Row,
    ) -> ShadowResult<Vec<Snapshot>>;

    /// Name of the sequence column in every log table.
    fn seq_column(&self) -> &str;
}

/// Log store issuing plain SQL through the caller's executor.
pub struct SqlLogStore {
    config: ShadowConfig,
    clock: Arc<dyn Clock>,
    last_timestamp: Mutex<Option<DateTime<Utc>>>,
}

impl SqlLogStore {
    pub fn new(config: ShadowConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ShadowConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            last_timestamp: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    /// Append time for the next snapshot. Truncated to the stored precision
    /// and never earlier than the previous one, even if the clock steps back.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = self.clock.now().trunc_subsecs(6);
        let mut last = self
            .last_timestamp
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let ts = match *last {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        *last = Some(ts);
        ts
    }
}

impl Default for SqlLogStore {
    fn default() -> Self {
        Self::new(ShadowConfig::default())
    }
}

impl VersionLogStore for SqlLogStore {
    fn append(
        &self,
        executor: &dyn Executor,
        log_table: &str,
        snapshot: &Row,
    ) -> ShadowResult<i64> {
        let timestamp = self.next_timestamp();
        let mut row = snapshot.clone();
        row.remove(&self.config.seq_column);
        row.insert(
            self.config.timestamp_column.clone(),
            Value::Timestamp(timestamp),
        );

        let outcome = executor
            .execute_fragment(&insert_sql(log_table, &row))
            .map_err(|e| ShadowError::write_from(log_table, e))?;
        if outcome.rows_affected != 1 {
            return Err(ShadowError::write(
                log_table,
                format!(
                    "expected one appended row in '{}', got {}",
                    log_table, outcome.rows_affected
                ),
            ));
        }

        tracing::debug!(
            log_table,
            seq = outcome.last_insert_id,
            timestamp = %timestamp,
            "Appended snapshot"
        );
        Ok(outcome.last_insert_id)
    }

    fn latest_seq_as_of(
        &self,
        log_table: &str,
        key_columns: &[String],
        as_of: DateTime<Utc>,
    ) -> Statement {
        let seq = &self.config.seq_column;
        key_columns.iter().fold(
            Statement::new(log_table)
                .select(format!("MAX({}) AS {}", seq, seq))
                .filter(
                    format!("{} <= ?", self.config.timestamp_column),
                    vec![Arg::from(as_of)],
                ),
            |stmt, column| stmt.group(column.clone()),
        )
    }

    fn history(
        &self,
        executor: &dyn Executor,
        log_table: &str,
        key_columns: &[String],
        key: &Row,
    ) -> ShadowResult<Vec<Snapshot>> {
        let mut stmt =
            Statement::new(log_table).order(format!("{} ASC", self.config.seq_column));
        for column in key_columns {
            let value = key.get(column).cloned().ok_or_else(|| {
                ShadowError::validation(format!("history key is missing column '{}'", column))
            })?;
            stmt = stmt.where_expr(Expr::eq(column, value));
        }

        executor
            .query_fragment(&stmt.to_sql())?
            .into_iter()
            .map(|row| Snapshot::from_row(row, &self.config))
            .collect()
    }

    fn seq_column(&self) -> &str {
        &self.config.seq_column
    }
}
