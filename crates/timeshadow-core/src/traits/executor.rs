//! Relational executor trait.

use crate::error::ShadowResult;
use crate::statement::SqlFragment;
use crate::types::{Row, Value};

/// Result of a statement that does not return rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: usize,
    /// Row id generated by the last insert, if the backend reports one.
    pub last_insert_id: i64,
}

/// Executes rendered SQL. Implementations own connections and transactions;
/// every call issued between `begin` and `commit`/`rollback` belongs to the
/// same unit of work.
#[cfg_attr(test, mockall::automock)]
pub trait Executor: Send + Sync {
    fn execute(&self, sql: &str, params: &[Value]) -> ShadowResult<ExecOutcome>;

    fn query(&self, sql: &str, params: &[Value]) -> ShadowResult<Vec<Row>>;

    fn begin(&self) -> ShadowResult<()>;

    fn commit(&self) -> ShadowResult<()>;

    fn rollback(&self) -> ShadowResult<()>;
}

/// Convenience calls taking a rendered fragment.
pub trait ExecutorExt {
    fn execute_fragment(&self, fragment: &SqlFragment) -> ShadowResult<ExecOutcome>;
    fn query_fragment(&self, fragment: &SqlFragment) -> ShadowResult<Vec<Row>>;
}

impl<E: Executor + ?Sized> ExecutorExt for E {
    fn execute_fragment(&self, fragment: &SqlFragment) -> ShadowResult<ExecOutcome> {
        tracing::trace!(sql = %fragment.sql, "execute");
        self.execute(&fragment.sql, &fragment.params)
    }

    fn query_fragment(&self, fragment: &SqlFragment) -> ShadowResult<Vec<Row>> {
        tracing::trace!(sql = %fragment.sql, "query");
        self.query(&fragment.sql, &fragment.params)
    }
}
