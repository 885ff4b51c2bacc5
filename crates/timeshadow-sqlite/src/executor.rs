//! `Executor` implementation over one SQLite connection.

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use timeshadow_core::{ErrorCode, ExecOutcome, Executor, Row, ShadowError, ShadowResult, Value};

use crate::config::SqliteConfig;

/// SQLite-backed executor. Every call runs on the same connection, so
/// statements issued between `begin` and `commit` share one transaction.
pub struct SqliteExecutor {
    conn: Mutex<Connection>,
}

impl SqliteExecutor {
    /// Open (creating parent directories as needed) the configured database.
    pub fn open(config: &SqliteConfig) -> ShadowResult<Self> {
        let conn = if config.is_in_memory() {
            Connection::open_in_memory()
        } else {
            if let Some(parent) = config.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            Connection::open(&config.path)
        }
        .map_err(|e| db_error(ErrorCode::DbConnectionFailed, "Failed to open database", e))?;

        conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))
            .map_err(|e| db_error(ErrorCode::DbConnectionFailed, "Failed to set busy timeout", e))?;

        tracing::debug!(path = %config.path.display(), "Opened SQLite database");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Private in-memory database (for testing).
    pub fn in_memory() -> ShadowResult<Self> {
        Self::open(&SqliteConfig::in_memory())
    }

    /// Run several `;`-separated statements, e.g. table definitions.
    pub fn execute_batch(&self, sql: &str) -> ShadowResult<()> {
        self.lock()?
            .execute_batch(sql)
            .map_err(|e| db_error(ErrorCode::DbOperationFailed, "Failed to execute batch", e))
    }

    fn lock(&self) -> ShadowResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| ShadowError::Internal(format!("Lock error: {}", e)))
    }

    fn transaction_control(&self, sql: &str) -> ShadowResult<()> {
        tracing::trace!(sql, "transaction");
        self.lock()?
            .execute_batch(sql)
            .map_err(|e| db_error(ErrorCode::DbTransactionFailed, sql, e))
    }
}

impl Executor for SqliteExecutor {
    fn execute(&self, sql: &str, params: &[Value]) -> ShadowResult<ExecOutcome> {
        let conn = self.lock()?;
        let rows_affected = conn
            .execute(sql, params_from_iter(params.iter().map(to_sql)))
            .map_err(|e| db_error(ErrorCode::DbOperationFailed, sql, e))?;
        Ok(ExecOutcome {
            rows_affected,
            last_insert_id: conn.last_insert_rowid(),
        })
    }

    fn query(&self, sql: &str, params: &[Value]) -> ShadowResult<Vec<Row>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| db_error(ErrorCode::DbOperationFailed, sql, e))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut rows = stmt
            .query(params_from_iter(params.iter().map(to_sql)))
            .map_err(|e| db_error(ErrorCode::DbOperationFailed, sql, e))?;

        let mut out = Vec::new();
        while let Some(row) = rows
            .next()
            .map_err(|e| db_error(ErrorCode::DbOperationFailed, sql, e))?
        {
            let mut values = Row::new();
            for (i, column) in columns.iter().enumerate() {
                let value = row
                    .get_ref(i)
                    .map_err(|e| db_error(ErrorCode::DbOperationFailed, sql, e))?;
                values.insert(column.clone(), from_sql(value, column)?);
            }
            out.push(values);
        }
        Ok(out)
    }

    fn begin(&self) -> ShadowResult<()> {
        self.transaction_control("BEGIN")
    }

    fn commit(&self) -> ShadowResult<()> {
        self.transaction_control("COMMIT")
    }

    fn rollback(&self) -> ShadowResult<()> {
        self.transaction_control("ROLLBACK")
    }
}

fn db_error(code: ErrorCode, context: &str, err: rusqlite::Error) -> ShadowError {
    ShadowError::Database {
        message: format!("{}: {}", context, err),
        code,
        source: Some(Box::new(err)),
    }
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Integer(v) => SqlValue::Integer(*v),
        Value::Real(v) => SqlValue::Real(*v),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Timestamp(ts) => SqlValue::Text(Value::format_timestamp(ts)),
    }
}

fn from_sql(value: ValueRef<'_>, column: &str) -> ShadowResult<Value> {
    Ok(match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(v) => Value::Integer(v),
        ValueRef::Real(v) => Value::Real(v),
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(_) => {
            return Err(ShadowError::parse(format!(
                "column '{}' holds a blob, which is not supported",
                column
            )))
        }
    })
}
