//! Snapshot appends for committed writes.

use std::sync::Arc;

use crate::config::ShadowConfig;
use crate::error::{ErrorCode, ShadowError, ShadowResult};
use crate::hooks::{Operation, Scope};
use crate::schema::EntitySchema;
use crate::statement::{Expr, Statement};
use crate::traits::{Executor, ExecutorExt};
use crate::types::Row;
use crate::versioning::{ShadowLayout, VersionLogStore};

/// Appends a snapshot of every row a versioned write touched.
///
/// Runs inside the write's transaction, after the host issued the write and
/// before it commits. A failed append or re-read is added to the scope, which
/// makes the host roll the whole write back.
#[derive(Clone)]
pub struct SnapshotWriter {
    store: Arc<dyn VersionLogStore>,
    config: ShadowConfig,
}

impl SnapshotWriter {
    pub fn new(store: Arc<dyn VersionLogStore>, config: ShadowConfig) -> Self {
        Self { store, config }
    }

    /// Before-commit handler for creates and updates.
    pub fn snapshot_write(&self, scope: &mut Scope<'_>) {
        if scope.has_error() {
            return;
        }
        let Some(schema) = scope.schema.clone() else {
            return;
        };
        let Some(layout) = ShadowLayout::for_schema(&schema, &self.config) else {
            return;
        };
        if scope.operation == Operation::Update && scope.rows_affected == 0 {
            tracing::debug!(entity = %schema.name, "Update matched no rows, nothing to snapshot");
            return;
        }
        let Some(model) = scope.model.clone() else {
            return;
        };

        let result = self
            .complete(scope.executor, &schema, &layout, &model)
            .and_then(|snapshot| self.store.append(scope.executor, &layout.table, &snapshot));
        match result {
            Ok(seq) => tracing::trace!(entity = %schema.name, seq, "Snapshot recorded"),
            Err(e) => {
                tracing::error!(
                    entity = %schema.name,
                    log_table = %layout.table,
                    "Failed to record snapshot: {}",
                    e
                );
                scope.add_error(e);
            }
        }
    }

    /// Before-delete handler. Reads the live rows a soft delete is about to
    /// mark, with the delete's own filter, so the snapshots cover exactly
    /// those rows. Hard deletes are not versioned and read nothing.
    pub fn capture_delete(&self, scope: &mut Scope<'_>) {
        if scope.has_error() || scope.statement.unscoped {
            return;
        }
        let Some(schema) = scope.schema.clone() else {
            return;
        };
        if schema.soft_delete_column.is_none() || !schema.is_versioned() {
            return;
        }

        let mut stmt = Statement::new(schema.table.clone());
        stmt.wheres = scope.statement.wheres.clone();
        match scope.executor.query_fragment(&stmt.to_sql()) {
            Ok(rows) => {
                tracing::trace!(entity = %schema.name, rows = rows.len(), "Captured rows to soft delete");
                scope.captured = rows;
            }
            Err(e) => {
                let e = ShadowError::resolution_from(
                    format!("reading '{}' rows to delete failed", schema.name),
                    e,
                );
                tracing::error!(entity = %schema.name, "Failed to capture soft delete: {}", e);
                scope.add_error(e);
            }
        }
    }

    /// Before-commit handler for deletes. Only soft deletes are versioned:
    /// the rows captured before the host marked them are appended with this
    /// delete's marker set.
    pub fn snapshot_delete(&self, scope: &mut Scope<'_>) {
        if scope.has_error() {
            return;
        }
        let Some(schema) = scope.schema.clone() else {
            return;
        };
        let Some(layout) = ShadowLayout::for_schema(&schema, &self.config) else {
            return;
        };
        let Some(column) = schema.soft_delete_column.clone() else {
            tracing::debug!(entity = %schema.name, "Hard delete is not versioned");
            return;
        };
        let Some(marker) = scope.assignments.get(&column).cloned() else {
            tracing::debug!(entity = %schema.name, "Hard delete is not versioned");
            return;
        };
        if scope.rows_affected == 0 {
            return;
        }

        let result = if scope.captured.is_empty() {
            Err(ShadowError::resolution(format!(
                "soft delete of '{}' marked {} rows but none were captured",
                schema.name, scope.rows_affected
            )))
        } else {
            if scope.captured.len() != scope.rows_affected {
                tracing::warn!(
                    entity = %schema.name,
                    affected = scope.rows_affected,
                    captured = scope.captured.len(),
                    "Soft-deleted row count differs from rows captured"
                );
            }
            scope.captured.iter().try_for_each(|row| {
                let mut marked = row.clone();
                marked.insert(column.clone(), marker.clone());
                let snapshot = self.complete(scope.executor, &schema, &layout, &marked)?;
                self.store
                    .append(scope.executor, &layout.table, &snapshot)
                    .map(|_| ())
            })
        };
        if let Err(e) = result {
            tracing::error!(
                entity = %schema.name,
                log_table = %layout.table,
                "Failed to record soft delete: {}",
                e
            );
            scope.add_error(e);
        }
    }

    /// Project `row` onto the versioned columns, re-reading the stored row by
    /// primary key when the write did not carry all of them.
    fn complete(
        &self,
        executor: &dyn Executor,
        schema: &EntitySchema,
        layout: &ShadowLayout,
        row: &Row,
    ) -> ShadowResult<Row> {
        let missing = match layout.project(row) {
            Ok(snapshot) => return Ok(snapshot),
            Err(missing) => missing,
        };
        tracing::debug!(
            entity = %schema.name,
            missing = ?missing,
            "Re-reading row to complete snapshot"
        );

        let stored = reread_by_key(executor, schema, row)?;
        layout.project(&stored).map_err(|missing| {
            ShadowError::resolution(format!(
                "stored '{}' row lacks versioned columns {:?}",
                schema.name, missing
            ))
        })
    }
}

fn reread_by_key(executor: &dyn Executor, schema: &EntitySchema, row: &Row) -> ShadowResult<Row> {
    let mut stmt = Statement::new(schema.table.clone());
    for column in schema.primary_columns() {
        let value = row
            .get(column)
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| ShadowError::Resolution {
                message: format!(
                    "cannot re-read '{}': key column '{}' is not set",
                    schema.name, column
                ),
                code: ErrorCode::ResMissingKey,
                source: None,
            })?;
        stmt = stmt.where_expr(Expr::eq(column, value));
    }
    stmt.limit = Some(1);

    executor
        .query_fragment(&stmt.to_sql())
        .map_err(|e| ShadowError::resolution_from(format!("re-reading '{}' failed", schema.name), e))?
        .into_iter()
        .next()
        .ok_or_else(|| {
            ShadowError::resolution(format!("no stored '{}' row matches the written key", schema.name))
        })
}
