//! The host's own handlers: transactions, writes, reads and preloads.

use chrono::SubsecRound;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{ErrorCode, ShadowError, ShadowResult};
use crate::hooks::{
    Callbacks, Operation, Scope, HOST_BEGIN, HOST_COMMIT, HOST_CREATE, HOST_DELETE, HOST_PRELOAD,
    HOST_QUERY, HOST_UPDATE,
};
use crate::schema::{EntitySchema, Relation};
use crate::statement::{delete_sql, insert_sql, update_sql, Expr, PreloadCondition, Statement};
use crate::traits::{Clock, ExecutorExt};
use crate::types::{Record, Row, Value};

/// Register the host handlers on a fresh handler set.
pub(crate) fn register(callbacks: &mut Callbacks, clock: Arc<dyn Clock>) {
    let create = callbacks.create();
    create.register(HOST_BEGIN, begin_transaction);
    create.register(HOST_CREATE, create_row);
    create.register(HOST_COMMIT, commit_or_rollback);

    let update = callbacks.update();
    update.register(HOST_BEGIN, begin_transaction);
    update.register(HOST_UPDATE, update_rows);
    update.register(HOST_COMMIT, commit_or_rollback);

    let delete = callbacks.delete();
    delete.register(HOST_BEGIN, begin_transaction);
    delete.register(HOST_DELETE, move |scope| delete_rows(scope, clock.as_ref()));
    delete.register(HOST_COMMIT, commit_or_rollback);

    let query = callbacks.query();
    query.register(HOST_QUERY, query_rows);
    query.register(HOST_PRELOAD, preload_relations);
}

fn begin_transaction(scope: &mut Scope<'_>) {
    if scope.has_error() || scope.in_transaction {
        return;
    }
    match scope.executor.begin() {
        Ok(()) => scope.owns_transaction = true,
        Err(e) => scope.add_error(e),
    }
}

fn commit_or_rollback(scope: &mut Scope<'_>) {
    if !scope.owns_transaction {
        return;
    }
    scope.owns_transaction = false;

    if scope.has_error() {
        if let Err(e) = scope.executor.rollback() {
            tracing::error!(operation = %scope.operation, "Rollback failed: {}", e);
        }
        return;
    }
    if let Err(e) = scope.executor.commit() {
        if let Err(rb) = scope.executor.rollback() {
            tracing::error!(operation = %scope.operation, "Rollback after failed commit failed: {}", rb);
        }
        scope.add_error(e);
    }
}

fn create_row(scope: &mut Scope<'_>) {
    if scope.has_error() {
        return;
    }
    let (Some(schema), Some(model)) = (scope.schema.clone(), scope.model.as_mut()) else {
        return;
    };

    let mut row = model.clone();
    let generated = schema.auto_increment_column().filter(|column| {
        row.get(*column)
            .map_or(true, |v| v.is_null() || v.as_i64() == Some(0))
    });
    if let Some(column) = generated {
        row.remove(column);
    }

    match scope.executor.execute_fragment(&insert_sql(&schema.table, &row)) {
        Ok(outcome) => {
            if let Some(column) = generated {
                model.insert(column.to_string(), Value::Integer(outcome.last_insert_id));
            }
            scope.rows_affected = outcome.rows_affected;
        }
        Err(e) => scope.add_error(e),
    }
}

fn update_rows(scope: &mut Scope<'_>) {
    if scope.has_error() {
        return;
    }
    let Some(schema) = scope.schema.clone() else {
        return;
    };
    if let Err(e) = require_filter(&scope.statement) {
        scope.add_error(e);
        return;
    }

    let assignments = if scope.assignments.is_empty() {
        let keys = schema.primary_columns();
        scope
            .model
            .iter()
            .flatten()
            .filter(|(column, _)| !keys.contains(&column.as_str()))
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect::<Row>()
    } else {
        scope.assignments.clone()
    };
    if assignments.is_empty() {
        return;
    }

    let fragment = update_sql(&schema.table, &assignments, &scope.statement.wheres);
    match scope.executor.execute_fragment(&fragment) {
        Ok(outcome) => scope.rows_affected = outcome.rows_affected,
        Err(e) => scope.add_error(e),
    }
}

fn delete_rows(scope: &mut Scope<'_>, clock: &dyn Clock) {
    if scope.has_error() {
        return;
    }
    let Some(schema) = scope.schema.clone() else {
        return;
    };
    if let Err(e) = require_filter(&scope.statement) {
        scope.add_error(e);
        return;
    }

    let fragment = match &schema.soft_delete_column {
        Some(column) if !scope.statement.unscoped => {
            let marker = Value::Timestamp(clock.now().trunc_subsecs(6));
            scope.assignments.insert(column.clone(), marker);
            update_sql(&schema.table, &scope.assignments, &scope.statement.wheres)
        }
        _ => delete_sql(&schema.table, &scope.statement.wheres),
    };
    match scope.executor.execute_fragment(&fragment) {
        Ok(outcome) => scope.rows_affected = outcome.rows_affected,
        Err(e) => scope.add_error(e),
    }
}

/// Writes must be narrowed by something other than the soft-delete guard.
fn require_filter(stmt: &Statement) -> ShadowResult<()> {
    if stmt.wheres.iter().any(|e| !e.is_soft_delete_guard()) {
        return Ok(());
    }
    Err(ShadowError::Validation {
        message: format!("refusing to write every row of '{}'", stmt.table),
        code: ErrorCode::ValMissingWhereClause,
        suggestion: Some("Filter by primary key or add a condition".to_string()),
    })
}

fn query_rows(scope: &mut Scope<'_>) {
    if scope.has_error() {
        return;
    }
    match scope.executor.query_fragment(&scope.statement.to_sql()) {
        Ok(rows) => scope.records = rows.into_iter().map(Record::new).collect(),
        Err(e) => scope.add_error(e),
    }
}

fn preload_relations(scope: &mut Scope<'_>) {
    if scope.has_error() || scope.records.is_empty() || scope.statement.preloads.is_empty() {
        return;
    }
    if let Err(e) = load_preloads(scope) {
        scope.add_error(e);
    }
}

/// Conditions for one relation plus the paths nested below it.
#[derive(Default)]
struct PreloadGroup {
    conditions: Vec<PreloadCondition>,
    nested: BTreeMap<String, Vec<PreloadCondition>>,
}

fn group_paths(preloads: &BTreeMap<String, Vec<PreloadCondition>>) -> BTreeMap<String, PreloadGroup> {
    let mut groups: BTreeMap<String, PreloadGroup> = BTreeMap::new();
    for (path, conditions) in preloads {
        match path.split_once('.') {
            Some((head, rest)) => {
                groups
                    .entry(head.to_string())
                    .or_default()
                    .nested
                    .insert(rest.to_string(), conditions.clone());
            }
            None => {
                groups
                    .entry(path.clone())
                    .or_default()
                    .conditions
                    .extend(conditions.iter().cloned());
            }
        }
    }
    groups
}

fn load_preloads(scope: &mut Scope<'_>) -> ShadowResult<()> {
    let Some(schema) = scope.schema.clone() else {
        return Ok(());
    };

    for (name, group) in group_paths(&scope.statement.preloads) {
        let (relation, target) = scope.schemas.resolve_relation(&schema, &name)?;
        let relation = relation.clone();

        let mut keys: Vec<Value> = Vec::new();
        for record in &scope.records {
            if let Some(value) = record.row.get(relation.owner_column()) {
                if !value.is_null() && !keys.contains(value) {
                    keys.push(value.clone());
                }
            }
        }

        let related = if keys.is_empty() {
            Vec::new()
        } else {
            let mut stmt = Statement::new(target.table.clone());
            stmt.context = scope.statement.context.clone();
            stmt.unscoped = scope.statement.unscoped;
            if let Some(column) = &target.soft_delete_column {
                if !stmt.unscoped {
                    stmt.wheres.push(Expr::SoftDeleteGuard {
                        column: column.clone(),
                    });
                }
            }
            stmt.wheres
                .push(Expr::in_values(relation.target_column(), keys));
            for condition in &group.conditions {
                condition.apply(&mut stmt);
            }
            stmt.preloads = group.nested;
            load_related(scope, target, stmt)?
        };

        attach(&mut scope.records, &relation, &name, &related);
    }
    Ok(())
}

/// Run the read of one relation through the query handlers, so it is
/// scoped and rewritten like any other read.
fn load_related(
    scope: &Scope<'_>,
    target: Arc<EntitySchema>,
    stmt: Statement,
) -> ShadowResult<Vec<Record>> {
    let mut child = Scope::new(
        Operation::Query,
        scope.executor,
        scope.schemas,
        Some(target),
        stmt,
    );
    child.in_transaction = scope.in_transaction;

    match scope.callbacks {
        Some(callbacks) => {
            child = child.with_callbacks(callbacks);
            callbacks.processor(Operation::Query).execute(&mut child);
        }
        None => {
            query_rows(&mut child);
            preload_relations(&mut child);
        }
    }

    match child.take_error() {
        Some(e) => Err(e),
        None => Ok(child.records),
    }
}

fn attach(records: &mut [Record], relation: &Relation, name: &str, related: &[Record]) {
    for record in records {
        let key = record.row.get(relation.owner_column()).cloned();
        let mut matches: Vec<Record> = match key {
            Some(key) if !key.is_null() => related
                .iter()
                .filter(|r| r.row.get(relation.target_column()) == Some(&key))
                .cloned()
                .collect(),
            _ => Vec::new(),
        };
        if !relation.is_many() {
            matches.truncate(1);
        }
        record.relations.insert(name.to_string(), matches);
    }
}
