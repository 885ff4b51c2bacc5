//! A minimal persistence session that runs every operation through
//! [`Callbacks`], so plugins can observe and adjust it.
//!
//! `Db` owns one executor. Writes open a transaction unless the caller is
//! already inside [`Db::transaction`]; reads render the statement the query
//! handlers leave behind.

mod host;
mod query;

pub use query::Query;

use std::cell::Cell;
use std::sync::Arc;

use crate::error::{ErrorCode, ShadowError, ShadowResult};
use crate::hooks::{Callbacks, Operation, Plugin, Scope};
use crate::schema::{Entity, EntitySchema, SchemaRegistry};
use crate::statement::{Expr, Statement};
use crate::traits::{Clock, Executor, SystemClock};
use crate::types::{Record, Row};

/// Session over one executor.
pub struct Db<E: Executor> {
    executor: E,
    schemas: SchemaRegistry,
    callbacks: Callbacks,
    in_transaction: Cell<bool>,
}

impl<E: Executor> Db<E> {
    pub fn new(executor: E) -> Self {
        Self::with_clock(executor, Arc::new(SystemClock))
    }

    /// Session whose soft-delete markers come from `clock`.
    pub fn with_clock(executor: E, clock: Arc<dyn Clock>) -> Self {
        let mut callbacks = Callbacks::new();
        host::register(&mut callbacks, clock);
        Self {
            executor,
            schemas: SchemaRegistry::new(),
            callbacks,
            in_transaction: Cell::new(false),
        }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn schemas(&self) -> &SchemaRegistry {
        &self.schemas
    }

    pub fn callbacks(&self) -> &Callbacks {
        &self.callbacks
    }

    /// Register an entity type.
    pub fn register<T: Entity>(&mut self) -> ShadowResult<Arc<EntitySchema>> {
        self.schemas.register::<T>()
    }

    /// Install a plugin's handlers.
    pub fn use_plugin(&mut self, plugin: &dyn Plugin) -> ShadowResult<()> {
        tracing::info!(plugin = plugin.name(), "Installing plugin");
        plugin.initialize(&mut self.callbacks)
    }

    /// Insert `entity`. Generated keys are written back into it.
    pub fn create<T: Entity>(&self, entity: &mut T) -> ShadowResult<()> {
        let schema = self.schemas.resolve(T::NAME)?;
        let stmt = Statement::new(schema.table.clone());
        let mut scope = self
            .scope(Operation::Create, schema, stmt)
            .with_model(entity.to_row());
        self.run(&mut scope)?;

        if let Some(model) = &scope.model {
            *entity = T::from_row(model)?;
        }
        Ok(())
    }

    /// Write every column of `entity`, matched by primary key. Returns the
    /// number of rows updated.
    pub fn save<T: Entity>(&self, entity: &T) -> ShadowResult<usize> {
        let schema = self.schemas.resolve(T::NAME)?;
        let model = entity.to_row();
        let stmt = keyed_statement(&schema, &model)?;
        let mut scope = self
            .scope(Operation::Update, schema, stmt)
            .with_model(model);
        self.run(&mut scope)?;
        Ok(scope.rows_affected)
    }

    /// Write only `assignments` to the row of `entity`.
    pub fn update_columns<T: Entity>(&self, entity: &T, assignments: Row) -> ShadowResult<usize> {
        if assignments.is_empty() {
            return Err(ShadowError::validation("no columns to update"));
        }
        let schema = self.schemas.resolve(T::NAME)?;
        let row = entity.to_row();
        let stmt = keyed_statement(&schema, &row)?;

        let mut model: Row = schema
            .primary_columns()
            .into_iter()
            .filter_map(|column| row.get(column).map(|v| (column.to_string(), v.clone())))
            .collect();
        model.extend(assignments.clone());

        let mut scope = self
            .scope(Operation::Update, schema, stmt)
            .with_model(model);
        scope.assignments = assignments;
        self.run(&mut scope)?;
        Ok(scope.rows_affected)
    }

    /// Delete the row of `entity`. Soft-deletable entities are marked, not
    /// removed.
    pub fn delete<T: Entity>(&self, entity: &T) -> ShadowResult<usize> {
        let schema = self.schemas.resolve(T::NAME)?;
        let stmt = keyed_statement(&schema, &entity.to_row())?;
        let mut scope = self.scope(Operation::Delete, schema, stmt);
        self.run(&mut scope)?;
        Ok(scope.rows_affected)
    }

    /// Delete every row matched by `query`. An unscoped query removes rows
    /// even for soft-deletable entities.
    pub fn delete_where<T: Entity>(&self, query: Query) -> ShadowResult<usize> {
        let schema = self.schemas.resolve(T::NAME)?;
        let stmt = query.into_statement(&schema);
        let mut scope = self.scope(Operation::Delete, schema, stmt);
        self.run(&mut scope)?;
        Ok(scope.rows_affected)
    }

    pub fn find<T: Entity>(&self, query: Query) -> ShadowResult<Vec<T>> {
        self.find_records(T::NAME, query)?
            .iter()
            .map(T::from_record)
            .collect()
    }

    pub fn first<T: Entity>(&self, query: Query) -> ShadowResult<Option<T>> {
        Ok(self.find(query.limit(1))?.into_iter().next())
    }

    /// Read rows of the entity registered as `entity`, with their preloads.
    pub fn find_records(&self, entity: &str, query: Query) -> ShadowResult<Vec<Record>> {
        let schema = self.schemas.resolve(entity)?;
        let stmt = query.into_statement(&schema);
        let mut scope = self.scope(Operation::Query, schema, stmt);
        self.run(&mut scope)?;
        Ok(scope.records)
    }

    /// Run `f` as one unit of work. Writes inside it join the transaction;
    /// an error from `f` rolls everything back. Nested calls join the
    /// outer transaction.
    pub fn transaction<R>(&self, f: impl FnOnce(&Self) -> ShadowResult<R>) -> ShadowResult<R> {
        if self.in_transaction.get() {
            return f(self);
        }

        self.executor.begin()?;
        self.in_transaction.set(true);
        let result = f(self);
        self.in_transaction.set(false);

        match result {
            Ok(value) => match self.executor.commit() {
                Ok(()) => Ok(value),
                Err(e) => {
                    self.rollback_quietly();
                    Err(e)
                }
            },
            Err(e) => {
                self.rollback_quietly();
                Err(e)
            }
        }
    }

    fn rollback_quietly(&self) {
        if let Err(e) = self.executor.rollback() {
            tracing::error!("Rollback failed: {}", e);
        }
    }

    fn scope(
        &self,
        operation: Operation,
        schema: Arc<EntitySchema>,
        statement: Statement,
    ) -> Scope<'_> {
        let mut scope = Scope::new(
            operation,
            &self.executor,
            &self.schemas,
            Some(schema),
            statement,
        )
        .with_callbacks(&self.callbacks);
        scope.in_transaction = self.in_transaction.get();
        scope
    }

    fn run(&self, scope: &mut Scope<'_>) -> ShadowResult<()> {
        self.callbacks
            .processor(scope.operation)
            .execute(scope);
        match scope.take_error() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Statement narrowed to the row identified by the key columns of `row`.
fn keyed_statement(schema: &EntitySchema, row: &Row) -> ShadowResult<Statement> {
    let mut stmt = Statement::new(schema.table.clone());
    for column in schema.primary_columns() {
        let value = row
            .get(column)
            .filter(|v| !v.is_null())
            .cloned()
            .ok_or_else(|| ShadowError::Validation {
                message: format!("'{}' key column '{}' is not set", schema.name, column),
                code: ErrorCode::ValMissingWhereClause,
                suggestion: Some("Load or create the entity before writing it".to_string()),
            })?;
        stmt.wheres.push(Expr::eq(column, value));
    }
    if let Some(column) = &schema.soft_delete_column {
        stmt.wheres.push(Expr::SoftDeleteGuard {
            column: column.clone(),
        });
    }
    Ok(stmt)
}
