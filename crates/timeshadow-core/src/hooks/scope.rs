//! State shared by the handlers of one operation.

use std::sync::Arc;

use crate::error::ShadowError;
use crate::hooks::{Callbacks, Operation};
use crate::schema::{EntitySchema, SchemaRegistry};
use crate::statement::Statement;
use crate::traits::Executor;
use crate::types::{Record, Row};

/// One run of a handler chain.
pub struct Scope<'a> {
    pub operation: Operation,
    /// Executor of the current unit of work.
    pub executor: &'a dyn Executor,
    pub schemas: &'a SchemaRegistry,
    /// Schema of the entity the operation targets, if it has one.
    pub schema: Option<Arc<EntitySchema>>,
    pub statement: Statement,
    /// Entity state of a write. After the host's write handler ran it holds
    /// the row as written, including generated keys.
    pub model: Option<Row>,
    /// Column assignments of an update or soft delete.
    pub assignments: Row,
    /// Live rows a soft delete is about to mark, read before the marker is
    /// set.
    pub captured: Vec<Row>,
    /// Records produced by a read.
    pub records: Vec<Record>,
    pub rows_affected: usize,
    /// Whether the caller already runs inside a transaction.
    pub in_transaction: bool,
    /// Set when this scope opened the transaction and must close it.
    pub owns_transaction: bool,
    /// Handler set the scope runs under. Nested reads (preloads) go back
    /// through it.
    pub callbacks: Option<&'a Callbacks>,
    error: Option<ShadowError>,
}

impl<'a> Scope<'a> {
    pub fn new(
        operation: Operation,
        executor: &'a dyn Executor,
        schemas: &'a SchemaRegistry,
        schema: Option<Arc<EntitySchema>>,
        statement: Statement,
    ) -> Self {
        Self {
            operation,
            executor,
            schemas,
            schema,
            statement,
            model: None,
            assignments: Row::new(),
            captured: Vec::new(),
            records: Vec::new(),
            rows_affected: 0,
            in_transaction: false,
            owns_transaction: false,
            callbacks: None,
            error: None,
        }
    }

    /// Builder: set the entity state.
    pub fn with_model(mut self, model: Row) -> Self {
        self.model = Some(model);
        self
    }

    /// Builder: run nested reads under `callbacks`.
    pub fn with_callbacks(mut self, callbacks: &'a Callbacks) -> Self {
        self.callbacks = Some(callbacks);
        self
    }

    pub fn error(&self) -> Option<&ShadowError> {
        self.error.as_ref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Record a failure. The first error wins; later ones are only logged.
    pub fn add_error(&mut self, err: ShadowError) {
        if let Some(first) = &self.error {
            tracing::warn!(
                operation = %self.operation,
                "Additional error after '{}': {}",
                first,
                err
            );
            return;
        }
        self.error = Some(err);
    }

    pub fn take_error(&mut self) -> Option<ShadowError> {
        self.error.take()
    }
}
