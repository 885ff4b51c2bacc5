//! Named, ordered handler chains per operation.

use std::fmt;
use std::sync::Arc;

use strum::Display;

use crate::error::{ShadowError, ShadowResult};
use crate::hooks::Scope;

/// Lifecycle operation a handler chain belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    Create,
    Update,
    Delete,
    Query,
}

/// A hook handler.
pub type HookFn = Arc<dyn Fn(&mut Scope<'_>) + Send + Sync>;

struct Handler {
    name: String,
    func: HookFn,
}

/// Ordered handler chain for one operation.
pub struct Processor {
    operation: Operation,
    handlers: Vec<Handler>,
}

impl Processor {
    fn new(operation: Operation) -> Self {
        Self {
            operation,
            handlers: Vec::new(),
        }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn get(&self, name: &str) -> Option<&HookFn> {
        self.handlers
            .iter()
            .find(|h| h.name == name)
            .map(|h| &h.func)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Handler names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.name.as_str()).collect()
    }

    /// Append a handler. Returns `false` (and changes nothing) when the name
    /// is already registered.
    pub fn register<F>(&mut self, name: &str, func: F) -> bool
    where
        F: Fn(&mut Scope<'_>) + Send + Sync + 'static,
    {
        if self.contains(name) {
            tracing::debug!("{} hook '{}' already registered", self.operation, name);
            return false;
        }
        self.handlers.push(Handler {
            name: name.to_string(),
            func: Arc::new(func),
        });
        true
    }

    /// Insert a handler directly before `anchor`. Returns `false` when the
    /// name is already registered; fails if `anchor` is unknown.
    pub fn register_before<F>(&mut self, anchor: &str, name: &str, func: F) -> ShadowResult<bool>
    where
        F: Fn(&mut Scope<'_>) + Send + Sync + 'static,
    {
        if self.contains(name) {
            tracing::debug!("{} hook '{}' already registered", self.operation, name);
            return Ok(false);
        }
        let position = self
            .handlers
            .iter()
            .position(|h| h.name == anchor)
            .ok_or_else(|| {
                ShadowError::Hook(format!(
                    "cannot register '{}' before unknown {} hook '{}'",
                    name, self.operation, anchor
                ))
            })?;
        self.handlers.insert(
            position,
            Handler {
                name: name.to_string(),
                func: Arc::new(func),
            },
        );
        Ok(true)
    }

    /// Run every handler in order.
    pub fn execute(&self, scope: &mut Scope<'_>) {
        for handler in &self.handlers {
            (handler.func)(scope);
        }
    }
}

impl fmt::Debug for Processor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("operation", &self.operation)
            .field("handlers", &self.names())
            .finish()
    }
}

/// Handler chains for every operation.
#[derive(Debug)]
pub struct Callbacks {
    create: Processor,
    update: Processor,
    delete: Processor,
    query: Processor,
}

impl Callbacks {
    pub fn new() -> Self {
        Self {
            create: Processor::new(Operation::Create),
            update: Processor::new(Operation::Update),
            delete: Processor::new(Operation::Delete),
            query: Processor::new(Operation::Query),
        }
    }

    pub fn processor(&self, operation: Operation) -> &Processor {
        match operation {
            Operation::Create => &self.create,
            Operation::Update => &self.update,
            Operation::Delete => &self.delete,
            Operation::Query => &self.query,
        }
    }

    pub fn create(&mut self) -> &mut Processor {
        &mut self.create
    }

    pub fn update(&mut self) -> &mut Processor {
        &mut self.update
    }

    pub fn delete(&mut self) -> &mut Processor {
        &mut self.delete
    }

    pub fn query(&mut self) -> &mut Processor {
        &mut self.query
    }
}

impl Default for Callbacks {
    fn default() -> Self {
        Self::new()
    }
}
