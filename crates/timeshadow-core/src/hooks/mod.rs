//! Lifecycle hook facility.
//!
//! Each [`Operation`] has a [`Processor`]: an ordered chain of named handlers
//! run against a [`Scope`]. Handlers see the statement, the entity state and
//! the executor of the current unit of work, and report failures by adding an
//! error to the scope. Every handler runs; each one decides whether to act on
//! a scope that already carries an error.

mod callbacks;
mod scope;

pub use callbacks::{Callbacks, HookFn, Operation, Processor};
pub use scope::Scope;

use crate::error::ShadowResult;

/// Host handler names plugins position themselves against.
pub const HOST_BEGIN: &str = "host:begin_transaction";
pub const HOST_CREATE: &str = "host:create";
pub const HOST_UPDATE: &str = "host:update";
pub const HOST_DELETE: &str = "host:delete";
pub const HOST_QUERY: &str = "host:query";
pub const HOST_PRELOAD: &str = "host:preload";
pub const HOST_COMMIT: &str = "host:commit_or_rollback_transaction";

/// Something that attaches handlers to a [`Callbacks`] set.
pub trait Plugin {
    fn name(&self) -> &str;

    /// Register handlers. Must be safe to call more than once.
    fn initialize(&self, callbacks: &mut Callbacks) -> ShadowResult<()>;
}
