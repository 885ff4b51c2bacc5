//! Time providers: which point in time a read should reconstruct.

use chrono::{DateTime, Utc};
use std::sync::{PoisonError, RwLock};

use crate::error::ShadowResult;
use crate::types::RequestContext;

/// Provides the as-of timestamp for a request. `Ok(None)` and `Err(_)` both
/// mean "read current state".
pub trait TimeMachine: Send + Sync {
    fn get_time(&self, ctx: &RequestContext) -> ShadowResult<Option<DateTime<Utc>>>;
}

/// Reads the timestamp carried by the request context.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContextTimeMachine;

impl TimeMachine for ContextTimeMachine {
    fn get_time(&self, ctx: &RequestContext) -> ShadowResult<Option<DateTime<Utc>>> {
        Ok(ctx.as_of)
    }
}

/// One process-wide timestamp, switched explicitly.
#[derive(Debug, Default)]
pub struct FixedTimeMachine {
    time: RwLock<Option<DateTime<Utc>>>,
}

impl FixedTimeMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(time: DateTime<Utc>) -> Self {
        Self {
            time: RwLock::new(Some(time)),
        }
    }

    pub fn set(&self, time: DateTime<Utc>) {
        *self.time.write().unwrap_or_else(PoisonError::into_inner) = Some(time);
    }

    /// Go back to current-state reads.
    pub fn clear(&self) {
        *self.time.write().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl TimeMachine for FixedTimeMachine {
    fn get_time(&self, _ctx: &RequestContext) -> ShadowResult<Option<DateTime<Utc>>> {
        Ok(*self.time.read().unwrap_or_else(PoisonError::into_inner))
    }
}
