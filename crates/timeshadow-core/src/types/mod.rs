//! Core types for timeshadow.

mod context;
mod record;
mod value;

pub use context::RequestContext;
pub use record::Record;
pub use value::{Row, RowExt, Value, TIMESTAMP_FORMAT};
