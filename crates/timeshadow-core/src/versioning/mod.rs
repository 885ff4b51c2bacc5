//! Entity versioning: append-only log tables and point-in-time reads.
//!
//! Every committed write to a versioned entity appends a full snapshot of the
//! row to the entity's log table. Reads carrying an as-of timestamp are
//! rewritten to select, per natural key, the latest snapshot at or before
//! that instant, so "what did this row look like last Tuesday?" is answered
//! by the same query that reads current state.

mod preload;
mod rewriter;
mod snapshot;
mod store;
mod writer;

pub use preload::RelationRewriter;
pub use rewriter::{apply_as_of, PointInTimeRewriter, RewriteOutcome, SkipReason};
pub use snapshot::{ShadowLayout, Snapshot};
pub use store::{SqlLogStore, VersionLogStore};
pub use writer::SnapshotWriter;
