//! Schema descriptors: which columns an entity has, which of them form its
//! natural key, which are versioned, and how it relates to other entities.

mod entity;
mod registry;
mod relation;

pub use entity::{Entity, EntitySchema, FieldSchema};
pub use registry::SchemaRegistry;
pub use relation::{Relation, RelationKind};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ErrorCode, ShadowError, ShadowResult};

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid")
});

/// Table and column names are spliced into SQL text, so only plain
/// identifiers are accepted.
pub fn validate_identifier(name: &str) -> ShadowResult<()> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(ShadowError::Schema {
            message: format!("'{}' is not a valid SQL identifier", name),
            code: ErrorCode::SchInvalidIdentifier,
        })
    }
}
