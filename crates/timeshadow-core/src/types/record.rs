//! Loaded rows together with their preloaded relations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::Row;

/// A row returned by a read, with eagerly loaded related records keyed by
/// relation name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub row: Row,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relations: BTreeMap<String, Vec<Record>>,
}

impl Record {
    pub fn new(row: Row) -> Self {
        Self {
            row,
            relations: BTreeMap::new(),
        }
    }

    /// Related records loaded under `relation`; empty when nothing was loaded.
    pub fn related(&self, relation: &str) -> &[Record] {
        self.relations
            .get(relation)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
