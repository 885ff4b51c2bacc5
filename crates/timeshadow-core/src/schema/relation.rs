//! Relations between entities, used to eager-load related rows.

use serde::{Deserialize, Serialize};

/// Cardinality and key placement of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    /// Target rows carry the foreign key; at most one is attached.
    HasOne,
    /// Target rows carry the foreign key.
    HasMany,
    /// The owner carries the foreign key.
    BelongsTo,
}

/// A named hop from an owner entity to a target entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub name: String,
    pub kind: RelationKind,
    /// Registered name of the target entity.
    pub target: String,
    /// Column holding the reference. Lives on the target for `HasOne` and
    /// `HasMany`, on the owner for `BelongsTo`.
    pub foreign_key: String,
    /// Column the foreign key points at.
    pub references: String,
}

impl Relation {
    pub fn has_one(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
        references: impl Into<String>,
    ) -> Self {
        Self::build(RelationKind::HasOne, name, target, foreign_key, references)
    }

    pub fn has_many(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
        references: impl Into<String>,
    ) -> Self {
        Self::build(RelationKind::HasMany, name, target, foreign_key, references)
    }

    pub fn belongs_to(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
        references: impl Into<String>,
    ) -> Self {
        Self::build(RelationKind::BelongsTo, name, target, foreign_key, references)
    }

    fn build(
        kind: RelationKind,
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
        references: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            target: target.into(),
            foreign_key: foreign_key.into(),
            references: references.into(),
        }
    }

    /// Join column on the owner side.
    pub fn owner_column(&self) -> &str {
        match self.kind {
            RelationKind::BelongsTo => &self.foreign_key,
            RelationKind::HasOne | RelationKind::HasMany => &self.references,
        }
    }

    /// Join column on the target side.
    pub fn target_column(&self) -> &str {
        match self.kind {
            RelationKind::BelongsTo => &self.references,
            RelationKind::HasOne | RelationKind::HasMany => &self.foreign_key,
        }
    }

    pub fn is_many(&self) -> bool {
        self.kind == RelationKind::HasMany
    }
}
