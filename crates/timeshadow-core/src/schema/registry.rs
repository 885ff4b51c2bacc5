//! Name-keyed lookup of entity schemas.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ShadowError, ShadowResult};
use crate::schema::{Entity, EntitySchema, Relation};

/// Registered schemas. Relations name their targets, so cyclic relation
/// graphs resolve lazily through this registry.
#[derive(Debug, Default, Clone)]
pub struct SchemaRegistry {
    schemas: HashMap<String, Arc<EntitySchema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an entity type, merging in its versioning capability.
    pub fn register<T: Entity>(&mut self) -> ShadowResult<Arc<EntitySchema>> {
        let mut schema = T::schema();
        if schema.name != T::NAME {
            return Err(ShadowError::validation(format!(
                "schema name '{}' does not match entity name '{}'",
                schema.name,
                T::NAME
            )));
        }
        if let Some(table) = T::shadow_table() {
            schema.shadow_table = Some(table.to_string());
        }
        self.insert(schema)
    }

    /// Register a hand-built schema. Re-registering a name replaces it.
    pub fn insert(&mut self, schema: EntitySchema) -> ShadowResult<Arc<EntitySchema>> {
        schema.validate()?;
        let schema = Arc::new(schema);
        if self
            .schemas
            .insert(schema.name.clone(), Arc::clone(&schema))
            .is_some()
        {
            tracing::debug!("Replaced schema for entity '{}'", schema.name);
        }
        Ok(schema)
    }

    pub fn get(&self, name: &str) -> Option<Arc<EntitySchema>> {
        self.schemas.get(name).cloned()
    }

    pub fn resolve(&self, name: &str) -> ShadowResult<Arc<EntitySchema>> {
        self.get(name)
            .ok_or_else(|| ShadowError::unknown_entity(name))
    }

    /// Resolve one relation hop from `owner`.
    pub fn resolve_relation<'a>(
        &self,
        owner: &'a EntitySchema,
        relation: &str,
    ) -> ShadowResult<(&'a Relation, Arc<EntitySchema>)> {
        let rel = owner
            .relations
            .get(relation)
            .ok_or_else(|| ShadowError::unknown_relation(&owner.name, relation))?;
        let target = self.resolve(&rel.target)?;
        Ok((rel, target))
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::schema::FieldSchema;

    fn user() -> EntitySchema {
        EntitySchema::new("User", "users")
            .field(FieldSchema::column("id").primary_key())
            .field(FieldSchema::column("manager_id"))
            .relation(Relation::belongs_to("Manager", "User", "manager_id", "id"))
    }

    #[test]
    fn test_self_referencing_relation_resolves() {
        let mut registry = SchemaRegistry::new();
        let schema = registry.insert(user()).unwrap();

        let (rel, target) = registry.resolve_relation(&schema, "Manager").unwrap();
        assert_eq!(rel.owner_column(), "manager_id");
        assert_eq!(target.name, "User");
    }

    #[test]
    fn test_unknown_relation_and_entity() {
        let mut registry = SchemaRegistry::new();
        let schema = registry
            .insert(user().relation(Relation::has_many("Posts", "Post", "user_id", "id")))
            .unwrap();

        let err = registry.resolve_relation(&schema, "Teams").unwrap_err();
        assert_eq!(err.code(), ErrorCode::SchUnknownRelation);

        let err = registry.resolve_relation(&schema, "Posts").unwrap_err();
        assert_eq!(err.code(), ErrorCode::SchUnknownEntity);
    }

    #[test]
    fn test_invalid_schema_is_not_registered() {
        let mut registry = SchemaRegistry::new();
        assert!(registry
            .insert(EntitySchema::new("Bad", "bad table"))
            .is_err());
        assert!(registry.is_empty());
    }
}
