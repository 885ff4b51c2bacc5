//! Entity descriptors and the trait record types implement to be persisted.

use std::collections::BTreeMap;

use crate::error::{ShadowError, ShadowResult};
use crate::schema::{validate_identifier, Relation};
use crate::types::{Record, Row};

/// One persisted field of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    /// Field name on the record type.
    pub name: String,
    /// Column name in the live table (and in the log table).
    pub column: String,
    pub primary_key: bool,
    pub auto_increment: bool,
    /// Non-versioned fields are left out of snapshots.
    pub versioned: bool,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
            primary_key: false,
            auto_increment: false,
            versioned: true,
        }
    }

    /// Field whose column name equals its field name.
    pub fn column(name: impl Into<String>) -> Self {
        let name = name.into();
        Self::new(name.clone(), name)
    }

    /// Builder: mark as (part of) the natural key.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Builder: key is generated by the database on insert.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Builder: exclude from snapshots.
    pub fn non_versioned(mut self) -> Self {
        self.versioned = false;
        self
    }
}

/// Runtime description of one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    /// Stable entity name, used to resolve relation targets.
    pub name: String,
    /// Live table name.
    pub table: String,
    pub fields: Vec<FieldSchema>,
    pub relations: BTreeMap<String, Relation>,
    /// Log table name; `Some` only for versioned entities.
    pub shadow_table: Option<String>,
    /// Column set when the row is soft-deleted.
    pub soft_delete_column: Option<String>,
}

impl EntitySchema {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            fields: Vec::new(),
            relations: BTreeMap::new(),
            shadow_table: None,
            soft_delete_column: None,
        }
    }

    /// Builder: add a field.
    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Builder: add a relation.
    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.insert(relation.name.clone(), relation);
        self
    }

    /// Builder: version this entity into `table`.
    pub fn with_shadow_table(mut self, table: impl Into<String>) -> Self {
        self.shadow_table = Some(table.into());
        self
    }

    /// Builder: deletes set `column` instead of removing the row.
    pub fn soft_delete(mut self, column: impl Into<String>) -> Self {
        self.soft_delete_column = Some(column.into());
        self
    }

    pub fn is_versioned(&self) -> bool {
        self.shadow_table.is_some()
    }

    /// Natural key columns, in declaration order.
    pub fn primary_columns(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.primary_key)
            .map(|f| f.column.as_str())
            .collect()
    }

    /// Columns copied into every snapshot.
    pub fn versioned_columns(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.versioned && !f.column.is_empty())
            .map(|f| f.column.as_str())
            .collect()
    }

    pub fn auto_increment_column(&self) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.primary_key && f.auto_increment)
            .map(|f| f.column.as_str())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.column.as_str())
    }

    /// Check names and keys before the schema is used to build SQL.
    pub fn validate(&self) -> ShadowResult<()> {
        validate_identifier(&self.table)?;
        for field in &self.fields {
            validate_identifier(&field.column)?;
        }
        if let Some(shadow) = &self.shadow_table {
            validate_identifier(shadow)?;
            if shadow == &self.table {
                return Err(ShadowError::validation(format!(
                    "entity '{}' cannot use its live table as its log table",
                    self.name
                )));
            }
        }
        if let Some(column) = &self.soft_delete_column {
            if !self.columns().any(|c| c == column) {
                return Err(ShadowError::validation(format!(
                    "soft delete column '{}' is not a field of '{}'",
                    column, self.name
                )));
            }
        }
        if self.primary_columns().is_empty() {
            return Err(ShadowError::validation(format!(
                "entity '{}' declares no primary key",
                self.name
            )));
        }
        for relation in self.relations.values() {
            validate_identifier(&relation.foreign_key)?;
            validate_identifier(&relation.references)?;
        }
        Ok(())
    }
}

/// A record type that can be persisted through the host session.
///
/// Field extraction is explicit: `to_row` and `from_row` are written (or
/// generated) per type, and `schema` declares the same columns.
pub trait Entity: Sized {
    /// Name the schema is registered under.
    const NAME: &'static str;

    fn schema() -> EntitySchema;

    fn to_row(&self) -> Row;

    fn from_row(row: &Row) -> ShadowResult<Self>;

    /// Build from a row plus its preloaded relations.
    fn from_record(record: &Record) -> ShadowResult<Self> {
        Self::from_row(&record.row)
    }

    /// Log table for versioned entities. Types that do not override this are
    /// never snapshotted or rewritten.
    fn shadow_table() -> Option<&'static str> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Relation;

    fn users() -> EntitySchema {
        EntitySchema::new("User", "users")
            .field(FieldSchema::column("id").primary_key().auto_increment())
            .field(FieldSchema::column("name"))
            .field(FieldSchema::column("login_count").non_versioned())
            .field(FieldSchema::column("deleted_at"))
            .soft_delete("deleted_at")
            .with_shadow_table("shadow_users")
    }

    #[test]
    fn test_column_sets() {
        let schema = users();
        assert_eq!(schema.primary_columns(), vec!["id"]);
        assert_eq!(schema.versioned_columns(), vec!["id", "name", "deleted_at"]);
        assert_eq!(schema.auto_increment_column(), Some("id"));
        assert!(schema.is_versioned());
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_key() {
        let schema = EntitySchema::new("Tag", "tags").field(FieldSchema::column("label"));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_self_shadow() {
        let schema = users().with_shadow_table("users");
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_soft_delete_column() {
        let schema = users().soft_delete("removed_at");
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_validate_checks_relation_columns() {
        let schema = users().relation(Relation::has_many("Posts", "Post", "user id", "id"));
        assert!(schema.validate().is_err());
    }
}
