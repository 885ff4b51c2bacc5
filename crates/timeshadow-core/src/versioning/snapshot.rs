//! Snapshot rows and log table layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ShadowConfig;
use crate::error::{ShadowError, ShadowResult};
use crate::schema::EntitySchema;
use crate::types::{Row, RowExt};

/// One appended entry of a log table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Position in the log. Strictly increasing across the whole table.
    pub seq: i64,
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
    /// Versioned column values as of this entry.
    pub values: Row,
}

impl Snapshot {
    /// Split a raw log table row into bookkeeping and entity columns.
    pub fn from_row(mut row: Row, config: &ShadowConfig) -> ShadowResult<Self> {
        let seq = row.get_i64(&config.seq_column)?;
        let timestamp = row
            .get_opt_timestamp(&config.timestamp_column)?
            .ok_or_else(|| {
                ShadowError::parse(format!(
                    "snapshot {} has no '{}'",
                    seq, config.timestamp_column
                ))
            })?;
        row.remove(&config.seq_column);
        row.remove(&config.timestamp_column);
        Ok(Self {
            seq,
            timestamp,
            values: row,
        })
    }
}

/// Column layout of an entity's log table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowLayout {
    pub table: String,
    pub seq_column: String,
    pub timestamp_column: String,
    /// Versioned entity columns, named as in the live table.
    pub columns: Vec<String>,
}

impl ShadowLayout {
    /// Layout for `schema`, or `None` when the entity is not versioned.
    pub fn for_schema(schema: &EntitySchema, config: &ShadowConfig) -> Option<Self> {
        let table = schema.shadow_table.clone()?;
        Some(Self {
            table,
            seq_column: config.seq_column.clone(),
            timestamp_column: config.timestamp_column.clone(),
            columns: schema
                .versioned_columns()
                .into_iter()
                .map(str::to_string)
                .collect(),
        })
    }

    /// Every column of the log table, bookkeeping first.
    pub fn all_columns(&self) -> Vec<&str> {
        let mut all = vec![self.seq_column.as_str(), self.timestamp_column.as_str()];
        all.extend(self.columns.iter().map(String::as_str));
        all
    }

    /// Project `row` onto the versioned columns. Missing columns are
    /// reported rather than filled in.
    pub fn project(&self, row: &Row) -> Result<Row, Vec<String>> {
        let mut snapshot = Row::new();
        let mut missing = Vec::new();
        for column in &self.columns {
            match row.get(column) {
                Some(value) => {
                    snapshot.insert(column.clone(), value.clone());
                }
                None => missing.push(column.clone()),
            }
        }
        if missing.is_empty() {
            Ok(snapshot)
        } else {
            Err(missing)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSchema;
    use crate::types::Value;

    fn schema() -> EntitySchema {
        EntitySchema::new("User", "users")
            .field(FieldSchema::column("id").primary_key().auto_increment())
            .field(FieldSchema::column("name"))
            .field(FieldSchema::column("login_count").non_versioned())
            .with_shadow_table("shadow_users")
    }

    #[test]
    fn test_layout_skips_non_versioned_fields() {
        let layout = ShadowLayout::for_schema(&schema(), &ShadowConfig::default()).unwrap();
        assert_eq!(
            layout.all_columns(),
            vec!["shadow_seq", "shadow_timestamp", "id", "name"]
        );
    }

    #[test]
    fn test_unversioned_schema_has_no_layout() {
        let plain = EntitySchema::new("Tag", "tags").field(FieldSchema::column("id").primary_key());
        assert!(ShadowLayout::for_schema(&plain, &ShadowConfig::default()).is_none());
    }

    #[test]
    fn test_project_reports_missing_columns() {
        let layout = ShadowLayout::for_schema(&schema(), &ShadowConfig::default()).unwrap();

        let mut row = Row::new();
        row.insert("id".into(), Value::from(1i64));
        row.insert("login_count".into(), Value::from(9i64));
        assert_eq!(layout.project(&row).unwrap_err(), vec!["name".to_string()]);

        row.insert("name".into(), Value::from("John"));
        let snapshot = layout.project(&row).unwrap();
        assert_eq!(snapshot.len(), 2);
        assert!(!snapshot.contains_key("login_count"));
    }

    #[test]
    fn test_snapshot_from_row() {
        let mut row = Row::new();
        row.insert("shadow_seq".into(), Value::from(4i64));
        row.insert(
            "shadow_timestamp".into(),
            Value::from("2024-05-01T10:00:00.000000Z"),
        );
        row.insert("name".into(), Value::from("Jane"));

        let snapshot = Snapshot::from_row(row, &ShadowConfig::default()).unwrap();
        assert_eq!(snapshot.seq, 4);
        assert_eq!(snapshot.values.len(), 1);
        assert_eq!(snapshot.values["name"], Value::from("Jane"));
    }
}
