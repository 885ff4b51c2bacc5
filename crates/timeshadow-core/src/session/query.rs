//! Read options for [`Db`](crate::session::Db) lookups.

use chrono::{DateTime, Utc};

use crate::schema::EntitySchema;
use crate::statement::{Arg, Expr, PreloadCondition, Statement};
use crate::types::{RequestContext, Value};

/// Filters, ordering and eager-loading of one read (or filtered delete).
#[derive(Debug, Clone, Default)]
pub struct Query {
    wheres: Vec<Expr>,
    order_by: Vec<String>,
    limit: Option<usize>,
    preloads: Vec<(String, Vec<PreloadCondition>)>,
    unscoped: bool,
    with_deleted: bool,
    context: RequestContext,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw filter with `?` placeholders.
    pub fn filter(mut self, sql: impl Into<String>, vars: Vec<Arg>) -> Self {
        self.wheres.push(Expr::sql(sql, vars));
        self
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.wheres.push(Expr::eq(column, value));
        self
    }

    pub fn order(mut self, term: impl Into<String>) -> Self {
        self.order_by.push(term.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Eager-load a relation path such as `"Posts"` or `"Posts.Comments"`.
    pub fn preload(self, path: impl Into<String>) -> Self {
        self.preload_with(path, Vec::new())
    }

    /// Eager-load a relation path with extra conditions on the related rows.
    pub fn preload_with(mut self, path: impl Into<String>, conditions: Vec<PreloadCondition>) -> Self {
        let path = path.into();
        match self.preloads.iter_mut().find(|(p, _)| *p == path) {
            Some((_, existing)) => existing.extend(conditions),
            None => self.preloads.push((path, conditions)),
        }
        self
    }

    /// Raw read: no soft-delete guard and no point-in-time rewrite.
    pub fn unscoped(mut self) -> Self {
        self.unscoped = true;
        self
    }

    /// Include soft-deleted rows. Point-in-time rewriting still applies.
    pub fn with_deleted(mut self) -> Self {
        self.with_deleted = true;
        self
    }

    pub fn context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }

    /// Read state as of `timestamp` (through a context-reading time provider).
    pub fn as_of(mut self, timestamp: DateTime<Utc>) -> Self {
        self.context.as_of = Some(timestamp);
        self
    }

    pub(crate) fn into_statement(self, schema: &EntitySchema) -> Statement {
        let mut stmt = Statement::new(schema.table.clone());
        stmt.wheres = self.wheres;
        stmt.order_by = self.order_by;
        stmt.limit = self.limit;
        stmt.preloads = self.preloads.into_iter().collect();
        stmt.unscoped = self.unscoped;
        stmt.with_deleted = self.with_deleted;
        stmt.context = self.context;
        if let Some(column) = &schema.soft_delete_column {
            if !stmt.unscoped && !stmt.with_deleted {
                stmt.wheres.push(Expr::SoftDeleteGuard {
                    column: column.clone(),
                });
            }
        }
        stmt
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldSchema;

    fn schema() -> EntitySchema {
        EntitySchema::new("User", "users")
            .field(FieldSchema::column("id").primary_key())
            .field(FieldSchema::column("deleted_at"))
            .soft_delete("deleted_at")
    }

    #[test]
    fn test_guard_added_for_soft_delete_entities() {
        let stmt = Query::new().eq("id", 1i64).into_statement(&schema());
        assert_eq!(
            stmt.to_sql().sql,
            "SELECT * FROM users WHERE (id = ?) AND deleted_at IS NULL"
        );

        let stmt = Query::new().with_deleted().into_statement(&schema());
        assert!(stmt.wheres.is_empty());
        assert!(stmt.with_deleted);

        let stmt = Query::new().unscoped().into_statement(&schema());
        assert!(stmt.wheres.is_empty());
    }

    #[test]
    fn test_repeated_preload_paths_merge() {
        let stmt = Query::new()
            .preload("Posts")
            .preload_with(
                "Posts",
                vec![PreloadCondition::Filter(Expr::eq("published", true))],
            )
            .preload("Posts.Comments")
            .order("id")
            .limit(3)
            .into_statement(&schema());
        assert_eq!(stmt.preloads.len(), 2);
        assert_eq!(stmt.preloads["Posts"].len(), 1);
        assert_eq!(stmt.limit, Some(3));
    }
}
