//! Statement model and SQL rendering.
//!
//! A [`Statement`] describes one read: its source table (optionally
//! substituted and aliased), filters, grouping, ordering, and the relation
//! paths to eager-load. Rewriters mutate statements; the host renders them
//! with [`Statement::to_sql`] and hands the text to the executor.

mod expr;

pub use expr::{Arg, Expr, PreloadCondition, StatementModifier};

use std::collections::BTreeMap;

use crate::types::{RequestContext, Row, Value};

/// Rendered SQL text plus positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<Value>,
}

/// A table reference in a FROM clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub name: String,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }
}

/// A read statement against one table.
#[derive(Debug, Clone, Default)]
pub struct Statement {
    /// Live table the statement targets.
    pub table: String,
    /// Source override; when set it replaces `table` in the FROM clause.
    pub from: Option<TableRef>,
    pub selects: Vec<String>,
    pub wheres: Vec<Expr>,
    pub group_by: Vec<String>,
    pub order_by: Vec<String>,
    pub limit: Option<usize>,
    /// Relation paths (dot separated) to eager-load, with their conditions.
    pub preloads: BTreeMap<String, Vec<PreloadCondition>>,
    /// Raw read: no soft-delete guard, no historical rewrite.
    pub unscoped: bool,
    /// Skip the soft-delete guard but keep other scoping.
    pub with_deleted: bool,
    pub context: RequestContext,
}

impl Statement {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }

    /// Builder: add a raw filter.
    pub fn filter(mut self, sql: impl Into<String>, vars: Vec<Arg>) -> Self {
        self.wheres.push(Expr::sql(sql, vars));
        self
    }

    /// Builder: add a filter expression.
    pub fn where_expr(mut self, expr: Expr) -> Self {
        self.wheres.push(expr);
        self
    }

    /// Builder: set the projection.
    pub fn select(mut self, column: impl Into<String>) -> Self {
        self.selects.push(column.into());
        self
    }

    /// Builder: add a GROUP BY column.
    pub fn group(mut self, column: impl Into<String>) -> Self {
        self.group_by.push(column.into());
        self
    }

    /// Builder: add an ORDER BY term.
    pub fn order(mut self, term: impl Into<String>) -> Self {
        self.order_by.push(term.into());
        self
    }

    /// The table reference the statement reads from.
    pub fn source(&self) -> TableRef {
        self.from
            .clone()
            .unwrap_or_else(|| TableRef::new(self.table.clone()))
    }

    /// Whether the statement currently reads from `table`.
    pub fn reads_from(&self, table: &str) -> bool {
        self.source().name == table
    }

    /// Remove soft-delete guards by variant. Returns how many were removed.
    pub fn strip_soft_delete_guards(&mut self) -> usize {
        let before = self.wheres.len();
        self.wheres.retain(|e| !e.is_soft_delete_guard());
        before - self.wheres.len()
    }

    /// Render as a SELECT.
    pub fn to_sql(&self) -> SqlFragment {
        let mut sql = String::new();
        let mut params = Vec::new();
        self.render_select(&mut sql, &mut params);
        SqlFragment { sql, params }
    }

    pub(crate) fn render_select(&self, out: &mut String, params: &mut Vec<Value>) {
        out.push_str("SELECT ");
        if self.selects.is_empty() {
            out.push('*');
        } else {
            out.push_str(&self.selects.join(", "));
        }

        let source = self.source();
        out.push_str(" FROM ");
        out.push_str(&source.name);
        if let Some(alias) = &source.alias {
            out.push_str(" AS ");
            out.push_str(alias);
        }

        render_where(&self.wheres, out, params);

        if !self.group_by.is_empty() {
            out.push_str(" GROUP BY ");
            out.push_str(&self.group_by.join(","));
        }
        if !self.order_by.is_empty() {
            out.push_str(" ORDER BY ");
            out.push_str(&self.order_by.join(", "));
        }
        if let Some(limit) = self.limit {
            out.push_str(&format!(" LIMIT {}", limit));
        }
    }
}

fn render_where(wheres: &[Expr], out: &mut String, params: &mut Vec<Value>) {
    if wheres.is_empty() {
        return;
    }
    out.push_str(" WHERE ");
    let wrap = wheres.len() > 1;
    for (i, expr) in wheres.iter().enumerate() {
        if i > 0 {
            out.push_str(" AND ");
        }
        let raw = wrap && matches!(expr, Expr::Sql { .. });
        if raw {
            out.push('(');
        }
        expr.render(out, params);
        if raw {
            out.push(')');
        }
    }
}

/// `INSERT INTO table (..) VALUES (..)` for one row.
pub fn insert_sql(table: &str, row: &Row) -> SqlFragment {
    if row.is_empty() {
        return SqlFragment {
            sql: format!("INSERT INTO {} DEFAULT VALUES", table),
            params: Vec::new(),
        };
    }
    let columns: Vec<&str> = row.keys().map(String::as_str).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    SqlFragment {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            columns.join(", "),
            placeholders
        ),
        params: row.values().cloned().collect(),
    }
}

/// `UPDATE table SET .. WHERE ..`.
pub fn update_sql(table: &str, assignments: &Row, wheres: &[Expr]) -> SqlFragment {
    let mut sql = format!("UPDATE {} SET ", table);
    let mut params: Vec<Value> = Vec::with_capacity(assignments.len());
    for (i, (column, value)) in assignments.iter().enumerate() {
        if i > 0 {
            sql.push_str(", ");
        }
        sql.push_str(column);
        sql.push_str(" = ?");
        params.push(value.clone());
    }
    render_where(wheres, &mut sql, &mut params);
    SqlFragment { sql, params }
}

/// `DELETE FROM table WHERE ..`.
pub fn delete_sql(table: &str, wheres: &[Expr]) -> SqlFragment {
    let mut sql = format!("DELETE FROM {}", table);
    let mut params = Vec::new();
    render_where(wheres, &mut sql, &mut params);
    SqlFragment { sql, params }
}
