//! Filter expressions and preload conditions.

use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;

use crate::statement::Statement;
use crate::types::Value;

/// A bound argument of a raw SQL expression.
#[derive(Debug, Clone)]
pub enum Arg {
    Value(Value),
    /// Rendered inline, wrapped in parentheses.
    Subquery(Box<Statement>),
}

impl From<Value> for Arg {
    fn from(v: Value) -> Self {
        Arg::Value(v)
    }
}

impl From<Statement> for Arg {
    fn from(stmt: Statement) -> Self {
        Arg::Subquery(Box::new(stmt))
    }
}

impl From<i64> for Arg {
    fn from(v: i64) -> Self {
        Arg::Value(Value::Integer(v))
    }
}

impl From<bool> for Arg {
    fn from(v: bool) -> Self {
        Arg::Value(Value::Bool(v))
    }
}

impl From<&str> for Arg {
    fn from(v: &str) -> Self {
        Arg::Value(Value::Text(v.to_string()))
    }
}

impl From<String> for Arg {
    fn from(v: String) -> Self {
        Arg::Value(Value::Text(v))
    }
}

impl From<DateTime<Utc>> for Arg {
    fn from(v: DateTime<Utc>) -> Self {
        Arg::Value(Value::Timestamp(v))
    }
}

/// One condition of a WHERE clause. Conditions are joined with AND.
#[derive(Debug, Clone)]
pub enum Expr {
    /// Raw SQL with `?` placeholders bound to `vars` in order.
    Sql { sql: String, vars: Vec<Arg> },
    /// `column IN (values)`.
    InValues { column: String, values: Vec<Value> },
    /// `column IN (subquery)`.
    InSubquery {
        column: String,
        subquery: Box<Statement>,
    },
    /// `column IS NULL`, added by the host for soft-deletable entities.
    /// Tagged so it can be removed structurally.
    SoftDeleteGuard { column: String },
}

impl Expr {
    pub fn sql(sql: impl Into<String>, vars: Vec<Arg>) -> Self {
        Expr::Sql {
            sql: sql.into(),
            vars,
        }
    }

    /// `column = value`.
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Expr::Sql {
            sql: format!("{} = ?", column),
            vars: vec![Arg::Value(value.into())],
        }
    }

    pub fn in_values(column: impl Into<String>, values: Vec<Value>) -> Self {
        Expr::InValues {
            column: column.into(),
            values,
        }
    }

    pub fn in_subquery(column: impl Into<String>, subquery: Statement) -> Self {
        Expr::InSubquery {
            column: column.into(),
            subquery: Box::new(subquery),
        }
    }

    pub fn is_soft_delete_guard(&self) -> bool {
        matches!(self, Expr::SoftDeleteGuard { .. })
    }

    /// Render into `out`, pushing bound parameters in placeholder order.
    pub(crate) fn render(&self, out: &mut String, params: &mut Vec<Value>) {
        match self {
            Expr::Sql { sql, vars } => {
                let mut vars = vars.iter();
                for ch in sql.chars() {
                    if ch != '?' {
                        out.push(ch);
                        continue;
                    }
                    match vars.next() {
                        Some(Arg::Value(v)) => {
                            out.push('?');
                            params.push(v.clone());
                        }
                        Some(Arg::Subquery(stmt)) => {
                            out.push('(');
                            stmt.render_select(out, params);
                            out.push(')');
                        }
                        None => out.push('?'),
                    }
                }
            }
            Expr::InValues { column, values } => {
                if values.is_empty() {
                    // IN () is not valid SQL; an empty set matches nothing.
                    out.push_str("1 = 0");
                    return;
                }
                out.push_str(column);
                out.push_str(" IN (");
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push('?');
                    params.push(v.clone());
                }
                out.push(')');
            }
            Expr::InSubquery { column, subquery } => {
                out.push_str(column);
                out.push_str(" IN (");
                subquery.render_select(out, params);
                out.push(')');
            }
            Expr::SoftDeleteGuard { column } => {
                out.push_str(column);
                out.push_str(" IS NULL");
            }
        }
    }
}

/// Function applied to the statement that loads a preloaded relation.
pub type StatementModifier = Arc<dyn Fn(&mut Statement) + Send + Sync>;

/// Condition attached to a preload path.
#[derive(Clone)]
pub enum PreloadCondition {
    /// Extra filter on the related rows.
    Filter(Expr),
    /// Arbitrary rewrite of the related statement.
    Modifier(StatementModifier),
    /// Point-in-time rewrite injected for a versioned relation. Kept apart
    /// from `Modifier` so it is never injected twice for the same path.
    AsOf(StatementModifier),
}

impl PreloadCondition {
    pub fn modifier<F>(f: F) -> Self
    where
        F: Fn(&mut Statement) + Send + Sync + 'static,
    {
        PreloadCondition::Modifier(Arc::new(f))
    }

    pub fn is_as_of(&self) -> bool {
        matches!(self, PreloadCondition::AsOf(_))
    }

    /// Apply this condition to the statement loading the relation.
    pub fn apply(&self, stmt: &mut Statement) {
        match self {
            PreloadCondition::Filter(expr) => stmt.wheres.push(expr.clone()),
            PreloadCondition::Modifier(f) | PreloadCondition::AsOf(f) => f(stmt),
        }
    }
}

impl fmt::Debug for PreloadCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PreloadCondition::Filter(expr) => f.debug_tuple("Filter").field(expr).finish(),
            PreloadCondition::Modifier(_) => f.write_str("Modifier(..)"),
            PreloadCondition::AsOf(_) => f.write_str("AsOf(..)"),
        }
    }
}
