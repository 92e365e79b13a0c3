//! # SQL Generation
//!
//! Renders a `QueryPlan` as one parameterized SELECT statement. Filter
//! values are returned as bound parameters and never appear in the text.
//! On PostgreSQL, placeholders compared with `uuid`, temporal or `jsonb`
//! columns carry a cast so text-bound values still compare.
//!
//! ```text
//! SELECT users.id AS user_id, orders.total AS order_total
//! FROM users
//! LEFT JOIN orders ON users.id = orders.user_id
//! WHERE users.name LIKE $1
//! ORDER BY users.id ASC
//! LIMIT 10 OFFSET 0
//! ```

use crate::plan::{FilterArgs, PlanFilter, QueryPlan, or_groups};
use metaquery_core::{DatabaseType, FieldType, SqlValue};
use metaquery_ir::FilterOperator;
use serde::Serialize;

// ============================================================================
// SqlStatement
// ============================================================================

/// SQL text plus its bound parameters, in placeholder order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlStatement {
    pub text: String,
    pub params: Vec<SqlValue>,
}

impl SqlStatement {
    /// Number of bound parameters
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// The SELECT clause line
    pub fn select_clause(&self) -> &str {
        self.text.lines().next().unwrap_or_default()
    }
}

impl std::fmt::Display for SqlStatement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

// ============================================================================
// Generation
// ============================================================================

/// Render the plan as SQL
pub fn generate_sql(plan: &QueryPlan) -> SqlStatement {
    let mut params = Params::new(plan.database);
    let mut lines = Vec::new();

    let select: Vec<String> = plan
        .columns
        .iter()
        .map(|c| match c.aggregation {
            Some(agg) => format!("{}({}) AS {}", agg.as_sql(), c.column, c.alias),
            None => format!("{} AS {}", c.column, c.alias),
        })
        .collect();
    lines.push(format!("SELECT {}", select.join(", ")));
    lines.push(format!("FROM {}", plan.main.table));

    for join in &plan.joins {
        for step in &join.steps {
            lines.push(format!(
                "{} JOIN {} ON {} = {}",
                join.join_type.as_sql(),
                step.target(),
                step.left,
                step.right
            ));
        }
    }

    if !plan.filters.is_empty() {
        lines.push(format!("WHERE {}", where_clause(plan, &mut params)));
    }

    if !plan.group_by.is_empty() {
        let cols: Vec<String> = plan.group_by.iter().map(|c| c.to_string()).collect();
        lines.push(format!("GROUP BY {}", cols.join(", ")));
    }

    if !plan.sorts.is_empty() {
        let keys: Vec<String> = plan
            .sorts
            .iter()
            .map(|s| format!("{} {}", s.column, s.direction.as_sql()))
            .collect();
        lines.push(format!("ORDER BY {}", keys.join(", ")));
    }

    if let Some(page) = &plan.pagination {
        lines.push(format!("LIMIT {} OFFSET {}", page.size, page.offset()));
    }

    SqlStatement {
        text: lines.join("\n"),
        params: params.values,
    }
}

fn where_clause(plan: &QueryPlan, params: &mut Params) -> String {
    let groups = or_groups(&plan.filters);
    let rendered: Vec<String> = groups
        .iter()
        .map(|group| {
            group
                .iter()
                .map(|f| predicate(f, params))
                .collect::<Vec<_>>()
                .join(" AND ")
        })
        .collect();

    if rendered.len() > 1 {
        rendered
            .iter()
            .map(|g| format!("({})", g))
            .collect::<Vec<_>>()
            .join(" OR ")
    } else {
        rendered.join("")
    }
}

fn predicate(filter: &PlanFilter, params: &mut Params) -> String {
    let col = &filter.column;
    let ty = filter.field_type;
    match (&filter.args, filter.operator) {
        (_, FilterOperator::IsNull) => format!("{} IS NULL", col),
        (_, FilterOperator::IsNotNull) => format!("{} IS NOT NULL", col),
        (FilterArgs::One(value), FilterOperator::Like) => {
            let pattern = match value {
                SqlValue::Text(s) => SqlValue::Text(format!("%{}%", s)),
                other => other.clone(),
            };
            format!("{} LIKE {}", col, params.bind(pattern, ty))
        }
        (FilterArgs::List(values), op) => {
            let slots: Vec<String> = values.iter().map(|v| params.bind(v.clone(), ty)).collect();
            let keyword = if op == FilterOperator::NotIn { "NOT IN" } else { "IN" };
            format!("{} {} ({})", col, keyword, slots.join(", "))
        }
        (FilterArgs::Range(low, high), _) => {
            let low = params.bind(low.clone(), ty);
            let high = params.bind(high.clone(), ty);
            format!("{} BETWEEN {} AND {}", col, low, high)
        }
        (FilterArgs::One(value), op) => {
            let symbol = op.comparison_sql().unwrap_or("=");
            format!("{} {} {}", col, symbol, params.bind(value.clone(), ty))
        }
        (FilterArgs::None, _) => format!("{} IS NULL", col),
    }
}

/// Collects bound values and hands out placeholders
struct Params {
    database: DatabaseType,
    values: Vec<SqlValue>,
}

impl Params {
    fn new(database: DatabaseType) -> Self {
        Self {
            database,
            values: Vec::new(),
        }
    }

    fn bind(&mut self, value: SqlValue, field_type: FieldType) -> String {
        self.values.push(value);
        self.database.typed_placeholder(self.values.len(), field_type)
    }
}

// ============================================================================
// Tests
// ============================================================================
