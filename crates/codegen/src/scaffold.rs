//! # Read Endpoint Scaffold
//!
//! Generates an axum read endpoint for a join query and its Markdown
//! documentation.
//!
//! ## Generated Code
//!
//! - `{ENTITY}_JOIN_SQL` - the statement text without LIMIT/OFFSET
//! - `{Entity}JoinQuery` - one optional query parameter per filter
//!   condition, plus `page` and `size`
//! - `{entity}_join_routes()` - mounts `GET /{prefix}/{entity}-join`
//! - `list_{entity}_join()` - binds parameters in placeholder order, falling
//!   back to the configured filter values
//!
//! Null checks (`is_null`, `is_not_null`) bind nothing and get no parameter.
//! UUID, temporal and JSON parameters arrive as strings; the statement casts
//! them where the database needs it.

use crate::SynthesisConfig;
use crate::naming;
use crate::plan::{FilterArgs, PlanColumn, PlanFilter, QueryPlan, ResultType};
use crate::sql::SqlStatement;
use crate::types::TypeDeclaration;
use metaquery_core::{FieldType, SqlValue};
use metaquery_ir::FilterOperator;
use serde::Serialize;
use serde_json::{Map, Value, json};

/// Generated endpoint source and documentation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Scaffold {
    pub route: String,
    pub handler_name: String,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub docs: Option<String>,
}

/// A filter exposed as a query parameter
struct ParamSpec<'a> {
    filter: &'a PlanFilter,
    scalar_type: &'static str,
}

impl<'a> ParamSpec<'a> {
    fn for_filter(filter: &'a PlanFilter) -> Option<Self> {
        if filter.operator.takes_no_value() {
            return None;
        }
        Some(Self {
            filter,
            scalar_type: param_scalar_type(filter.field_type),
        })
    }

    fn name(&self) -> &str {
        &self.filter.param_name
    }

    fn is_list(&self) -> bool {
        matches!(self.filter.args, FilterArgs::List(_) | FilterArgs::Range(..))
    }

    fn rust_type(&self) -> String {
        if self.is_list() {
            format!("Vec<{}>", self.scalar_type)
        } else {
            self.scalar_type.to_string()
        }
    }

    fn configured(&self) -> Vec<&SqlValue> {
        match &self.filter.args {
            FilterArgs::None => Vec::new(),
            FilterArgs::One(v) => vec![v],
            FilterArgs::List(values) => values.iter().collect(),
            FilterArgs::Range(low, high) => vec![low, high],
        }
    }

    fn describe(&self) -> String {
        format!("{} {}", self.filter.column, self.filter.operator)
    }
}

fn param_scalar_type(field_type: FieldType) -> &'static str {
    match field_type {
        FieldType::Integer => "i64",
        FieldType::Decimal => "f64",
        FieldType::Boolean => "bool",
        _ => "String",
    }
}

// ============================================================================
// Generation
// ============================================================================

/// Generate the endpoint scaffold and, when enabled, its documentation
pub fn generate_scaffold(
    plan: &QueryPlan,
    sql: &SqlStatement,
    types: &TypeDeclaration,
    config: &SynthesisConfig,
) -> Scaffold {
    let route = naming::route_path(&config.route_prefix, &plan.main.code);
    let handler_name = naming::handler_name(&plan.main.code);
    let params: Vec<ParamSpec> = plan.filters.iter().filter_map(ParamSpec::for_filter).collect();

    let source = endpoint_source(plan, sql, types, config, &route, &params);
    let docs = config
        .generate_docs
        .then(|| documentation(plan, sql, config, &route, &params));

    Scaffold {
        route,
        handler_name,
        source,
        docs,
    }
}

/// SQL text without the trailing LIMIT/OFFSET line
fn base_sql(sql: &SqlStatement) -> String {
    sql.text
        .lines()
        .filter(|l| !l.starts_with("LIMIT "))
        .collect::<Vec<_>>()
        .join("\n")
}

fn endpoint_source(
    plan: &QueryPlan,
    sql: &SqlStatement,
    types: &TypeDeclaration,
    config: &SynthesisConfig,
    route: &str,
    params: &[ParamSpec],
) -> String {
    let code = &plan.main.code;
    let const_name = naming::sql_const_name(code);
    let query_struct = naming::query_struct_name(code);
    let handler = naming::handler_name(code);
    let default_size = plan
        .pagination
        .map(|p| p.size)
        .unwrap_or(config.default_page_size);

    let mut content = String::with_capacity(2048);

    content.push_str("use axum::{Json, Router, extract::State, routing::get};\n");
    content.push_str("use axum_extra::extract::Query;\n");
    content.push_str("use serde::Deserialize;\n\n");
    content.push_str("use crate::error::AppError;\n");
    content.push_str("use crate::state::AppState;\n");
    content.push_str(&format!(
        "use crate::types::{{{}, {}}};\n\n",
        types.name, types.page_name
    ));

    content.push_str(&format!(
        "pub const {}: &str = r#\"{}\"#;\n\n",
        const_name,
        base_sql(sql)
    ));

    // Query parameters
    content.push_str(&format!("/// Query parameters of `GET {}`\n", route));
    content.push_str("#[derive(Debug, Default, Deserialize)]\n");
    content.push_str(&format!("pub struct {} {{\n", query_struct));
    for p in params {
        content.push_str(&format!("    /// {}\n", p.describe()));
        content.push_str(&format!("    pub {}: Option<{}>,\n", p.name(), p.rust_type()));
    }
    content.push_str("    pub page: Option<i64>,\n");
    content.push_str("    pub size: Option<i64>,\n");
    content.push_str("}\n\n");

    // Routes
    content.push_str(&format!(
        "pub fn {}() -> Router<AppState> {{\n",
        naming::routes_fn_name(code)
    ));
    content.push_str(&format!(
        "    Router::new().route(\"{}\", get({}))\n",
        route, handler
    ));
    content.push_str("}\n\n");

    // Handler
    content.push_str(&format!("pub async fn {}(\n", handler));
    content.push_str("    State(state): State<AppState>,\n");
    content.push_str(&format!("    Query(params): Query<{}>,\n", query_struct));
    content.push_str(&format!(
        ") -> Result<Json<{}>, AppError> {{\n",
        types.page_name
    ));
    content.push_str("    let page = params.page.unwrap_or(1).max(1);\n");
    content.push_str(&format!(
        "    let size = params.size.unwrap_or({}).clamp(1, {});\n",
        default_size, config.max_page_size
    ));

    for p in params {
        let configured = p.configured();
        if p.is_list() {
            let defaults: Vec<String> = configured.iter().map(|v| rust_literal(v)).collect();
            content.push_str(&format!(
                "    let {name} = params.{name}.unwrap_or_else(|| vec![{defaults}]);\n",
                name = p.name(),
                defaults = defaults.join(", ")
            ));
            // the statement has one placeholder per configured value
            content.push_str(&format!("    if {}.len() != {} {{\n", p.name(), configured.len()));
            content.push_str(&format!(
                "        return Err(AppError::BadRequest(\"{} expects {} values\".into()));\n",
                p.name(),
                configured.len()
            ));
            content.push_str("    }\n");
        } else {
            let default = configured.first().map(|v| rust_literal(v)).unwrap_or_default();
            let fallback = if p.scalar_type == "String" {
                format!("unwrap_or_else(|| {})", default)
            } else {
                format!("unwrap_or({})", default)
            };
            content.push_str(&format!(
                "    let {name} = params.{name}.{fallback};\n",
                name = p.name(),
            ));
        }
    }
    content.push('\n');

    content.push_str("    let offset = (page - 1)\n");
    content.push_str("        .checked_mul(size)\n");
    content.push_str(
        "        .ok_or_else(|| AppError::BadRequest(\"page is out of range\".into()))?;\n",
    );
    content.push_str(&format!(
        "    let sql = format!(\"{{}}\\nLIMIT {{}} OFFSET {{}}\", {}, size, offset);\n",
        const_name
    ));
    content.push_str(&format!(
        "    let items = sqlx::query_as::<_, {}>(&sql)\n",
        types.name
    ));
    for p in params {
        if p.is_list() {
            let clone = if p.scalar_type == "String" { ".clone()" } else { "" };
            for i in 0..p.configured().len() {
                content.push_str(&format!("        .bind({}[{}]{})\n", p.name(), i, clone));
            }
        } else if p.filter.operator == FilterOperator::Like {
            content.push_str(&format!(
                "        .bind(format!(\"%{{}}%\", {}))\n",
                p.name()
            ));
        } else {
            content.push_str(&format!("        .bind({})\n", p.name()));
        }
    }
    content.push_str("        .fetch_all(&state.db)\n");
    content.push_str("        .await?;\n\n");

    content.push_str(&format!("    Ok(Json({} {{\n", types.page_name));
    content.push_str("        total: items.len() as i64,\n");
    content.push_str("        items,\n");
    content.push_str("        page,\n");
    content.push_str("        size,\n");
    content.push_str("    }))\n");
    content.push_str("}\n");

    content
}

/// Rust literal of a configured filter value, typed like its query parameter
fn rust_literal(value: &SqlValue) -> String {
    match value {
        SqlValue::Null => "Default::default()".to_string(),
        SqlValue::Bool(b) => b.to_string(),
        SqlValue::Integer(i) => i.to_string(),
        SqlValue::Decimal(d) => format!("{:?}", d),
        SqlValue::Text(s) => format!("{:?}.to_string()", s),
        SqlValue::Json(v) => format!("{:?}.to_string()", v.to_string()),
    }
}

// ============================================================================
// Documentation
// ============================================================================

fn documentation(
    plan: &QueryPlan,
    sql: &SqlStatement,
    config: &SynthesisConfig,
    route: &str,
    params: &[ParamSpec],
) -> String {
    let mut doc = String::with_capacity(2048);
    let size = plan
        .pagination
        .map(|p| p.size)
        .unwrap_or(config.default_page_size);

    doc.push_str(&format!("# {} join query\n\n", plan.main.name));
    doc.push_str(&format!("`GET {}`\n\n", route));

    doc.push_str("## Overview\n\n");
    doc.push_str(&format!(
        "Reads `{}` (table `{}`) joined through {} relation(s), returning {} field(s) per row.\n\n",
        plan.main.code,
        plan.main.table,
        plan.joins.len(),
        plan.columns.len()
    ));

    doc.push_str("## Relations\n\n");
    if plan.joins.is_empty() {
        doc.push_str("None.\n\n");
    } else {
        doc.push_str("| Relation | Type | Join | Entity | Table |\n");
        doc.push_str("|----------|------|------|--------|-------|\n");
        for join in &plan.joins {
            doc.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                join.relation_name,
                join.relation_type,
                join.join_type.as_sql(),
                join.entity.code,
                join.entity.table
            ));
        }
        doc.push('\n');
    }

    doc.push_str("## Fields\n\n");
    doc.push_str("| Alias | Source | Type | Nullable |\n");
    doc.push_str("|-------|--------|------|----------|\n");
    for column in &plan.columns {
        let source = match column.aggregation {
            Some(agg) => format!("{}({})", agg.as_sql(), column.column),
            None => column.column.to_string(),
        };
        doc.push_str(&format!(
            "| {} | `{}` | {} | {} |\n",
            column.alias,
            source,
            column.field_type,
            if column.nullable { "yes" } else { "no" }
        ));
    }
    doc.push('\n');

    doc.push_str("## Query parameters\n\n");
    doc.push_str("| Name | Filter | Default |\n");
    doc.push_str("|------|--------|---------|\n");
    for p in params {
        let defaults: Vec<String> = p.configured().iter().map(|v| v.display_literal()).collect();
        doc.push_str(&format!(
            "| {} | `{}` | {} |\n",
            p.name(),
            p.describe(),
            defaults.join(", ")
        ));
    }
    doc.push_str("| page | page number | 1 |\n");
    doc.push_str(&format!(
        "| size | page size (max {}) | {} |\n\n",
        config.max_page_size, size
    ));

    if config.include_sql_in_docs {
        doc.push_str("## SQL\n\n");
        doc.push_str("```sql\n");
        doc.push_str(&sql.text);
        doc.push_str("\n```\n\n");
        if !sql.params.is_empty() {
            doc.push_str("Bound parameters:\n\n");
            for (i, value) in sql.params.iter().enumerate() {
                doc.push_str(&format!(
                    "{}. `{}`\n",
                    i + 1,
                    value.display_literal()
                ));
            }
            doc.push('\n');
        }
    }

    doc.push_str("## Example\n\n");
    doc.push_str("Request:\n\n");
    doc.push_str("```http\n");
    doc.push_str(&format!("GET {}?{}\n", route, example_query(params, size)));
    doc.push_str("```\n\n");
    doc.push_str("Response:\n\n");
    doc.push_str("```json\n");
    doc.push_str(&example_response(plan, size));
    doc.push_str("\n```\n");

    doc
}

fn example_query(params: &[ParamSpec], size: i64) -> String {
    let mut pairs = Vec::new();
    for p in params {
        for value in p.configured() {
            let value = plain_text(value);
            pairs.push(format!("{}={}", p.name(), urlencoding::encode(&value)));
        }
    }
    pairs.push("page=1".to_string());
    pairs.push(format!("size={}", size));
    pairs.join("&")
}

fn plain_text(value: &SqlValue) -> String {
    match value {
        SqlValue::Text(s) => s.clone(),
        SqlValue::Json(v) => v.to_string(),
        other => other.display_literal().to_lowercase(),
    }
}

fn example_response(plan: &QueryPlan, size: i64) -> String {
    let mut row = Map::new();
    for column in &plan.columns {
        row.insert(column.alias.clone(), example_value(column));
    }
    let body = json!({
        "items": [Value::Object(row)],
        "total": 1,
        "page": 1,
        "size": size,
    });
    serde_json::to_string_pretty(&body).unwrap_or_default()
}

fn example_value(column: &PlanColumn) -> Value {
    match column.result_type {
        ResultType::Uuid => json!("3f2504e0-4f89-41d3-9a0c-0305e82c3301"),
        ResultType::Text => json!(format!("{} {}", column.entity_code, column.field_code)),
        ResultType::Integer => json!(1),
        ResultType::Decimal => json!(9.99),
        ResultType::Boolean => json!(true),
        ResultType::Date => json!("2024-01-15"),
        ResultType::Datetime => json!("2024-01-15T09:30:00"),
        ResultType::Time => json!("09:30:00"),
        ResultType::Json => json!({}),
    }
}

// ============================================================================
// Tests
// ============================================================================
