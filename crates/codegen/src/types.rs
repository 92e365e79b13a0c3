//! # Result Type Declarations
//!
//! Emits the result-row type of a join query plus its paged wrapper, for
//! Rust or TypeScript.
//!
//! ## Type Mapping
//!
//! | Result type | Rust | TypeScript |
//! |-------------|------|------------|
//! | Text | `String` | `string` |
//! | Uuid | `uuid::Uuid` | `string` |
//! | Integer | `i64` | `number` |
//! | Decimal | `f64` | `number` |
//! | Boolean | `bool` | `boolean` |
//! | Date | `chrono::NaiveDate` | `Date` |
//! | Datetime | `chrono::NaiveDateTime` | `Date` |
//! | Time | `chrono::NaiveTime` | `string` |
//! | Json | `serde_json::Value` | `unknown` |
//!
//! Nullable columns become `Option<T>` / `T | null`.
//!
//! The Rust row derives `sqlx::FromRow`. A field whose name differs from its
//! column alias carries both a serde and an sqlx rename. Aliases that snake
//! case to the same name get `_2`, `_3` suffixes.

use crate::TypeTarget;
use crate::naming;
use crate::plan::{PlanColumn, QueryPlan, ResultType};
use serde::Serialize;
use std::collections::HashSet;

/// A generated type declaration
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeDeclaration {
    pub target: TypeTarget,
    /// Result-row type name
    pub name: String,
    /// Paged wrapper type name
    pub page_name: String,
    pub source: String,
}

/// Rust type of a result column, without nullability
pub fn rust_type(result_type: ResultType) -> &'static str {
    match result_type {
        ResultType::Text => "String",
        ResultType::Uuid => "uuid::Uuid",
        ResultType::Integer => "i64",
        ResultType::Decimal => "f64",
        ResultType::Boolean => "bool",
        ResultType::Date => "chrono::NaiveDate",
        ResultType::Datetime => "chrono::NaiveDateTime",
        ResultType::Time => "chrono::NaiveTime",
        ResultType::Json => "serde_json::Value",
    }
}

/// TypeScript type of a result column, without nullability
pub fn typescript_type(result_type: ResultType) -> &'static str {
    match result_type {
        ResultType::Text | ResultType::Uuid | ResultType::Time => "string",
        ResultType::Integer | ResultType::Decimal => "number",
        ResultType::Boolean => "boolean",
        ResultType::Date | ResultType::Datetime => "Date",
        ResultType::Json => "unknown",
    }
}

/// Generate the declaration for a plan
pub fn generate_types(plan: &QueryPlan, target: TypeTarget) -> TypeDeclaration {
    let name = naming::result_type_name(&plan.main.code);
    let page_name = naming::page_type_name(&plan.main.code);
    let source = match target {
        TypeTarget::Rust => rust_source(plan, &name, &page_name),
        TypeTarget::TypeScript => typescript_source(plan, &name, &page_name),
    };
    TypeDeclaration {
        target,
        name,
        page_name,
        source,
    }
}

fn describe(column: &PlanColumn) -> String {
    match column.aggregation {
        Some(agg) => format!("{}({})", agg.as_sql(), column.column),
        None => column.column.to_string(),
    }
}

fn rust_source(plan: &QueryPlan, name: &str, page_name: &str) -> String {
    let mut content = String::with_capacity(1024);

    content.push_str("use serde::{Deserialize, Serialize};\n\n");
    content.push_str(&format!(
        "/// Row returned by the `{}` join query\n",
        plan.main.code
    ));
    content.push_str(
        "#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]\n",
    );
    content.push_str(&format!("pub struct {} {{\n", name));

    let mut idents = HashSet::new();
    for column in &plan.columns {
        let base = naming::rust_field_ident(&column.alias);
        let mut ident = base.clone();
        let mut n = 2;
        while !idents.insert(ident.clone()) {
            ident = format!("{}_{}", base.trim_start_matches("r#"), n);
            n += 1;
        }
        let ty = rust_type(column.result_type);
        let ty = if column.nullable {
            format!("Option<{}>", ty)
        } else {
            ty.to_string()
        };

        content.push_str(&format!("    /// {}\n", describe(column)));
        if ident.trim_start_matches("r#") != column.alias {
            content.push_str(&format!("    #[serde(rename = \"{}\")]\n", column.alias));
            content.push_str(&format!("    #[sqlx(rename = \"{}\")]\n", column.alias));
        }
        content.push_str(&format!("    pub {}: {},\n", ident, ty));
    }
    content.push_str("}\n\n");

    content.push_str(&format!("/// One page of [`{}`] rows\n", name));
    content.push_str("#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]\n");
    content.push_str(&format!("pub struct {} {{\n", page_name));
    content.push_str(&format!("    pub items: Vec<{}>,\n", name));
    content.push_str("    pub total: i64,\n");
    content.push_str("    pub page: i64,\n");
    content.push_str("    pub size: i64,\n");
    content.push_str("}\n");

    content
}

fn typescript_source(plan: &QueryPlan, name: &str, page_name: &str) -> String {
    let mut content = String::with_capacity(1024);

    content.push_str(&format!(
        "/** Row returned by the `{}` join query */\n",
        plan.main.code
    ));
    content.push_str(&format!("export interface {} {{\n", name));
    for column in &plan.columns {
        let ty = typescript_type(column.result_type);
        let ty = if column.nullable {
            format!("{} | null", ty)
        } else {
            ty.to_string()
        };
        content.push_str(&format!("  /** {} */\n", describe(column)));
        content.push_str(&format!("  {}: {};\n", column.alias, ty));
    }
    content.push_str("}\n\n");

    content.push_str(&format!("/** One page of {} rows */\n", name));
    content.push_str(&format!("export interface {} {{\n", page_name));
    content.push_str(&format!("  items: {}[];\n", name));
    content.push_str("  total: number;\n");
    content.push_str("  page: number;\n");
    content.push_str("  size: number;\n");
    content.push_str("}\n");

    content
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ResolvedContext;
    use metaquery_ir::testing::ShopFixture;
    use metaquery_ir::{Aggregation, ConfigValidator, JoinQueryConfig, JoinType};
    use pretty_assertions::assert_eq;

    fn types(
        shop: &ShopFixture,
        config: &JoinQueryConfig,
        target: TypeTarget,
    ) -> TypeDeclaration {
        let ctx = ResolvedContext::from_catalog(&shop.catalog);
        let validated = ConfigValidator::default().validate(config, &ctx).unwrap();
        generate_types(&QueryPlan::build(&validated, &ctx).unwrap(), target)
    }

    fn shop_config(shop: &ShopFixture) -> JoinQueryConfig {
        JoinQueryConfig::new(shop.user.id)
            .join(shop.user_orders.id, JoinType::Left)
            .select(shop.user.id, shop.field(&shop.user, "id"))
            .select_as(shop.user.id, shop.field(&shop.user, "created_at"), "createdAt")
            .select(shop.order.id, shop.field(&shop.order, "total"))
            .aggregate(
                shop.order.id,
                shop.field(&shop.order, "id"),
                Aggregation::Count,
                Some("orders"),
            )
    }

    #[test]
    fn test_rust_declaration() {
        let shop = ShopFixture::new();
        let decl = types(&shop, &shop_config(&shop), TypeTarget::Rust);

        assert_eq!(decl.name, "UserJoinRow");
        assert_eq!(decl.page_name, "UserJoinPage");
        assert_eq!(
            decl.source,
            "use serde::{Deserialize, Serialize};\n\
             \n\
             /// Row returned by the `user` join query\n\
             #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]\n\
             pub struct UserJoinRow {\n    \
                 /// users.id\n    \
                 pub user_id: uuid::Uuid,\n    \
                 /// users.created_at\n    \
                 #[serde(rename = \"createdAt\")]\n    \
                 #[sqlx(rename = \"createdAt\")]\n    \
                 pub created_at: chrono::NaiveDateTime,\n    \
                 /// orders.total\n    \
                 pub order_total: Option<f64>,\n    \
                 /// COUNT(orders.id)\n    \
                 pub orders: i64,\n\
             }\n\
             \n\
             /// One page of [`UserJoinRow`] rows\n\
             #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]\n\
             pub struct UserJoinPage {\n    \
                 pub items: Vec<UserJoinRow>,\n    \
                 pub total: i64,\n    \
                 pub page: i64,\n    \
                 pub size: i64,\n\
             }\n"
        );
    }

    #[test]
    fn test_typescript_declaration() {
        let shop = ShopFixture::new();
        let decl = types(&shop, &shop_config(&shop), TypeTarget::TypeScript);

        assert!(decl.source.contains("export interface UserJoinRow {"));
        assert!(decl.source.contains("  user_id: string;\n"));
        assert!(decl.source.contains("  createdAt: Date;\n"));
        assert!(decl.source.contains("  order_total: number | null;\n"));
        assert!(decl.source.contains("  orders: number;\n"));
        assert!(decl.source.contains("  items: UserJoinRow[];\n"));
    }

    #[test]
    fn test_aggregates_are_numeric() {
        let shop = ShopFixture::new();
        let config = JoinQueryConfig::new(shop.user.id).aggregate(
            shop.user.id,
            shop.field(&shop.user, "name"),
            Aggregation::Max,
            Some("last_name"),
        );
        let decl = types(&shop, &config, TypeTarget::Rust);
        assert!(decl.source.contains("pub last_name: Option<f64>,"));
    }

    #[test]
    fn test_colliding_field_names_are_suffixed() {
        let shop = ShopFixture::new();
        let u = shop.user.id;
        let name = shop.field(&shop.user, "name");
        let config = JoinQueryConfig::new(u)
            .select_as(u, name, "userName")
            .select_as(u, name, "user_name")
            .select_as(u, shop.field(&shop.user, "active"), "type");
        let decl = types(&shop, &config, TypeTarget::Rust);

        let fields: Vec<&str> = decl
            .source
            .lines()
            .map(str::trim)
            .take_while(|l| *l != "}")
            .filter(|l| l.starts_with("pub ") && l.ends_with(','))
            .collect();
        assert_eq!(
            fields,
            vec![
                "pub user_name: String,",
                "pub user_name_2: String,",
                "pub r#type: Option<bool>,",
            ]
        );
        assert!(decl.source.contains(
            "    #[sqlx(rename = \"userName\")]\n    pub user_name: String,\n"
        ));
        assert!(decl.source.contains(
            "    #[sqlx(rename = \"user_name\")]\n    pub user_name_2: String,\n"
        ));
        assert!(!decl.source.contains("rename = \"type\""));
    }
}
