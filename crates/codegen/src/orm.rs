//! # ORM Descriptor
//!
//! A nested, Prisma-style query description of the same plan:
//!
//! ```json
//! {
//!   "model": "user",
//!   "select": [{ "field": "id", "alias": "user_id" }],
//!   "include": { "order": { "relation": "userOrders", "model": "order", "select": [...] } },
//!   "where": { "name": { "contains": "a", "mode": "insensitive" } },
//!   "orderBy": [{ "id": "asc" }],
//!   "skip": 0,
//!   "take": 10
//! }
//! ```
//!
//! The nested form can only filter and sort on the main entity. Filters and
//! sorts on joined entities are reported in `unsupported` rather than dropped
//! silently; the SQL form applies them.

use crate::plan::{FilterArgs, PlanColumn, PlanFilter, QueryPlan, or_groups};
use metaquery_ir::FilterOperator;
use serde::Serialize;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

// ============================================================================
// Descriptor types
// ============================================================================

/// One selected field
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrmSelection {
    pub field: String,
    pub alias: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<String>,
}

impl OrmSelection {
    fn from_column(column: &PlanColumn) -> Self {
        Self {
            field: column.field_code.clone(),
            alias: column.alias.clone(),
            aggregate: column
                .aggregation
                .map(|a| format!("_{}", a.as_sql().to_lowercase())),
        }
    }
}

/// A joined entity
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrmInclude {
    pub relation: String,
    pub model: String,
    /// Include key of the entity this one is reached through
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<String>,
    pub required: bool,
    pub select: Vec<OrmSelection>,
}

/// The full nested descriptor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrmDescriptor {
    pub model: String,
    pub select: Vec<OrmSelection>,
    pub include: BTreeMap<String, OrmInclude>,
    #[serde(rename = "where", skip_serializing_if = "Option::is_none")]
    pub where_clause: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub order_by: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unsupported: Vec<String>,
}

impl OrmDescriptor {
    /// Every alias in the descriptor, main selections first
    pub fn aliases(&self) -> Vec<&str> {
        self.select
            .iter()
            .chain(self.include.values().flat_map(|i| i.select.iter()))
            .map(|s| s.alias.as_str())
            .collect()
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    pub fn to_json_pretty(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

// ============================================================================
// Generation
// ============================================================================

/// Build the nested descriptor for a plan
pub fn generate_orm(plan: &QueryPlan) -> OrmDescriptor {
    let select = plan.main_columns().map(OrmSelection::from_column).collect();

    let include = plan
        .joins
        .iter()
        .map(|join| {
            let include = OrmInclude {
                relation: join.relation_name.clone(),
                model: join.entity.code.clone(),
                via: join.via.clone(),
                required: !join.optional,
                select: plan
                    .include_columns(&join.include_key)
                    .map(OrmSelection::from_column)
                    .collect(),
            };
            (join.include_key.clone(), include)
        })
        .collect();

    let mut unsupported = Vec::new();
    for f in plan.filters.iter().filter(|f| !f.on_main) {
        let message = format!(
            "filterConditions[{}]: filter on joined entity '{}' ({} {}) is applied in SQL only",
            f.index, f.entity_code, f.column, f.operator
        );
        tracing::warn!(
            condition = f.index,
            entity = %f.entity_code,
            "ORM descriptor cannot filter on a joined entity"
        );
        unsupported.push(message);
    }
    for s in plan.sorts.iter().filter(|s| !s.on_main) {
        let message = format!(
            "sortConfig[{}]: sort on joined entity '{}' ({}) is applied in SQL only",
            s.index, s.entity_code, s.column
        );
        tracing::warn!(
            sort = s.index,
            entity = %s.entity_code,
            "ORM descriptor cannot sort on a joined entity"
        );
        unsupported.push(message);
    }

    let order_by = plan
        .sorts
        .iter()
        .filter(|s| s.on_main)
        .map(|s| {
            let mut key = Map::new();
            key.insert(s.field_code.clone(), json!(s.direction.as_lower()));
            Value::Object(key)
        })
        .collect();

    OrmDescriptor {
        model: plan.main.code.clone(),
        select,
        include,
        where_clause: where_tree(plan.filters.iter().filter(|f| f.on_main)),
        order_by,
        skip: plan.pagination.map(|p| p.offset()),
        take: plan.pagination.map(|p| p.size),
        unsupported,
    }
}

fn where_tree<'a>(filters: impl IntoIterator<Item = &'a PlanFilter>) -> Option<Value> {
    let groups: Vec<Value> = or_groups(filters)
        .into_iter()
        .map(|group| {
            let mut conditions: Vec<Value> = group.into_iter().map(condition).collect();
            if conditions.len() == 1 {
                conditions.remove(0)
            } else {
                json!({ "AND": conditions })
            }
        })
        .collect();

    match groups.len() {
        0 => None,
        1 => groups.into_iter().next(),
        _ => Some(json!({ "OR": groups })),
    }
}

fn condition(filter: &PlanFilter) -> Value {
    let mut ops = Map::new();
    match (&filter.args, filter.operator) {
        (_, FilterOperator::IsNull) => {
            ops.insert("equals".into(), Value::Null);
        }
        (_, FilterOperator::IsNotNull) => {
            ops.insert("not".into(), Value::Null);
        }
        (FilterArgs::One(v), FilterOperator::Like) => {
            ops.insert("contains".into(), v.to_json());
            ops.insert("mode".into(), json!("insensitive"));
        }
        (FilterArgs::One(v), op) => {
            let key = match op {
                FilterOperator::Ne => "not",
                FilterOperator::Gt => "gt",
                FilterOperator::Gte => "gte",
                FilterOperator::Lt => "lt",
                FilterOperator::Lte => "lte",
                _ => "equals",
            };
            ops.insert(key.into(), v.to_json());
        }
        (FilterArgs::List(values), op) => {
            let key = if op == FilterOperator::NotIn { "notIn" } else { "in" };
            ops.insert(key.into(), values.iter().map(|v| v.to_json()).collect());
        }
        (FilterArgs::Range(low, high), _) => {
            ops.insert("gte".into(), low.to_json());
            ops.insert("lte".into(), high.to_json());
        }
        (FilterArgs::None, _) => {
            ops.insert("equals".into(), Value::Null);
        }
    }

    let mut field = Map::new();
    field.insert(filter.field_code.clone(), Value::Object(ops));
    Value::Object(field)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::ResolvedContext;
    use metaquery_ir::testing::ShopFixture;
    use metaquery_ir::{ConfigValidator, FilterCondition, JoinQueryConfig, JoinType, SortDirection};
    use pretty_assertions::assert_eq;

    fn orm(shop: &ShopFixture, config: &JoinQueryConfig) -> OrmDescriptor {
        let ctx = ResolvedContext::from_catalog(&shop.catalog);
        let validated = ConfigValidator::default().validate(config, &ctx).unwrap();
        generate_orm(&QueryPlan::build(&validated, &ctx).unwrap())
    }

    #[test]
    fn test_include_selects_only_joined_fields() {
        let shop = ShopFixture::new();
        let config = JoinQueryConfig::new(shop.user.id)
            .join(shop.user_orders.id, JoinType::Left)
            .join(shop.user_roles.id, JoinType::Inner)
            .select(shop.user.id, shop.field(&shop.user, "id"))
            .select(shop.order.id, shop.field(&shop.order, "total"))
            .paginate(2, 25);
        let d = orm(&shop, &config);

        assert_eq!(d.model, "user");
        assert_eq!(d.select.len(), 1);
        assert_eq!(d.include["order"].select[0].alias, "order_total");
        assert!(!d.include["order"].required);
        assert!(d.include["role"].select.is_empty());
        assert!(d.include["role"].required);
        assert_eq!(d.skip, Some(25));
        assert_eq!(d.take, Some(25));
        assert_eq!(d.aliases(), vec!["user_id", "order_total"]);
    }

    #[test]
    fn test_where_and_order_by_on_main_entity() {
        let shop = ShopFixture::new();
        let u = shop.user.id;
        let name = shop.field(&shop.user, "name");
        let age = shop.field(&shop.user, "age");
        let config = JoinQueryConfig::new(u)
            .select(u, name)
            .filter(FilterCondition::new(u, name, FilterOperator::Like, "a"))
            .filter(FilterCondition::new(u, age, FilterOperator::Between, vec![18, 65]))
            .filter(FilterCondition::new(u, age, FilterOperator::In, vec![99]).or())
            .sort(u, age, SortDirection::Desc);
        let d = orm(&shop, &config);

        assert_eq!(
            d.where_clause,
            Some(json!({
                "OR": [
                    { "AND": [
                        { "name": { "contains": "a", "mode": "insensitive" } },
                        { "age": { "gte": 18, "lte": 65 } }
                    ] },
                    { "age": { "in": [99] } }
                ]
            }))
        );
        assert_eq!(d.order_by, vec![json!({ "age": "desc" })]);
        assert!(d.unsupported.is_empty());
    }

    #[test]
    fn test_joined_filters_are_reported() {
        let shop = ShopFixture::new();
        let total = shop.field(&shop.order, "total");
        let config = JoinQueryConfig::new(shop.user.id)
            .join(shop.user_orders.id, JoinType::Inner)
            .select(shop.user.id, shop.field(&shop.user, "name"))
            .filter(FilterCondition::new(shop.order.id, total, FilterOperator::Gt, 100))
            .sort(shop.order.id, total, SortDirection::Asc);
        let d = orm(&shop, &config);

        assert_eq!(d.where_clause, None);
        assert!(d.order_by.is_empty());
        assert_eq!(d.unsupported.len(), 2);
        assert!(d.unsupported[0].starts_with("filterConditions[0]"));
        assert!(d.unsupported[1].starts_with("sortConfig[0]"));
    }

    #[test]
    fn test_serialized_shape() {
        let shop = ShopFixture::new();
        let config = JoinQueryConfig::new(shop.user.id)
            .select(shop.user.id, shop.field(&shop.user, "id"));
        let json = orm(&shop, &config).to_json();

        assert_eq!(json["select"][0]["field"], "id");
        assert!(json.get("where").is_none());
        assert!(json.get("skip").is_none());
        assert!(json["include"].as_object().unwrap().is_empty());
    }
}
