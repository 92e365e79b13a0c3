//! # Query Plan
//!
//! The plan is built once from a `ValidatedQuery` and the resolved records.
//! It fixes every table qualifier, join predicate, alias, bound value and
//! nullability decision. The SQL, ORM, type and scaffold generators all read
//! the same plan and never look at the raw configuration.

use crate::naming;
use metaquery_core::{
    ConfigValue, DatabaseType, EngineError, EngineResult, EntityId, FieldType, RelationType,
    SqlValue,
};
use metaquery_ir::{
    Aggregation, Entity, Field, FilterCondition, FilterOperator, JoinType, LogicalOperator,
    Pagination, SchemaLookup, SortDirection, ValidatedJoin, ValidatedQuery,
};
use std::collections::HashSet;

// ============================================================================
// Building blocks
// ============================================================================

/// A qualified column reference, rendered `qualifier.column`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub qualifier: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(qualifier: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            qualifier: qualifier.into(),
            column: column.into(),
        }
    }
}

impl std::fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.qualifier, self.column)
    }
}

/// An entity taking part in the query
#[derive(Debug, Clone)]
pub struct PlanSource {
    pub entity_id: EntityId,
    pub code: String,
    pub name: String,
    pub table: String,
    /// Name the SQL uses for this table (join alias or table name)
    pub qualifier: String,
}

impl PlanSource {
    fn new(entity: &Entity, alias: Option<&str>) -> Self {
        Self {
            entity_id: entity.id,
            code: entity.code.clone(),
            name: entity.name.clone(),
            table: entity.table_name.clone(),
            qualifier: alias.unwrap_or(&entity.table_name).to_string(),
        }
    }
}

/// One `JOIN … ON left = right` clause
#[derive(Debug, Clone)]
pub struct JoinStep {
    pub table: String,
    pub alias: Option<String>,
    /// Column on the side already in scope
    pub left: ColumnRef,
    /// Column on the table being joined
    pub right: ColumnRef,
}

impl JoinStep {
    /// `orders` or `orders AS o`
    pub fn target(&self) -> String {
        match &self.alias {
            Some(alias) => format!("{} AS {}", self.table, alias),
            None => self.table.clone(),
        }
    }
}

/// A join from the configuration, expanded into one or two SQL join steps
#[derive(Debug, Clone)]
pub struct PlanJoin {
    pub index: usize,
    pub relation_name: String,
    pub relation_type: RelationType,
    pub join_type: JoinType,
    /// The entity this join brings in
    pub entity: PlanSource,
    /// Key of this entity in the ORM include map
    pub include_key: String,
    /// Include key of the entity it hangs off, `None` for the main entity
    pub via: Option<String>,
    pub steps: Vec<JoinStep>,
    /// Rows of the joined entity may be missing (outer join)
    pub optional: bool,
}

/// Scalar type of a result column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    Text,
    Uuid,
    Integer,
    Decimal,
    Boolean,
    Date,
    Datetime,
    Time,
    Json,
}

impl ResultType {
    pub fn from_field(field_type: FieldType) -> Self {
        match field_type {
            FieldType::String | FieldType::Text => ResultType::Text,
            FieldType::Uuid => ResultType::Uuid,
            FieldType::Integer => ResultType::Integer,
            FieldType::Decimal => ResultType::Decimal,
            FieldType::Boolean => ResultType::Boolean,
            FieldType::Date => ResultType::Date,
            FieldType::Datetime => ResultType::Datetime,
            FieldType::Time => ResultType::Time,
            FieldType::Json => ResultType::Json,
        }
    }

    /// Aggregates are always numeric
    pub fn from_aggregate(aggregation: Aggregation, field_type: FieldType) -> Self {
        match aggregation {
            Aggregation::Count => ResultType::Integer,
            Aggregation::Sum | Aggregation::Max | Aggregation::Min
                if field_type == FieldType::Integer =>
            {
                ResultType::Integer
            }
            _ => ResultType::Decimal,
        }
    }
}

/// A selected column
#[derive(Debug, Clone)]
pub struct PlanColumn {
    pub index: usize,
    pub alias: String,
    pub entity_id: EntityId,
    pub entity_code: String,
    pub field_code: String,
    pub field_type: FieldType,
    pub column: ColumnRef,
    pub aggregation: Option<Aggregation>,
    pub result_type: ResultType,
    pub nullable: bool,
    /// `None` for main-entity columns
    pub include_key: Option<String>,
}

/// Bound arguments of a filter
#[derive(Debug, Clone, PartialEq)]
pub enum FilterArgs {
    None,
    One(SqlValue),
    List(Vec<SqlValue>),
    Range(SqlValue, SqlValue),
}

/// A filter condition with its coerced arguments
#[derive(Debug, Clone)]
pub struct PlanFilter {
    pub index: usize,
    pub entity_id: EntityId,
    pub entity_code: String,
    pub field_code: String,
    pub field_type: FieldType,
    pub column: ColumnRef,
    pub operator: FilterOperator,
    pub connective: LogicalOperator,
    pub args: FilterArgs,
    pub on_main: bool,
    /// Query parameter of the read endpoint
    pub param_name: String,
}

/// A sort key
#[derive(Debug, Clone)]
pub struct PlanSort {
    pub index: usize,
    pub entity_code: String,
    pub field_code: String,
    pub column: ColumnRef,
    pub direction: SortDirection,
    pub on_main: bool,
}

// ============================================================================
// QueryPlan
// ============================================================================

/// Everything the generators need, resolved once
#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub database: DatabaseType,
    pub main: PlanSource,
    pub joins: Vec<PlanJoin>,
    pub columns: Vec<PlanColumn>,
    pub filters: Vec<PlanFilter>,
    pub sorts: Vec<PlanSort>,
    /// Plain columns to group by when the select list mixes in aggregates
    pub group_by: Vec<ColumnRef>,
    pub pagination: Option<Pagination>,
}

/// Where an in-scope entity occurrence can be reached, indexed like `ValidatedQuery::scope`
struct Slot<'a> {
    entity: &'a Entity,
    qualifier: String,
    include_key: Option<String>,
    optional: bool,
}

impl QueryPlan {
    /// Build the plan. Fails only on malformed `between` / `in` arguments.
    pub fn build(validated: &ValidatedQuery, lookup: &impl SchemaLookup) -> EngineResult<Self> {
        let config = validated.config();
        let main_entity = lookup
            .entity(config.main_entity_id)
            .ok_or_else(|| missing("main entity", config.main_entity_id))?;
        let main = PlanSource::new(main_entity, None);

        let mut slots = vec![Slot {
            entity: main_entity,
            qualifier: main.qualifier.clone(),
            include_key: None,
            optional: false,
        }];

        let mut joins = Vec::with_capacity(validated.joins().len());
        for join in validated.joins() {
            joins.push(plan_join(join, lookup, &mut slots)?);
        }

        let mut columns = Vec::with_capacity(config.select_fields.len());
        let selected = config.select_fields.iter().zip(validated.aliases());
        for (i, (select, alias)) in selected.enumerate() {
            let join_alias = select.join_alias.as_deref();
            let (slot, field) =
                resolve(&slots, validated, select.entity_id, select.field_id, join_alias)?;
            let (result_type, nullable) = match select.aggregation {
                Some(agg) => (
                    ResultType::from_aggregate(agg, field.field_type),
                    agg != Aggregation::Count,
                ),
                None => (
                    ResultType::from_field(field.field_type),
                    field.nullable || slot.optional,
                ),
            };
            columns.push(PlanColumn {
                index: i,
                alias: alias.clone(),
                entity_id: slot.entity.id,
                entity_code: slot.entity.code.clone(),
                field_code: field.code.clone(),
                field_type: field.field_type,
                column: ColumnRef::new(&slot.qualifier, field.column()),
                aggregation: select.aggregation,
                result_type,
                nullable,
                include_key: slot.include_key.clone(),
            });
        }

        let mut param_names = HashSet::new();
        let mut filters = Vec::with_capacity(config.filter_conditions.len());
        for (i, cond) in config.filter_conditions.iter().enumerate() {
            let join_alias = cond.join_alias.as_deref();
            let (slot, field) =
                resolve(&slots, validated, cond.entity_id, cond.field_id, join_alias)?;
            let column = ColumnRef::new(&slot.qualifier, field.column());
            let args = filter_args(i, &column, cond, field.field_type)?;

            let prefix = join_alias.unwrap_or(&slot.entity.code);
            let base = naming::query_param_name(prefix, &field.code);
            let mut param_name = base.clone();
            let mut n = 2;
            while !param_names.insert(param_name.clone()) {
                param_name = format!("{}_{}", base, n);
                n += 1;
            }

            filters.push(PlanFilter {
                index: i,
                entity_id: slot.entity.id,
                entity_code: slot.entity.code.clone(),
                field_code: field.code.clone(),
                field_type: field.field_type,
                column,
                operator: cond.operator,
                connective: cond.connective(),
                args,
                on_main: slot.include_key.is_none(),
                param_name,
            });
        }

        let mut sorts = Vec::with_capacity(config.sort_config.len());
        for (i, sort) in config.sort_config.iter().enumerate() {
            let join_alias = sort.join_alias.as_deref();
            let (slot, field) =
                resolve(&slots, validated, sort.entity_id, sort.field_id, join_alias)?;
            sorts.push(PlanSort {
                index: i,
                entity_code: slot.entity.code.clone(),
                field_code: field.code.clone(),
                column: ColumnRef::new(&slot.qualifier, field.column()),
                direction: sort.direction,
                on_main: slot.include_key.is_none(),
            });
        }

        let mut group_by = Vec::new();
        let aggregated = columns.iter().any(|c| c.aggregation.is_some());
        if aggregated {
            for c in columns.iter().filter(|c| c.aggregation.is_none()) {
                if !group_by.contains(&c.column) {
                    group_by.push(c.column.clone());
                }
            }
        }

        tracing::debug!(
            joins = joins.len(),
            columns = columns.len(),
            filters = filters.len(),
            sorts = sorts.len(),
            "Built query plan"
        );

        Ok(Self {
            database: validated.database(),
            main,
            joins,
            columns,
            filters,
            sorts,
            group_by,
            pagination: config.pagination,
        })
    }

    /// Columns selected from the main entity
    pub fn main_columns(&self) -> impl Iterator<Item = &PlanColumn> {
        self.columns.iter().filter(|c| c.include_key.is_none())
    }

    /// Columns selected from the joined entity with this include key
    pub fn include_columns<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a PlanColumn> {
        self.columns
            .iter()
            .filter(move |c| c.include_key.as_deref() == Some(key))
    }

    pub fn has_aggregates(&self) -> bool {
        self.columns.iter().any(|c| c.aggregation.is_some())
    }

    /// Whether any filter after the first is attached with OR
    pub fn uses_or(&self) -> bool {
        self.filters
            .iter()
            .skip(1)
            .any(|f| f.connective == LogicalOperator::Or)
    }
}

/// Split filters into AND runs; each OR connective starts a new run
pub fn or_groups<'a>(
    filters: impl IntoIterator<Item = &'a PlanFilter>,
) -> Vec<Vec<&'a PlanFilter>> {
    let mut groups: Vec<Vec<&PlanFilter>> = Vec::new();
    for filter in filters {
        match groups.last_mut() {
            Some(group) if filter.connective == LogicalOperator::And => group.push(filter),
            _ => groups.push(vec![filter]),
        }
    }
    groups
}

fn plan_join<'a>(
    join: &ValidatedJoin,
    lookup: &'a impl SchemaLookup,
    slots: &mut Vec<Slot<'a>>,
) -> EngineResult<PlanJoin> {
    let rel = lookup
        .relation(join.relation_id)
        .ok_or_else(|| missing("relation", join.relation_id))?;
    let far_entity = lookup
        .entity(join.far_entity_id)
        .ok_or_else(|| missing("entity", join.far_entity_id))?;
    let near = slots
        .get(join.near_slot)
        .ok_or_else(|| missing("joined entity", join.near_entity_id))?;

    let (near_field, far_field) = if join.forward {
        (&rel.source_field, &rel.target_field)
    } else {
        (&rel.target_field, &rel.source_field)
    };

    let entity = PlanSource::new(far_entity, join.alias.as_deref());
    let near_col = ColumnRef::new(&near.qualifier, near_field.column());
    let far_col = ColumnRef::new(&entity.qualifier, far_field.column());

    let steps = match rel.relation.relation_type.join_table() {
        Some(jt) => {
            let (near_jt, far_jt) = if join.forward {
                (&jt.source_column, &jt.target_column)
            } else {
                (&jt.target_column, &jt.source_column)
            };
            let junction = join.junction_alias.as_deref().unwrap_or(&jt.table_name);
            vec![
                JoinStep {
                    table: jt.table_name.clone(),
                    alias: join.junction_alias.clone(),
                    left: near_col,
                    right: ColumnRef::new(junction, near_jt),
                },
                JoinStep {
                    table: entity.table.clone(),
                    alias: join.alias.clone(),
                    left: ColumnRef::new(junction, far_jt),
                    right: far_col,
                },
            ]
        }
        None => vec![JoinStep {
            table: entity.table.clone(),
            alias: join.alias.clone(),
            left: near_col,
            right: far_col,
        }],
    };

    let via = near.include_key.clone();
    let include_key = join.alias.clone().unwrap_or_else(|| far_entity.code.clone());

    if join.join_type.existing_side_optional() {
        for slot in slots.iter_mut() {
            slot.optional = true;
        }
    }
    let optional = join.join_type.joined_side_optional();
    slots.push(Slot {
        entity: far_entity,
        qualifier: entity.qualifier.clone(),
        include_key: Some(include_key.clone()),
        optional,
    });

    Ok(PlanJoin {
        index: join.index,
        relation_name: rel.relation.name.clone(),
        relation_type: rel.relation.relation_type.clone(),
        join_type: join.join_type,
        entity,
        include_key,
        via,
        steps,
        optional,
    })
}

fn resolve<'s, 'a>(
    slots: &'s [Slot<'a>],
    validated: &ValidatedQuery,
    entity_id: EntityId,
    field_id: uuid::Uuid,
    join_alias: Option<&str>,
) -> EngineResult<(&'s Slot<'a>, &'a Field)> {
    let slot = validated
        .slot_of(entity_id, join_alias)
        .and_then(|i| slots.get(i))
        .ok_or_else(|| missing("entity", entity_id))?;
    let field = slot
        .entity
        .get_field(field_id)
        .ok_or_else(|| missing("field", field_id))?;
    Ok((slot, field))
}

fn filter_args(
    index: usize,
    column: &ColumnRef,
    cond: &FilterCondition,
    field_type: FieldType,
) -> EngineResult<FilterArgs> {
    let label = format!("filterConditions[{}] ({} {})", index, column, cond.operator);
    let coerce = |v: &ConfigValue| {
        field_type
            .coerce(v)
            .map_err(|e| EngineError::bad_config(&label, e))
    };

    if cond.operator.takes_no_value() {
        return Ok(FilterArgs::None);
    }

    match cond.operator {
        FilterOperator::Between => {
            let items = cond.value.as_array().ok_or_else(|| {
                EngineError::bad_config(&label, "between requires a list of 2 values")
            })?;
            match items.as_slice() {
                [low, high] => Ok(FilterArgs::Range(coerce(low)?, coerce(high)?)),
                _ => Err(EngineError::bad_config(
                    &label,
                    format!("between requires exactly 2 values, got {}", items.len()),
                )),
            }
        }
        FilterOperator::In | FilterOperator::NotIn => match cond.value.as_array() {
            Some(items) if items.is_empty() => Err(EngineError::bad_config(
                &label,
                format!("{} requires at least one value", cond.operator),
            )),
            Some(items) => items
                .iter()
                .map(&coerce)
                .collect::<EngineResult<_>>()
                .map(FilterArgs::List),
            None => Ok(FilterArgs::List(vec![coerce(&cond.value)?])),
        },
        _ => Ok(FilterArgs::One(coerce(&cond.value)?)),
    }
}

fn missing(what: &str, id: uuid::Uuid) -> EngineError {
    EngineError::internal(format!("validated query refers to unknown {} {}", what, id))
}

// ============================================================================
// Tests
// ============================================================================
