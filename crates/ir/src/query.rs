//! Join-query configuration
//!
//! `JoinQueryConfig` is the declarative request the synthesizer consumes:
//! which entities to join (by relation), which fields to project, and how to
//! filter, sort and paginate. It is built per request and never persisted by
//! the engine.
//!
//! Every operator, join type and direction is a closed enum, so unknown
//! spellings are rejected when the config is deserialized.

use metaquery_core::{ConfigValue, EngineError, EngineResult, EntityId, FieldId, RelationId};
use serde::{Deserialize, Serialize};

// ============================================================================
// Enums
// ============================================================================

/// SQL join flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum JoinType {
    Inner,
    #[default]
    Left,
    Right,
    Full,
}

impl JoinType {
    /// SQL keyword
    pub fn as_sql(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER",
            JoinType::Left => "LEFT",
            JoinType::Right => "RIGHT",
            JoinType::Full => "FULL",
        }
    }

    /// Rows of the joined side may be missing (LEFT / FULL)
    pub fn joined_side_optional(&self) -> bool {
        matches!(self, JoinType::Left | JoinType::Full)
    }

    /// Rows of the already-joined side may be missing (RIGHT / FULL)
    pub fn existing_side_optional(&self) -> bool {
        matches!(self, JoinType::Right | JoinType::Full)
    }
}

impl std::fmt::Display for JoinType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// Aggregate function applied to a selected column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Aggregation {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

impl Aggregation {
    /// SQL function name
    pub fn as_sql(&self) -> &'static str {
        match self {
            Aggregation::Count => "COUNT",
            Aggregation::Sum => "SUM",
            Aggregation::Avg => "AVG",
            Aggregation::Max => "MAX",
            Aggregation::Min => "MIN",
        }
    }

    /// SUM and AVG only make sense over numbers
    pub fn requires_numeric(&self) -> bool {
        matches!(self, Aggregation::Sum | Aggregation::Avg)
    }
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// Filter predicate operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    In,
    Between,
    NotIn,
    IsNull,
    IsNotNull,
}

impl FilterOperator {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Ne => "ne",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Like => "like",
            FilterOperator::In => "in",
            FilterOperator::Between => "between",
            FilterOperator::NotIn => "not_in",
            FilterOperator::IsNull => "is_null",
            FilterOperator::IsNotNull => "is_not_null",
        }
    }

    /// SQL operator for the single-value comparisons
    pub fn comparison_sql(&self) -> Option<&'static str> {
        match self {
            FilterOperator::Eq => Some("="),
            FilterOperator::Ne => Some("!="),
            FilterOperator::Gt => Some(">"),
            FilterOperator::Gte => Some(">="),
            FilterOperator::Lt => Some("<"),
            FilterOperator::Lte => Some("<="),
            _ => None,
        }
    }

    /// Operators that take a list value
    pub fn takes_list(&self) -> bool {
        matches!(
            self,
            FilterOperator::In | FilterOperator::NotIn | FilterOperator::Between
        )
    }

    /// Operators that ignore the value entirely
    pub fn takes_no_value(&self) -> bool {
        matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }
}

impl std::fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a filter condition attaches to the previous one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogicalOperator {
    #[default]
    And,
    Or,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// SQL keyword
    pub fn as_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }

    /// Lowercase form used by ORM descriptors
    pub fn as_lower(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

// ============================================================================
// Config parts
// ============================================================================

/// One join, expressed as a relation to traverse
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinConfig {
    pub relation_id: RelationId,
    #[serde(default)]
    pub join_type: JoinType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// One projected column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectField {
    pub entity_id: EntityId,
    pub field_id: FieldId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<Aggregation>,
    /// Qualifier of the join to read from when the entity is joined twice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_alias: Option<String>,
}

/// One filter predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterCondition {
    pub entity_id: EntityId,
    pub field_id: FieldId,
    pub operator: FilterOperator,
    #[serde(default)]
    pub value: ConfigValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_operator: Option<LogicalOperator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_alias: Option<String>,
}

impl FilterCondition {
    /// Create a new condition (joined with AND)
    pub fn new(
        entity_id: EntityId,
        field_id: FieldId,
        operator: FilterOperator,
        value: impl Into<ConfigValue>,
    ) -> Self {
        Self {
            entity_id,
            field_id,
            operator,
            value: value.into(),
            logical_operator: None,
            join_alias: None,
        }
    }

    /// Apply this condition to the join with the given qualifier
    pub fn on(mut self, join_alias: impl Into<String>) -> Self {
        self.join_alias = Some(join_alias.into());
        self
    }

    /// Attach this condition to the previous one with OR
    pub fn or(mut self) -> Self {
        self.logical_operator = Some(LogicalOperator::Or);
        self
    }

    /// Effective connective (AND when absent)
    pub fn connective(&self) -> LogicalOperator {
        self.logical_operator.unwrap_or_default()
    }
}

/// One ORDER BY term
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SortConfig {
    pub entity_id: EntityId,
    pub field_id: FieldId,
    #[serde(default)]
    pub direction: SortDirection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_alias: Option<String>,
}

/// Page request (1-based page)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page: i64,
    pub size: i64,
}

impl Pagination {
    /// Rows skipped before this page, `None` when it does not fit in an `i64`
    pub fn checked_offset(&self) -> Option<i64> {
        self.page.checked_sub(1)?.checked_mul(self.size)
    }

    /// Rows skipped before this page, saturating at `i64::MAX`
    pub fn offset(&self) -> i64 {
        self.page.saturating_sub(1).saturating_mul(self.size)
    }
}

/// Alias a selected column gets when the config names none: `user_name`
pub fn default_alias(prefix: &str, field_code: &str) -> String {
    format!("{}_{}", prefix, field_code)
}

// ============================================================================
// JoinQueryConfig
// ============================================================================

/// Declarative join-query request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinQueryConfig {
    pub main_entity_id: EntityId,
    #[serde(default)]
    pub join_configs: Vec<JoinConfig>,
    #[serde(default)]
    pub select_fields: Vec<SelectField>,
    #[serde(default)]
    pub filter_conditions: Vec<FilterCondition>,
    #[serde(default)]
    pub sort_config: Vec<SortConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
}

impl JoinQueryConfig {
    /// Start a config for the given main entity
    pub fn new(main_entity_id: EntityId) -> Self {
        Self {
            main_entity_id,
            join_configs: Vec::new(),
            select_fields: Vec::new(),
            filter_conditions: Vec::new(),
            sort_config: Vec::new(),
            pagination: None,
        }
    }

    /// Parse a config from JSON
    pub fn from_json(json: &str) -> EngineResult<Self> {
        serde_json::from_str(json).map_err(EngineError::from)
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> EngineResult<String> {
        serde_json::to_string_pretty(self).map_err(EngineError::from)
    }

    // ========================================================================
    // Builder methods
    // ========================================================================

    /// Add a join
    pub fn join(mut self, relation_id: RelationId, join_type: JoinType) -> Self {
        self.join_configs.push(JoinConfig {
            relation_id,
            join_type,
            alias: None,
        });
        self
    }

    /// Add a join with a table alias
    pub fn join_as(
        mut self,
        relation_id: RelationId,
        join_type: JoinType,
        alias: impl Into<String>,
    ) -> Self {
        self.join_configs.push(JoinConfig {
            relation_id,
            join_type,
            alias: Some(alias.into()),
        });
        self
    }

    /// Select a column under its default alias
    pub fn select(mut self, entity_id: EntityId, field_id: FieldId) -> Self {
        self.select_fields.push(SelectField {
            entity_id,
            field_id,
            alias: None,
            aggregation: None,
            join_alias: None,
        });
        self
    }

    /// Select a column from the join with the given qualifier
    pub fn select_on(
        mut self,
        join_alias: impl Into<String>,
        entity_id: EntityId,
        field_id: FieldId,
    ) -> Self {
        self.select_fields.push(SelectField {
            entity_id,
            field_id,
            alias: None,
            aggregation: None,
            join_alias: Some(join_alias.into()),
        });
        self
    }

    /// Select a column under an explicit alias
    pub fn select_as(
        mut self,
        entity_id: EntityId,
        field_id: FieldId,
        alias: impl Into<String>,
    ) -> Self {
        self.select_fields.push(SelectField {
            entity_id,
            field_id,
            alias: Some(alias.into()),
            aggregation: None,
            join_alias: None,
        });
        self
    }

    /// Select an aggregate
    pub fn aggregate(
        mut self,
        entity_id: EntityId,
        field_id: FieldId,
        aggregation: Aggregation,
        alias: Option<&str>,
    ) -> Self {
        self.select_fields.push(SelectField {
            entity_id,
            field_id,
            alias: alias.map(str::to_string),
            aggregation: Some(aggregation),
            join_alias: None,
        });
        self
    }

    /// Add a filter condition
    pub fn filter(mut self, condition: FilterCondition) -> Self {
        self.filter_conditions.push(condition);
        self
    }

    /// Add a sort term
    pub fn sort(
        mut self,
        entity_id: EntityId,
        field_id: FieldId,
        direction: SortDirection,
    ) -> Self {
        self.sort_config.push(SortConfig {
            entity_id,
            field_id,
            direction,
            join_alias: None,
        });
        self
    }

    /// Add a sort term on the join with the given qualifier
    pub fn sort_on(
        mut self,
        join_alias: impl Into<String>,
        entity_id: EntityId,
        field_id: FieldId,
        direction: SortDirection,
    ) -> Self {
        self.sort_config.push(SortConfig {
            entity_id,
            field_id,
            direction,
            join_alias: Some(join_alias.into()),
        });
        self
    }

    /// Request a page
    pub fn paginate(mut self, page: i64, size: i64) -> Self {
        self.pagination = Some(Pagination { page, size });
        self
    }

    // ========================================================================
    // Query methods
    // ========================================================================

    /// Relation ids in join order
    pub fn relation_ids(&self) -> Vec<RelationId> {
        self.join_configs.iter().map(|j| j.relation_id).collect()
    }

    /// Entity ids named directly by select / filter / sort entries (in order, deduplicated)
    pub fn referenced_entity_ids(&self) -> Vec<EntityId> {
        let mut ids = vec![self.main_entity_id];
        let named = self
            .select_fields
            .iter()
            .map(|s| s.entity_id)
            .chain(self.filter_conditions.iter().map(|f| f.entity_id))
            .chain(self.sort_config.iter().map(|s| s.entity_id));
        for id in named {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        ids
    }

    /// Whether any condition is attached with OR
    pub fn uses_or(&self) -> bool {
        self.filter_conditions
            .iter()
            .skip(1)
            .any(|c| c.connective() == LogicalOperator::Or)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_config_from_json_wire_names() {
        let main = Uuid::new_v4();
        let rel = Uuid::new_v4();
        let field = Uuid::new_v4();
        let json = format!(
            r#"{{
                "mainEntityId": "{main}",
                "joinConfigs": [{{ "relationId": "{rel}", "joinType": "LEFT" }}],
                "selectFields": [{{ "entityId": "{main}", "fieldId": "{field}", "aggregation": "COUNT" }}],
                "filterConditions": [
                    {{ "entityId": "{main}", "fieldId": "{field}", "operator": "not_in", "value": [1, 2] }},
                    {{ "entityId": "{main}", "fieldId": "{field}", "operator": "is_null", "logicalOperator": "OR" }}
                ],
                "sortConfig": [{{ "entityId": "{main}", "fieldId": "{field}", "direction": "DESC" }}],
                "pagination": {{ "page": 2, "size": 25 }}
            }}"#
        );

        let config = JoinQueryConfig::from_json(&json).unwrap();
        assert_eq!(config.join_configs[0].join_type, JoinType::Left);
        assert_eq!(config.select_fields[0].aggregation, Some(Aggregation::Count));
        assert_eq!(config.filter_conditions[0].operator, FilterOperator::NotIn);
        assert!(config.filter_conditions[1].value.is_null());
        assert_eq!(config.sort_config[0].direction, SortDirection::Desc);
        assert_eq!(config.pagination.map(|p| p.offset()), Some(25));
        assert!(config.uses_or());
    }

    #[test]
    fn test_config_rejects_unknown_spellings() {
        let main = Uuid::new_v4();
        let field = Uuid::new_v4();
        let bad_op = format!(
            r#"{{ "mainEntityId": "{main}",
                 "filterConditions": [{{ "entityId": "{main}", "fieldId": "{field}", "operator": "contains", "value": 1 }}] }}"#
        );
        assert!(JoinQueryConfig::from_json(&bad_op).is_err());

        let bad_join = format!(
            r#"{{ "mainEntityId": "{main}", "joinConfigs": [{{ "relationId": "{field}", "joinType": "OUTER" }}] }}"#
        );
        assert!(JoinQueryConfig::from_json(&bad_join).is_err());
    }

    #[test]
    fn test_builder_and_referenced_ids() {
        let (user, order) = (Uuid::new_v4(), Uuid::new_v4());
        let (f1, f2) = (Uuid::new_v4(), Uuid::new_v4());
        let config = JoinQueryConfig::new(user)
            .join(Uuid::new_v4(), JoinType::Inner)
            .select(user, f1)
            .select_as(order, f2, "total")
            .filter(FilterCondition::new(user, f1, FilterOperator::Eq, 1))
            .sort(order, f2, SortDirection::Asc)
            .paginate(3, 10);

        assert_eq!(config.referenced_entity_ids(), vec![user, order]);
        assert_eq!(config.pagination.unwrap().offset(), 20);
        assert!(!config.uses_or());
    }

    #[test]
    fn test_offset_never_overflows() {
        let page = Pagination {
            page: i64::MAX,
            size: 10,
        };
        assert_eq!(page.checked_offset(), None);
        assert_eq!(page.offset(), i64::MAX);

        let page = Pagination { page: 3, size: 10 };
        assert_eq!(page.checked_offset(), Some(20));
        assert_eq!(Pagination { page: i64::MIN, size: 1 }.checked_offset(), None);
    }

    #[test]
    fn test_join_alias_wire_name() {
        let (e, f) = (Uuid::new_v4(), Uuid::new_v4());
        let approver_unset =
            FilterCondition::new(e, f, FilterOperator::IsNull, ConfigValue::Null).on("approver");
        let config = JoinQueryConfig::new(e)
            .select_on("approver", e, f)
            .filter(approver_unset)
            .sort_on("approver", e, f, SortDirection::Desc);

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["selectFields"][0]["joinAlias"], "approver");
        assert_eq!(json["filterConditions"][0]["joinAlias"], "approver");
        assert_eq!(json["sortConfig"][0]["joinAlias"], "approver");
        assert!(json["selectFields"][0].get("alias").is_none());
        assert_eq!(default_alias("approver", "name"), "approver_name");
    }

    #[test]
    fn test_first_condition_connective_is_ignored() {
        let e = Uuid::new_v4();
        let f = Uuid::new_v4();
        let config = JoinQueryConfig::new(e)
            .filter(FilterCondition::new(e, f, FilterOperator::Eq, 1).or());
        assert!(!config.uses_or());
    }

    #[test]
    fn test_operator_helpers() {
        assert_eq!(FilterOperator::Ne.comparison_sql(), Some("!="));
        assert_eq!(FilterOperator::Like.comparison_sql(), None);
        assert!(FilterOperator::Between.takes_list());
        assert!(FilterOperator::IsNotNull.takes_no_value());
        assert!(Aggregation::Avg.requires_numeric());
        assert!(!Aggregation::Max.requires_numeric());
        assert!(JoinType::Full.joined_side_optional());
        assert!(JoinType::Full.existing_side_optional());
        assert!(!JoinType::Inner.joined_side_optional());
    }
}
