//! Join-query validation
//!
//! `ConfigValidator` checks a `JoinQueryConfig` against the records it names
//! and collects every violation in one pass. A successful run yields a
//! `ValidatedQuery`, the only input the synthesizer accepts.
//!
//! Joins are checked in config order. Each relation must touch an entity that
//! is already in scope (the main entity or one brought in by an earlier join),
//! and the entity on its other side joins the scope. When both ends are in
//! scope the join hangs off the one that came in first; a self-relation
//! joins from its source side.
//!
//! An entity may be in scope more than once (a self-relation, or two
//! relations to the same entity). Every occurrence after the first needs a
//! join alias, and select/filter/sort entries reach it through `joinAlias`.
//! Without one they read from the first occurrence.

use crate::entity::Entity;
use crate::field::Field;
use crate::query::{FilterCondition, FilterOperator, JoinQueryConfig, JoinType, default_alias};
use crate::store::RelationWithEndpoints;
use metaquery_core::{
    ConfigValue, DatabaseType, EngineError, EngineResult, EntityId, FieldId, RelationId, Violation,
    ViolationCode,
};
use std::collections::HashSet;

/// Largest page size accepted unless configured otherwise
pub const DEFAULT_MAX_PAGE_SIZE: i64 = 1000;

// ============================================================================
// SchemaLookup
// ============================================================================

/// Read access to already-resolved records
pub trait SchemaLookup {
    fn entity(&self, id: EntityId) -> Option<&Entity>;
    fn relation(&self, id: RelationId) -> Option<&RelationWithEndpoints>;
}

// ============================================================================
// ValidationReport
// ============================================================================

/// Violations collected by a validation run
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Create an empty report
    pub fn ok() -> Self {
        Self::default()
    }

    /// Record a violation
    pub fn add(
        &mut self,
        code: ViolationCode,
        path: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.violations.push(Violation::new(code, path, value, message));
    }

    /// Merge another report into this one
    pub fn merge(&mut self, other: ValidationReport) {
        self.violations.extend(other.violations);
    }

    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    /// Whether a violation with this code was recorded
    pub fn has(&self, code: ViolationCode) -> bool {
        self.violations.iter().any(|v| v.code == code)
    }

    /// Convert to a Result
    pub fn to_result(self) -> EngineResult<()> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(EngineError::ValidationFailed(self.violations))
        }
    }
}

// ============================================================================
// ValidatedQuery
// ============================================================================

/// One join after direction resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedJoin {
    /// Index into `joinConfigs`
    pub index: usize,
    pub relation_id: RelationId,
    pub join_type: JoinType,
    pub alias: Option<String>,
    /// Entity already in scope when the join is applied
    pub near_entity_id: EntityId,
    /// Scope slot of the near entity: 0 is the main entity, `k` the entity of the k-th join
    pub near_slot: usize,
    /// Entity this join brings into scope
    pub far_entity_id: EntityId,
    /// True when the near entity is the relation's source
    pub forward: bool,
    /// Qualifier of the junction table when its own name is already taken
    pub junction_alias: Option<String>,
}

/// A configuration that passed every rule.
///
/// Only `ConfigValidator` constructs this.
#[derive(Debug, Clone)]
pub struct ValidatedQuery {
    config: JoinQueryConfig,
    joins: Vec<ValidatedJoin>,
    aliases: Vec<String>,
    database: DatabaseType,
    scope: Vec<EntityId>,
    qualifiers: Vec<String>,
}

impl ValidatedQuery {
    pub fn config(&self) -> &JoinQueryConfig {
        &self.config
    }

    /// Joins in config order
    pub fn joins(&self) -> &[ValidatedJoin] {
        &self.joins
    }

    /// Final alias of each select field, parallel to `selectFields`
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn database(&self) -> DatabaseType {
        self.database
    }

    /// Entities in scope: main first, then joined entities in join order
    pub fn scope(&self) -> &[EntityId] {
        &self.scope
    }

    /// Table qualifier of each scope slot, parallel to `scope()`
    pub fn qualifiers(&self) -> &[String] {
        &self.qualifiers
    }

    /// Scope slot a select/filter/sort entry reads from
    pub fn slot_of(&self, entity_id: EntityId, join_alias: Option<&str>) -> Option<usize> {
        find_slot(&self.scope, &self.qualifiers, entity_id, join_alias)
    }

    pub fn into_config(self) -> JoinQueryConfig {
        self.config
    }
}

// ============================================================================
// ConfigValidator
// ============================================================================

/// Validates join-query configurations
#[derive(Debug, Clone, Copy)]
pub struct ConfigValidator {
    database: DatabaseType,
    max_page_size: i64,
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new(DatabaseType::default())
    }
}

impl ConfigValidator {
    /// Create a validator for the target database
    pub fn new(database: DatabaseType) -> Self {
        Self {
            database,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }

    pub fn with_max_page_size(mut self, max_page_size: i64) -> Self {
        self.max_page_size = max_page_size;
        self
    }

    /// Validate and return the proof object, or every violation found
    pub fn validate(
        &self,
        config: &JoinQueryConfig,
        lookup: &impl SchemaLookup,
    ) -> EngineResult<ValidatedQuery> {
        let mut report = ValidationReport::ok();

        let Some(main) = lookup.entity(config.main_entity_id) else {
            report.add(
                ViolationCode::MainEntityMissing,
                "mainEntityId",
                config.main_entity_id.to_string(),
                "main entity is not in the resolved context",
            );
            return Err(EngineError::ValidationFailed(report.violations));
        };

        let mut scope = Scope::new(main);
        check_identifier(&mut report, "mainEntityId", &main.table_name, "table name");

        let joins = self.check_joins(config, lookup, &mut scope, &mut report);
        let aliases = check_selection(config, lookup, &scope, &mut report);
        check_filters(config, lookup, &scope, &mut report);
        check_sorts(config, lookup, &scope, &mut report);
        self.check_pagination(config, &mut report);

        report.to_result()?;
        tracing::debug!(
            joins = joins.len(),
            fields = aliases.len(),
            "Validated join query"
        );

        Ok(ValidatedQuery {
            config: config.clone(),
            joins,
            aliases,
            database: self.database,
            scope: scope.entities,
            qualifiers: scope.qualifiers,
        })
    }

    fn check_joins(
        &self,
        config: &JoinQueryConfig,
        lookup: &impl SchemaLookup,
        scope: &mut Scope,
        report: &mut ValidationReport,
    ) -> Vec<ValidatedJoin> {
        let mut joins = Vec::with_capacity(config.join_configs.len());

        for (i, join) in config.join_configs.iter().enumerate() {
            let path = format!("joinConfigs[{}].relationId", i);

            if join.join_type == JoinType::Full && !self.database.supports_full_join() {
                report.add(
                    ViolationCode::UnsupportedJoinType,
                    format!("joinConfigs[{}].joinType", i),
                    join.join_type.as_sql(),
                    format!("{} does not support FULL joins", self.database.display_name()),
                );
            }

            let Some(rel) = lookup.relation(join.relation_id) else {
                report.add(
                    ViolationCode::JoinNotConnected,
                    path,
                    join.relation_id.to_string(),
                    "relation is not in the resolved context",
                );
                continue;
            };

            let source = rel.relation.source_entity_id;
            let target = rel.relation.target_entity_id;
            let endpoints = match (scope.first(source), scope.first(target)) {
                (Some(s), Some(t)) if t < s => Some((t, target, source, false)),
                (Some(s), _) => Some((s, source, target, true)),
                (None, Some(t)) => Some((t, target, source, false)),
                (None, None) => None,
            };
            let Some((near_slot, near, far, forward)) = endpoints else {
                report.add(
                    ViolationCode::JoinNotConnected,
                    path,
                    join.relation_id.to_string(),
                    format!(
                        "relation '{}' does not touch the main entity or any joined entity",
                        rel.relation.name
                    ),
                );
                continue;
            };

            let repeated = joins
                .iter()
                .any(|j: &ValidatedJoin| j.relation_id == join.relation_id && j.near_slot == near_slot);
            if repeated {
                report.add(
                    ViolationCode::DuplicateJoinTarget,
                    path,
                    join.relation_id.to_string(),
                    format!(
                        "relation '{}' is already joined from the same entity",
                        rel.relation.name
                    ),
                );
                continue;
            }

            let far_entity = if forward { &rel.target_entity } else { &rel.source_entity };
            let alias_path = format!("joinConfigs[{}].alias", i);
            if join.alias.is_none() && scope.first(far).is_some() {
                report.add(
                    ViolationCode::DuplicateJoinTarget,
                    alias_path,
                    &far_entity.code,
                    format!(
                        "entity '{}' is already in the query; relation '{}' needs a join alias",
                        far_entity.code, rel.relation.name
                    ),
                );
                continue;
            }

            check_identifier(report, &path, &far_entity.table_name, "table name");
            check_identifier(report, &path, rel.source_field.column(), "column name");
            check_identifier(report, &path, rel.target_field.column(), "column name");

            let mut junction_alias = None;
            if let Some(jt) = rel.relation.relation_type.join_table() {
                check_identifier(report, &path, &jt.table_name, "junction table");
                check_identifier(report, &path, &jt.source_column, "junction column");
                check_identifier(report, &path, &jt.target_column, "junction column");
                let junction = match &join.alias {
                    Some(alias) if scope.is_claimed(&jt.table_name) => {
                        let qualified = format!("{}_{}", alias, jt.table_name);
                        junction_alias = Some(qualified.clone());
                        qualified
                    }
                    _ => jt.table_name.clone(),
                };
                if !scope.claim(&junction) {
                    report.add(
                        ViolationCode::DuplicateAlias,
                        &path,
                        &junction,
                        "junction table name collides with a table already in the query",
                    );
                }
            }

            if let Some(alias) = &join.alias {
                check_identifier(report, &alias_path, alias, "alias");
            }
            let qualifier = join
                .alias
                .clone()
                .unwrap_or_else(|| far_entity.table_name.clone());
            if !scope.claim(&qualifier) {
                report.add(
                    ViolationCode::DuplicateAlias,
                    &alias_path,
                    &qualifier,
                    "table qualifier is already used in the query; give this join an alias",
                );
            }
            let include_key = join.alias.as_deref().unwrap_or(&far_entity.code);
            if !scope.include_keys.insert(include_key.to_string()) {
                report.add(
                    ViolationCode::DuplicateAlias,
                    &alias_path,
                    include_key,
                    "alias matches the code of another joined entity",
                );
            }

            scope.push(far, qualifier);
            joins.push(ValidatedJoin {
                index: i,
                relation_id: join.relation_id,
                join_type: join.join_type,
                alias: join.alias.clone(),
                near_entity_id: near,
                near_slot,
                far_entity_id: far,
                forward,
                junction_alias,
            });
        }

        joins
    }

    fn check_pagination(&self, config: &JoinQueryConfig, report: &mut ValidationReport) {
        let Some(page) = &config.pagination else {
            return;
        };
        if page.page < 1 {
            report.add(
                ViolationCode::InvalidPagination,
                "pagination.page",
                page.page.to_string(),
                "page must be at least 1",
            );
        } else if page.size >= 1 && page.checked_offset().is_none() {
            report.add(
                ViolationCode::InvalidPagination,
                "pagination.page",
                page.page.to_string(),
                format!(
                    "page {} of size {} is past the largest row offset",
                    page.page, page.size
                ),
            );
        }
        if page.size < 1 || page.size > self.max_page_size {
            report.add(
                ViolationCode::InvalidPagination,
                "pagination.size",
                page.size.to_string(),
                format!("size must be between 1 and {}", self.max_page_size),
            );
        }
    }
}

// ============================================================================
// Scope
// ============================================================================

/// Entity occurrences in join order, with the qualifier each one is read through
struct Scope {
    entities: Vec<EntityId>,
    qualifiers: Vec<String>,
    /// Every table qualifier in use, junction tables included
    claimed: HashSet<String>,
    include_keys: HashSet<String>,
}

impl Scope {
    fn new(main: &Entity) -> Self {
        Self {
            entities: vec![main.id],
            qualifiers: vec![main.table_name.clone()],
            claimed: HashSet::from([main.table_name.clone()]),
            include_keys: HashSet::new(),
        }
    }

    /// Slot of the first occurrence of an entity
    fn first(&self, id: EntityId) -> Option<usize> {
        self.entities.iter().position(|e| *e == id)
    }

    fn find(&self, id: EntityId, join_alias: Option<&str>) -> Option<usize> {
        find_slot(&self.entities, &self.qualifiers, id, join_alias)
    }

    fn push(&mut self, id: EntityId, qualifier: String) {
        self.entities.push(id);
        self.qualifiers.push(qualifier);
    }

    fn is_claimed(&self, qualifier: &str) -> bool {
        self.claimed.contains(qualifier)
    }

    /// Reserve a table qualifier; false when it is taken
    fn claim(&mut self, qualifier: &str) -> bool {
        self.claimed.insert(qualifier.to_string())
    }
}

/// The occurrence named by `join_alias`, else the first occurrence of the entity
fn find_slot(
    entities: &[EntityId],
    qualifiers: &[String],
    entity_id: EntityId,
    join_alias: Option<&str>,
) -> Option<usize> {
    entities
        .iter()
        .zip(qualifiers)
        .position(|(id, q)| *id == entity_id && join_alias.is_none_or(|alias| alias == q))
}

// ============================================================================
// Field reference checks
// ============================================================================

/// Resolve `(entity, field)` for a select/filter/sort entry, recording violations
fn field_ref<'a>(
    lookup: &'a impl SchemaLookup,
    scope: &Scope,
    report: &mut ValidationReport,
    base: &str,
    entity_id: EntityId,
    field_id: FieldId,
    join_alias: Option<&str>,
) -> Option<(&'a Entity, &'a Field)> {
    if scope.find(entity_id, join_alias).is_none() {
        match join_alias {
            Some(alias) if scope.first(entity_id).is_some() => report.add(
                ViolationCode::EntityNotInScope,
                format!("{}.joinAlias", base),
                alias,
                "no join with this qualifier brings in the entity",
            ),
            _ => report.add(
                ViolationCode::EntityNotInScope,
                format!("{}.entityId", base),
                entity_id.to_string(),
                "entity is neither the main entity nor joined",
            ),
        }
        return None;
    }
    let entity = lookup.entity(entity_id)?;
    match entity.get_field(field_id) {
        Some(field) => {
            check_identifier(report, &format!("{}.fieldId", base), field.column(), "column name");
            Some((entity, field))
        }
        None => {
            report.add(
                ViolationCode::UnknownField,
                format!("{}.fieldId", base),
                field_id.to_string(),
                format!("field is not defined on entity '{}'", entity.code),
            );
            None
        }
    }
}

fn check_selection(
    config: &JoinQueryConfig,
    lookup: &impl SchemaLookup,
    scope: &Scope,
    report: &mut ValidationReport,
) -> Vec<String> {
    if config.select_fields.is_empty() {
        report.add(
            ViolationCode::EmptySelection,
            "selectFields",
            "[]",
            "at least one field must be selected",
        );
    }

    let mut seen = HashSet::new();
    let mut aliases = Vec::with_capacity(config.select_fields.len());

    for (i, select) in config.select_fields.iter().enumerate() {
        let base = format!("selectFields[{}]", i);
        let join_alias = select.join_alias.as_deref();
        let Some((entity, field)) = field_ref(
            lookup,
            scope,
            report,
            &base,
            select.entity_id,
            select.field_id,
            join_alias,
        ) else {
            aliases.push(String::new());
            continue;
        };

        if let Some(agg) = select.aggregation {
            if agg.requires_numeric() && !field.field_type.is_numeric() {
                report.add(
                    ViolationCode::InvalidAggregation,
                    format!("{}.aggregation", base),
                    agg.as_sql(),
                    format!(
                        "{} requires a numeric field, '{}' is {}",
                        agg, field.code, field.field_type
                    ),
                );
            }
        }

        let alias = select
            .alias
            .clone()
            .unwrap_or_else(|| default_alias(join_alias.unwrap_or(&entity.code), &field.code));
        let alias_path = format!("{}.alias", base);
        check_identifier(report, &alias_path, &alias, "alias");
        if !seen.insert(alias.clone()) {
            report.add(
                ViolationCode::DuplicateAlias,
                alias_path,
                &alias,
                "alias is used by more than one selected field",
            );
        }
        aliases.push(alias);
    }

    aliases
}

fn check_filters(
    config: &JoinQueryConfig,
    lookup: &impl SchemaLookup,
    scope: &Scope,
    report: &mut ValidationReport,
) {
    for (i, cond) in config.filter_conditions.iter().enumerate() {
        let base = format!("filterConditions[{}]", i);
        let join_alias = cond.join_alias.as_deref();
        if let Some((_, field)) =
            field_ref(lookup, scope, report, &base, cond.entity_id, cond.field_id, join_alias)
        {
            check_filter_value(report, &format!("{}.value", base), cond, field);
        }
    }
}

fn check_filter_value(
    report: &mut ValidationReport,
    path: &str,
    cond: &FilterCondition,
    field: &Field,
) {
    let mut reject = |message: String| {
        report.add(
            ViolationCode::InvalidFilterValue,
            path,
            cond.value.to_string(),
            message,
        );
    };

    if cond.operator.takes_no_value() {
        return;
    }
    if cond.value.is_null() {
        reject(format!(
            "{} needs a value; use is_null to match missing values",
            cond.operator
        ));
        return;
    }

    match cond.operator {
        FilterOperator::Like => {
            if !field.field_type.is_string_like() {
                reject(format!(
                    "like requires a text field, '{}' is {}",
                    field.code, field.field_type
                ));
            } else if !matches!(cond.value, ConfigValue::String(_)) {
                reject("like requires a string pattern".to_string());
            }
        }
        // Arity of list operators is checked during synthesis
        FilterOperator::In | FilterOperator::NotIn | FilterOperator::Between => {
            let items: Vec<&ConfigValue> = match cond.value.as_array() {
                Some(items) => items.iter().collect(),
                None if cond.operator == FilterOperator::Between => Vec::new(),
                None => vec![&cond.value],
            };
            for item in items {
                if item.is_null() {
                    reject(format!("{} values cannot contain null", cond.operator));
                } else if let Err(reason) = field.field_type.coerce(item) {
                    reject(reason);
                }
            }
        }
        _ => {
            if cond.value.is_array() {
                reject(format!("{} expects a single value", cond.operator));
            } else if let Err(reason) = field.field_type.coerce(&cond.value) {
                reject(reason);
            }
        }
    }
}

fn check_sorts(
    config: &JoinQueryConfig,
    lookup: &impl SchemaLookup,
    scope: &Scope,
    report: &mut ValidationReport,
) {
    for (i, sort) in config.sort_config.iter().enumerate() {
        let base = format!("sortConfig[{}]", i);
        let join_alias = sort.join_alias.as_deref();
        field_ref(lookup, scope, report, &base, sort.entity_id, sort.field_id, join_alias);
    }
}

fn check_identifier(report: &mut ValidationReport, path: &str, ident: &str, what: &str) {
    if !is_sql_identifier(ident) {
        report.add(
            ViolationCode::InvalidIdentifier,
            path,
            ident,
            format!("{} is not a plain SQL identifier", what),
        );
    }
}

/// A letter or `_` followed by letters, digits or `_`
pub fn is_sql_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

// ============================================================================
// Tests
// ============================================================================
