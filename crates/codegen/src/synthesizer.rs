//! # Synthesizer
//!
//! The single entry point callers use: resolve the metadata a join query
//! refers to, validate it, build the plan and render every artifact.
//!
//! Any failure before rendering aborts the call, so a caller either gets all
//! four artifacts or an error.

use crate::SynthesisConfig;
use crate::context::{MetadataResolver, ResolvedContext};
use crate::orm::{OrmDescriptor, generate_orm};
use crate::plan::QueryPlan;
use crate::scaffold::{Scaffold, generate_scaffold};
use crate::sql::{SqlStatement, generate_sql};
use crate::types::{TypeDeclaration, generate_types};
use metaquery_core::EngineResult;
use metaquery_ir::{ConfigValidator, JoinQueryConfig, MetadataStore};
use serde::Serialize;
use tracing::info;

/// Everything generated for one join query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizedQuery {
    pub sql: SqlStatement,
    pub orm: OrmDescriptor,
    pub type_declaration: TypeDeclaration,
    pub scaffold: Scaffold,
}

/// Join-query synthesizer
#[derive(Debug, Clone, Default)]
pub struct Synthesizer {
    config: SynthesisConfig,
    resolver: MetadataResolver,
}

impl Synthesizer {
    pub fn new(config: SynthesisConfig) -> Self {
        Self {
            config,
            resolver: MetadataResolver::new(),
        }
    }

    pub fn config(&self) -> &SynthesisConfig {
        &self.config
    }

    /// Validator configured for the target database and page limit
    pub fn validator(&self) -> ConfigValidator {
        ConfigValidator::new(self.config.database).with_max_page_size(self.config.max_page_size)
    }

    /// Resolve, validate and generate
    pub async fn synthesize<S>(
        &self,
        store: &S,
        query: &JoinQueryConfig,
    ) -> EngineResult<SynthesizedQuery>
    where
        S: MetadataStore + ?Sized,
    {
        let ctx = self.resolver.resolve(store, query).await?;
        self.synthesize_resolved(query, &ctx)
    }

    /// Validate and generate against an already resolved context
    pub fn synthesize_resolved(
        &self,
        query: &JoinQueryConfig,
        ctx: &ResolvedContext,
    ) -> EngineResult<SynthesizedQuery> {
        ctx.check_references(query)?;
        let validated = self.validator().validate(query, ctx)?;
        let plan = QueryPlan::build(&validated, ctx)?;

        info!(
            main_entity = %plan.main.code,
            database = %plan.database,
            "Synthesizing join query"
        );

        let sql = generate_sql(&plan);
        let orm = generate_orm(&plan);
        let type_declaration = generate_types(&plan, self.config.type_target);
        let scaffold = generate_scaffold(&plan, &sql, &type_declaration, &self.config);

        Ok(SynthesizedQuery {
            sql,
            orm,
            type_declaration,
            scaffold,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TypeTarget;
    use metaquery_core::EngineError;
    use metaquery_core::{ConfigValue, DatabaseType, ReferenceRole, ViolationCode};
    use metaquery_ir::testing::{ShopFixture, StaffFixture};
    use metaquery_ir::{Aggregation, FilterCondition, FilterOperator, JoinType, SortDirection};
    use pretty_assertions::assert_eq;

    fn scenario_a(shop: &ShopFixture) -> JoinQueryConfig {
        let u = shop.user.id;
        JoinQueryConfig::new(u)
            .join(shop.user_orders.id, JoinType::Left)
            .select(u, shop.field(&shop.user, "id"))
            .select(shop.order.id, shop.field(&shop.order, "total"))
            .filter(FilterCondition::new(
                u,
                shop.field(&shop.user, "name"),
                FilterOperator::Like,
                "a",
            ))
            .sort(u, shop.field(&shop.user, "id"), SortDirection::Asc)
            .paginate(1, 10)
    }

    #[tokio::test]
    async fn test_scenario_a_one_to_many() {
        let shop = ShopFixture::new();
        let out = Synthesizer::default()
            .synthesize(&shop.catalog, &scenario_a(&shop))
            .await
            .unwrap();

        let sql = &out.sql.text;
        assert!(sql.contains("LEFT JOIN orders"));
        assert!(sql.contains("WHERE users.name LIKE"));
        assert!(sql.contains("ORDER BY users.id ASC"));
        assert!(sql.contains("LIMIT 10"));
        assert!(sql.contains("ON users.id = orders.user_id"));
        assert_eq!(out.type_declaration.name, "UserJoinRow");
        assert_eq!(out.scaffold.route, "/api/v1/user-join");
        assert!(out.scaffold.docs.is_some());
    }

    #[tokio::test]
    async fn test_scenario_a_reversed_direction() {
        let shop = ShopFixture::new();
        let config = JoinQueryConfig::new(shop.order.id)
            .join(shop.user_orders.id, JoinType::Inner)
            .select(shop.order.id, shop.field(&shop.order, "id"));

        let out = Synthesizer::default().synthesize(&shop.catalog, &config).await.unwrap();
        assert!(out.sql.text.contains("INNER JOIN users ON orders.user_id = users.id"));
    }

    #[tokio::test]
    async fn test_scenario_b_unconnected_join() {
        let shop = ShopFixture::new();
        let config = JoinQueryConfig::new(shop.order.id)
            .join(shop.user_roles.id, JoinType::Inner)
            .select(shop.order.id, shop.field(&shop.order, "id"));

        let err = Synthesizer::default().synthesize(&shop.catalog, &config).await.unwrap_err();
        assert!(err.is_validation());
        let violation = &err.violations()[0];
        assert_eq!(violation.code, ViolationCode::JoinNotConnected);
        assert_eq!(violation.path, "joinConfigs[0].relationId");
    }

    #[tokio::test]
    async fn test_scenario_c_many_to_many() {
        let shop = ShopFixture::new();
        let config = JoinQueryConfig::new(shop.user.id)
            .join(shop.user_roles.id, JoinType::Inner)
            .select(shop.user.id, shop.field(&shop.user, "name"))
            .select(shop.role.id, shop.field(&shop.role, "name"));

        let out = Synthesizer::default().synthesize(&shop.catalog, &config).await.unwrap();
        let joins: Vec<&str> = out.sql.text.lines().filter(|l| l.contains(" JOIN ")).collect();
        assert_eq!(joins.len(), 2);
        assert_eq!(joins.iter().filter(|l| l.contains("user_role")).count(), 2);
        assert!(joins[0].starts_with("INNER JOIN user_role "));
        assert!(!out.sql.text.contains("JOIN roles ON users."));
    }

    #[tokio::test]
    async fn test_scenario_d_between_with_one_value() {
        let shop = ShopFixture::new();
        let u = shop.user.id;
        let age = shop.field(&shop.user, "age");
        let config = JoinQueryConfig::new(u)
            .select(u, age)
            .filter(FilterCondition::new(u, age, FilterOperator::Between, vec![18]));

        let err = Synthesizer::default().synthesize(&shop.catalog, &config).await.unwrap_err();
        assert!(err.is_bad_config());
        assert!(err.to_string().contains("filterConditions[0]"));
    }

    #[tokio::test]
    async fn test_scenario_e_field_from_other_entity() {
        let shop = ShopFixture::new();
        let total = shop.field(&shop.order, "total");
        let config = JoinQueryConfig::new(shop.user.id).select(shop.user.id, total);

        let err = Synthesizer::default().synthesize(&shop.catalog, &config).await.unwrap_err();
        match err {
            EngineError::NotFound { role, id } => {
                assert_eq!(role, ReferenceRole::SelectField(0));
                assert_eq!(id, total.to_string());
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_idempotent() {
        let shop = ShopFixture::new();
        let synth = Synthesizer::default();
        let first = synth.synthesize(&shop.catalog, &scenario_a(&shop)).await.unwrap();
        let second = synth.synthesize(&shop.catalog, &scenario_a(&shop)).await.unwrap();

        assert_eq!(first.sql, second.sql);
        assert_eq!(first.orm.to_json_pretty(), second.orm.to_json_pretty());
        assert_eq!(first.type_declaration, second.type_declaration);
        assert_eq!(first.scaffold, second.scaffold);
    }

    #[test]
    fn test_aliases_round_trip() {
        let shop = ShopFixture::new();
        let ctx = ResolvedContext::from_catalog(&shop.catalog);
        let config = JoinQueryConfig::new(shop.user.id)
            .join(shop.user_orders.id, JoinType::Left)
            .join(shop.user_roles.id, JoinType::Inner)
            .select(shop.user.id, shop.field(&shop.user, "id"))
            .select_as(shop.user.id, shop.field(&shop.user, "name"), "userName")
            .select(shop.order.id, shop.field(&shop.order, "status"))
            .select(shop.role.id, shop.field(&shop.role, "name"))
            .aggregate(
                shop.order.id,
                shop.field(&shop.order, "total"),
                Aggregation::Sum,
                Some("spent"),
            );
        let out = Synthesizer::default().synthesize_resolved(&config, &ctx).unwrap();

        let select = out.sql.select_clause();
        let orm_aliases = out.orm.aliases();
        for alias in ["user_id", "userName", "order_status", "role_name", "spent"] {
            assert!(out.type_declaration.source.contains(alias));
            assert_eq!(select.matches(&format!(" AS {}", alias)).count(), 1, "{alias}");
            assert_eq!(orm_aliases.iter().filter(|a| **a == alias).count(), 1, "{alias}");
        }
        assert_eq!(orm_aliases.len(), 5);
    }

    #[test]
    fn test_pagination_law() {
        let shop = ShopFixture::new();
        let ctx = ResolvedContext::from_catalog(&shop.catalog);
        let base =
            JoinQueryConfig::new(shop.user.id).select(shop.user.id, shop.field(&shop.user, "id"));
        let synth = Synthesizer::default();

        let paged = synth.synthesize_resolved(&base.clone().paginate(3, 10), &ctx).unwrap();
        assert!(paged.sql.text.ends_with("LIMIT 10 OFFSET 20"));
        assert_eq!(paged.orm.skip, Some(20));

        let unpaged = synth.synthesize_resolved(&base, &ctx).unwrap();
        assert!(!unpaged.sql.text.contains("LIMIT"));
        assert!(!unpaged.sql.text.contains("OFFSET"));
        assert_eq!(unpaged.orm.take, None);

        let err = synth
            .synthesize_resolved(&base.paginate(i64::MAX, 10), &ctx)
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(err.violations()[0].code, ViolationCode::InvalidPagination);
        assert_eq!(err.violations()[0].path, "pagination.page");
    }

    #[tokio::test]
    async fn test_self_relation_and_repeated_entity() {
        let staff = StaffFixture::new();
        let e = staff.employee.id;
        let name = staff.field(&staff.employee, "name");
        let config = JoinQueryConfig::new(e)
            .join_as(staff.reports.id, JoinType::Left, "report")
            .select(e, name)
            .select_on("report", e, name);

        let out = Synthesizer::default().synthesize(&staff.catalog, &config).await.unwrap();
        assert_eq!(
            out.sql.text,
            "SELECT employees.name AS employee_name, report.name AS report_name\n\
             FROM employees\n\
             LEFT JOIN employees AS report ON employees.id = report.manager_id"
        );
        assert_eq!(out.orm.include["report"].relation, "reports");
        assert_eq!(out.orm.include["report"].model, "employee");

        let x = staff.expense.id;
        let config = JoinQueryConfig::new(x)
            .join_as(staff.submitted.id, JoinType::Inner, "submitter")
            .join_as(staff.approved.id, JoinType::Left, "approver")
            .select(x, staff.field(&staff.expense, "amount"))
            .select_on("submitter", e, name)
            .select_on("approver", e, name)
            .filter(FilterCondition::new(e, name, FilterOperator::Eq, "Ada").on("approver"));
        let out = Synthesizer::default().synthesize(&staff.catalog, &config).await.unwrap();
        assert!(out.sql.text.contains(
            "INNER JOIN employees AS submitter ON expenses.submitted_by = submitter.id\n\
             LEFT JOIN employees AS approver ON expenses.approved_by = approver.id\n\
             WHERE approver.name = $1"
        ));
        assert_eq!(out.orm.aliases(), vec!["expense_amount", "approver_name", "submitter_name"]);
    }

    #[test]
    fn test_config_drives_artifacts() {
        let shop = ShopFixture::new();
        let ctx = ResolvedContext::from_catalog(&shop.catalog);
        let config = SynthesisConfig::default()
            .with_database(DatabaseType::MySQL)
            .with_type_target(TypeTarget::TypeScript)
            .with_max_page_size(50)
            .without_docs();
        let synth = Synthesizer::new(config);

        let out = synth.synthesize_resolved(&scenario_a(&shop), &ctx).unwrap();
        assert!(out.sql.text.contains("WHERE users.name LIKE ?"));
        assert!(out.type_declaration.source.starts_with("/**"));
        assert!(out.scaffold.docs.is_none());

        let too_big = scenario_a(&shop).paginate(1, 51);
        let err = synth.synthesize_resolved(&too_big, &ctx).unwrap_err();
        assert_eq!(err.violations()[0].code, ViolationCode::InvalidPagination);

        let null_filter = JoinQueryConfig::new(shop.user.id)
            .select(shop.user.id, shop.field(&shop.user, "id"))
            .filter(FilterCondition::new(
                shop.user.id,
                shop.field(&shop.user, "email"),
                FilterOperator::IsNull,
                ConfigValue::Null,
            ));
        let out = synth.synthesize_resolved(&null_filter, &ctx).unwrap();
        assert!(out.sql.text.ends_with("WHERE users.email IS NULL"));
        assert_eq!(out.sql.param_count(), 0);
    }
}
