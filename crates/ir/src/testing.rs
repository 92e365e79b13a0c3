//! Shared test fixtures
//!
//! A small shop schema: `user` (table `users`) has many `order`s (table
//! `orders`) through `order.user_id`, and many `role`s (table `roles`)
//! through the `user_role(user_id, role_id)` junction table.
//!
//! A staff schema where one entity is reached more than once: `employee`
//! (table `employees`) manages other employees through `manager_id`, and
//! each `expense` (table `expenses`) points at two employees, the one who
//! submitted it and the one who approved it.

use crate::catalog::SchemaCatalog;
use crate::entity::Entity;
use crate::field::Field;
use crate::relation::Relation;
use metaquery_core::{FieldId, FieldType, JoinTableConfig, ProjectId, RelationType};
use uuid::Uuid;

/// The shop schema plus handles to every record in it
#[derive(Debug, Clone)]
pub struct ShopFixture {
    pub project_id: ProjectId,
    pub catalog: SchemaCatalog,
    pub user: Entity,
    pub order: Entity,
    pub role: Entity,
    pub user_orders: Relation,
    pub user_roles: Relation,
}

impl ShopFixture {
    /// Build the fixture
    pub fn new() -> Self {
        let project_id = Uuid::new_v4();

        let user = entity(project_id, "user", "User", "users")
            .with_field(Field::uuid_primary_key())
            .and_then(|e| {
                e.with_field(field("name", FieldType::String).with_length(100).required())
            })
            .and_then(|e| e.with_field(field("email", FieldType::String).unique()))
            .and_then(|e| e.with_field(field("age", FieldType::Integer)))
            .and_then(|e| e.with_field(field("active", FieldType::Boolean).with_default(true)))
            .and_then(|e| e.with_field(field("created_at", FieldType::Datetime).required()))
            .expect("user fixture");

        let order = entity(project_id, "order", "Order", "orders")
            .with_field(Field::uuid_primary_key())
            .and_then(|e| e.with_field(field("user_id", FieldType::Uuid).required().indexed()))
            .and_then(|e| e.with_field(field("total", FieldType::Decimal).with_precision(12, 2)))
            .and_then(|e| e.with_field(field("status", FieldType::String).with_length(20)))
            .and_then(|e| e.with_field(field("created_at", FieldType::Datetime).required()))
            .expect("order fixture");

        let role = entity(project_id, "role", "Role", "roles")
            .with_field(Field::uuid_primary_key())
            .and_then(|e| e.with_field(field("name", FieldType::String).required().unique()))
            .expect("role fixture");

        let user_orders = Relation::create(
            project_id,
            "userOrders",
            RelationType::OneToMany,
            (user.id, id_of(&user, "id")),
            (order.id, id_of(&order, "user_id")),
        )
        .expect("userOrders relation");

        let user_roles = Relation::create(
            project_id,
            "userRoles",
            RelationType::ManyToMany {
                join_table: JoinTableConfig::new("user_role", "user_id", "role_id"),
            },
            (user.id, id_of(&user, "id")),
            (role.id, id_of(&role, "id")),
        )
        .expect("userRoles relation");

        let mut catalog = SchemaCatalog::new();
        for e in [&user, &order, &role] {
            catalog.add_entity(e.clone()).expect("fixture entity");
        }
        for r in [&user_orders, &user_roles] {
            catalog.add_relation(r.clone()).expect("fixture relation");
        }

        Self {
            project_id,
            catalog,
            user,
            order,
            role,
            user_orders,
            user_roles,
        }
    }

    /// Id of a field by code. Panics when the fixture has no such field.
    pub fn field(&self, entity: &Entity, code: &str) -> FieldId {
        id_of(entity, code)
    }
}

impl Default for ShopFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// The staff schema plus handles to every record in it
#[derive(Debug, Clone)]
pub struct StaffFixture {
    pub project_id: ProjectId,
    pub catalog: SchemaCatalog,
    pub employee: Entity,
    pub expense: Entity,
    /// ONE_TO_MANY `employee.id -> employee.manager_id`
    pub reports: Relation,
    /// ONE_TO_MANY `employee.id -> expense.submitted_by`
    pub submitted: Relation,
    /// ONE_TO_MANY `employee.id -> expense.approved_by`
    pub approved: Relation,
}

impl StaffFixture {
    /// Build the fixture
    pub fn new() -> Self {
        let project_id = Uuid::new_v4();

        let employee = entity(project_id, "employee", "Employee", "employees")
            .with_field(Field::uuid_primary_key())
            .and_then(|e| e.with_field(field("name", FieldType::String).required()))
            .and_then(|e| e.with_field(field("manager_id", FieldType::Uuid).indexed()))
            .expect("employee fixture");

        let expense = entity(project_id, "expense", "Expense", "expenses")
            .with_field(Field::uuid_primary_key())
            .and_then(|e| e.with_field(field("amount", FieldType::Decimal).with_precision(10, 2)))
            .and_then(|e| e.with_field(field("submitted_by", FieldType::Uuid).required()))
            .and_then(|e| e.with_field(field("approved_by", FieldType::Uuid)))
            .expect("expense fixture");

        let employee_id = id_of(&employee, "id");
        let one_to_many = |name: &str, target: (&Entity, &str)| {
            Relation::create(
                project_id,
                name,
                RelationType::OneToMany,
                (employee.id, employee_id),
                (target.0.id, id_of(target.0, target.1)),
            )
            .expect("staff relation")
        };
        let reports = one_to_many("reports", (&employee, "manager_id"));
        let submitted = one_to_many("submitted", (&expense, "submitted_by"));
        let approved = one_to_many("approved", (&expense, "approved_by"));

        let mut catalog = SchemaCatalog::new();
        for e in [&employee, &expense] {
            catalog.add_entity(e.clone()).expect("fixture entity");
        }
        for r in [&reports, &submitted, &approved] {
            catalog.add_relation(r.clone()).expect("fixture relation");
        }

        Self {
            project_id,
            catalog,
            employee,
            expense,
            reports,
            submitted,
            approved,
        }
    }

    /// Id of a field by code. Panics when the fixture has no such field.
    pub fn field(&self, entity: &Entity, code: &str) -> FieldId {
        id_of(entity, code)
    }
}

impl Default for StaffFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn entity(project_id: ProjectId, code: &str, name: &str, table: &str) -> Entity {
    Entity::create(project_id, code, name)
        .expect("fixture entity")
        .with_table_name(table)
}

fn field(code: &str, field_type: FieldType) -> Field {
    Field::create(code, code, field_type).expect("fixture field")
}

fn id_of(entity: &Entity, code: &str) -> FieldId {
    entity
        .get_field_by_code(code)
        .map(|f| f.id)
        .unwrap_or_else(|| panic!("fixture entity '{}' has no field '{}'", entity.code, code))
}
