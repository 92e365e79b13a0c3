//! # Schema DDL
//!
//! CREATE TABLE statements for entities plus the constraints relations
//! imply:
//!
//! - non-many-to-many relations put a foreign key on the side that carries
//!   the key column and index it when the relation is `indexed`
//! - many-to-many relations get a junction table with a composite primary
//!   key and one cascading foreign key per side
//!
//! SQLite cannot add constraints to an existing table, so for SQLite the
//! foreign keys are inlined by [`catalog_ddl`] and [`relation_statements`]
//! only emits the junction table and indexes.

use metaquery_core::{DatabaseType, ReferentialAction, RelationType};
use metaquery_ir::{Entity, Field, RelationWithEndpoints, SchemaCatalog};
use std::collections::HashSet;

/// A foreign key constraint
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKey {
    pub name: String,
    pub table: String,
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
    pub on_delete: ReferentialAction,
    pub on_update: ReferentialAction,
}

impl ForeignKey {
    /// Constraint clause, without a leading `ADD`
    pub fn clause(&self) -> String {
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {}",
            self.name,
            self.column,
            self.ref_table,
            self.ref_column,
            self.on_delete.to_sql(),
            self.on_update.to_sql()
        )
    }

    pub fn alter_statement(&self) -> String {
        format!("ALTER TABLE {} ADD {};", self.table, self.clause())
    }
}

/// Foreign key implied by a relation. `None` for many-to-many.
pub fn foreign_key(rel: &RelationWithEndpoints) -> Option<ForeignKey> {
    let source = (&rel.source_entity, &rel.source_field);
    let target = (&rel.target_entity, &rel.target_field);

    let (holder, referenced) = match &rel.relation.relation_type {
        RelationType::ManyToMany { .. } => return None,
        RelationType::OneToMany => (target, source),
        RelationType::ManyToOne => (source, target),
        RelationType::OneToOne => {
            if !rel.source_field.primary_key && rel.target_field.primary_key {
                (source, target)
            } else {
                (target, source)
            }
        }
    };

    let (table, column) = (holder.0.table_name.clone(), holder.1.column().to_string());
    Some(ForeignKey {
        name: rel.relation.foreign_key_name(&table, &column),
        ref_table: referenced.0.table_name.clone(),
        ref_column: referenced.1.column().to_string(),
        on_delete: rel.relation.on_delete,
        on_update: rel.relation.on_update,
        table,
        column,
    })
}

// ============================================================================
// Tables
// ============================================================================

/// CREATE TABLE for an entity
pub fn create_table(entity: &Entity, db: DatabaseType) -> String {
    create_table_with(entity, db, &[])
}

fn create_table_with(entity: &Entity, db: DatabaseType, foreign_keys: &[ForeignKey]) -> String {
    let fields = entity.sorted_fields();
    let mut lines: Vec<String> = fields.iter().map(|f| f.column_definition(db)).collect();

    let pk: Vec<&str> = fields
        .iter()
        .filter(|f| f.primary_key)
        .map(|f| f.column())
        .collect();
    if !pk.is_empty() {
        lines.push(format!("PRIMARY KEY ({})", pk.join(", ")));
    }

    for f in fields.iter().filter(|f| f.unique_constraint && !f.primary_key) {
        lines.push(format!("UNIQUE ({})", f.column()));
    }

    for fk in foreign_keys {
        lines.push(fk.clause());
    }

    format!(
        "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
        entity.table_name,
        lines.join(",\n    ")
    )
}

/// CREATE INDEX for every indexed field that is not already a key
pub fn field_indexes(entity: &Entity, db: DatabaseType) -> Vec<String> {
    entity
        .sorted_fields()
        .into_iter()
        .filter(|f| f.indexed && !f.primary_key && !f.unique_constraint)
        .map(|f| {
            let name = format!("idx_{}_{}", entity.table_name, f.column());
            create_index(db, &name, &entity.table_name, f.column())
        })
        .collect()
}

fn create_index(db: DatabaseType, name: &str, table: &str, column: &str) -> String {
    // MySQL has no IF NOT EXISTS for indexes
    let guard = if db == DatabaseType::MySQL { "" } else { "IF NOT EXISTS " };
    format!("CREATE INDEX {}{} ON {} ({});", guard, name, table, column)
}

// ============================================================================
// Relations
// ============================================================================

/// Statements a relation adds on top of its endpoint tables
pub fn relation_statements(rel: &RelationWithEndpoints, db: DatabaseType) -> Vec<String> {
    if let RelationType::ManyToMany { join_table } = &rel.relation.relation_type {
        let fk = |column: &str, entity: &Entity, field: &Field| ForeignKey {
            name: rel.relation.foreign_key_name(&join_table.table_name, column),
            table: join_table.table_name.clone(),
            column: column.to_string(),
            ref_table: entity.table_name.clone(),
            ref_column: field.column().to_string(),
            on_delete: ReferentialAction::Cascade,
            on_update: ReferentialAction::Cascade,
        };
        let source_fk = fk(&join_table.source_column, &rel.source_entity, &rel.source_field);
        let target_fk = fk(&join_table.target_column, &rel.target_entity, &rel.target_field);

        let lines = [
            format!(
                "{} {} NOT NULL",
                join_table.source_column,
                rel.source_field.sql_type(db)
            ),
            format!(
                "{} {} NOT NULL",
                join_table.target_column,
                rel.target_field.sql_type(db)
            ),
            format!(
                "PRIMARY KEY ({}, {})",
                join_table.source_column, join_table.target_column
            ),
            source_fk.clause(),
            target_fk.clause(),
        ];
        return vec![format!(
            "CREATE TABLE IF NOT EXISTS {} (\n    {}\n);",
            join_table.table_name,
            lines.join(",\n    ")
        )];
    }

    let Some(fk) = foreign_key(rel) else {
        return Vec::new();
    };

    let mut statements = Vec::new();
    if db != DatabaseType::SQLite {
        statements.push(fk.alter_statement());
    }
    if rel.relation.indexed {
        let name = rel.relation.index_name(&fk.table, &fk.column);
        statements.push(create_index(db, &name, &fk.table, &fk.column));
    }
    statements
}

// ============================================================================
// Catalog
// ============================================================================

/// Full schema of a catalog: tables, junction tables, constraints, indexes
pub fn catalog_ddl(catalog: &SchemaCatalog, db: DatabaseType) -> Vec<String> {
    let relations: Vec<RelationWithEndpoints> = catalog
        .relations()
        .into_iter()
        .filter_map(|r| catalog.with_endpoints(r.id))
        .collect();
    let foreign_keys: Vec<ForeignKey> = relations.iter().filter_map(foreign_key).collect();

    let mut statements = Vec::new();
    for entity in catalog.entities() {
        if db == DatabaseType::SQLite {
            let inline: Vec<ForeignKey> = foreign_keys
                .iter()
                .filter(|fk| fk.table == entity.table_name)
                .cloned()
                .collect();
            statements.push(create_table_with(entity, db, &inline));
        } else {
            statements.push(create_table(entity, db));
        }
    }

    let mut seen = HashSet::new();
    let mut indexes = Vec::new();
    for rel in &relations {
        for stmt in relation_statements(rel, db) {
            if stmt.starts_with("CREATE INDEX") {
                if seen.insert(stmt.clone()) {
                    indexes.push(stmt);
                }
            } else {
                statements.push(stmt);
            }
        }
    }
    for entity in catalog.entities() {
        for stmt in field_indexes(entity, db) {
            if seen.insert(stmt.clone()) {
                indexes.push(stmt);
            }
        }
    }
    statements.extend(indexes);

    tracing::debug!(statements = statements.len(), database = %db, "Generated catalog DDL");
    statements
}

/// Join statements into one script
pub fn render_script(statements: &[String]) -> String {
    let mut script = statements.join("\n\n");
    script.push('\n');
    script
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use metaquery_ir::testing::ShopFixture;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_create_table() {
        let shop = ShopFixture::new();
        let sql = create_table(&shop.role, DatabaseType::PostgreSQL);
        assert_eq!(
            sql,
            "CREATE TABLE IF NOT EXISTS roles (\n    \
             id UUID NOT NULL,\n    \
             name VARCHAR(255) NOT NULL,\n    \
             PRIMARY KEY (id),\n    \
             UNIQUE (name)\n\
             );"
        );
    }

    #[test]
    fn test_one_to_many_key_lives_on_target() {
        let shop = ShopFixture::new();
        let rel = shop.catalog.with_endpoints(shop.user_orders.id).unwrap();

        let fk = foreign_key(&rel).unwrap();
        assert_eq!(fk.table, "orders");
        assert_eq!(fk.column, "user_id");
        assert_eq!(fk.ref_table, "users");

        let statements = relation_statements(&rel, DatabaseType::PostgreSQL);
        assert_eq!(
            statements[0],
            "ALTER TABLE orders ADD CONSTRAINT fk_orders_user_id FOREIGN KEY (user_id) \
             REFERENCES users (id) ON DELETE RESTRICT ON UPDATE RESTRICT;"
        );
    }

    #[test]
    fn test_many_to_many_junction_table() {
        let shop = ShopFixture::new();
        let rel = shop.catalog.with_endpoints(shop.user_roles.id).unwrap();
        assert!(foreign_key(&rel).is_none());

        let statements = relation_statements(&rel, DatabaseType::MySQL);
        assert_eq!(statements.len(), 1);
        let junction = &statements[0];
        assert!(junction.starts_with("CREATE TABLE IF NOT EXISTS user_role ("));
        assert!(junction.contains("user_id CHAR(36) NOT NULL"));
        assert!(junction.contains("PRIMARY KEY (user_id, role_id)"));
        assert!(junction.contains(
            "CONSTRAINT fk_user_role_role_id FOREIGN KEY (role_id) REFERENCES roles (id) \
             ON DELETE CASCADE ON UPDATE CASCADE"
        ));
    }

    #[test]
    fn test_catalog_ddl_deduplicates_indexes() {
        // orders.user_id is indexed both as a field and through userOrders
        let shop = ShopFixture::new();
        let statements = catalog_ddl(&shop.catalog, DatabaseType::PostgreSQL);
        let index = "CREATE INDEX IF NOT EXISTS idx_orders_user_id ON orders (user_id);";
        assert_eq!(statements.iter().filter(|s| *s == index).count(), 1);
        assert_eq!(
            statements.iter().filter(|s| s.starts_with("CREATE TABLE")).count(),
            4
        );
    }

    #[test]
    fn test_sqlite_inlines_foreign_keys() {
        let shop = ShopFixture::new();
        let statements = catalog_ddl(&shop.catalog, DatabaseType::SQLite);

        assert!(statements.iter().all(|s| !s.starts_with("ALTER TABLE")));
        let orders = statements
            .iter()
            .find(|s| s.starts_with("CREATE TABLE IF NOT EXISTS orders"))
            .unwrap();
        let fk = "CONSTRAINT fk_orders_user_id FOREIGN KEY (user_id) REFERENCES users (id)";
        assert!(orders.contains(fk));
    }
}
