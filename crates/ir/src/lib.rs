//! # Metaquery IR
//!
//! The schema metadata model and the join-query vocabulary.
//!
//! ## Core Concepts
//!
//! - **Entity**: a user-declared record type backed by a table (e.g. `user` → `users`)
//! - **Field**: a typed attribute of an entity that maps to a column
//! - **Relation**: an association between two entities with a cardinality and cascade policy
//! - **JoinQueryConfig**: which entities to join, and what to select, filter, sort and paginate
//! - **MetadataStore**: read access to the metadata, implemented by `SchemaCatalog` in memory
//! - **ConfigValidator**: checks a configuration against resolved metadata
//!

// Module declarations
pub mod catalog;
pub mod entity;
pub mod field;
pub mod query;
pub mod relation;
pub mod serialization;
pub mod store;
pub mod validation;

#[cfg(any(test, feature = "fixtures"))]
pub mod testing;

// Re-export commonly used types at crate root
pub use catalog::SchemaCatalog;
pub use entity::Entity;
pub use field::Field;
pub use query::{
    Aggregation, FilterCondition, FilterOperator, JoinConfig, JoinQueryConfig, JoinType,
    LogicalOperator, Pagination, SelectField, SortConfig, SortDirection, default_alias,
};
pub use relation::Relation;
pub use serialization::{
    CatalogFile, load_catalog, load_catalog_from_str, save_catalog, save_catalog_to_string,
};
pub use store::{MetadataStore, RelationWithEndpoints};
pub use validation::{
    ConfigValidator, SchemaLookup, ValidatedJoin, ValidatedQuery, ValidationReport,
    is_sql_identifier,
};

// Re-export core types that are commonly used with IR
pub use metaquery_core::{
    ConfigValue, DatabaseType, EngineError, EngineResult, EntityId, EntityStatus, FieldId,
    FieldType, JoinTableConfig, ProjectId, ReferentialAction, RelationId, RelationType, SqlValue,
    Validatable,
};

/// Current schema version for catalog snapshots
pub const SCHEMA_VERSION: u32 = 1;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// Prelude Module
// ============================================================================

/// Convenient re-exports for common usage
pub mod prelude {
    pub use crate::{
        Aggregation,
        ConfigValidator,
        ConfigValue,
        DatabaseType,
        EngineError,
        EngineResult,
        // Model
        Entity,
        Field,
        FieldType,
        // Queries
        FilterCondition,
        FilterOperator,
        JoinQueryConfig,
        JoinType,
        MetadataStore,
        Relation,
        RelationType,
        RelationWithEndpoints,
        SchemaCatalog,
        SortDirection,
        Validatable,
    };
}

// ============================================================================
// Tests
// ============================================================================
