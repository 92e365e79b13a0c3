//! # Metaquery Codegen
//!
//! Join-query synthesis for metaquery.
//!
//! Given a [`JoinQueryConfig`](metaquery_ir::JoinQueryConfig) and a metadata
//! store, the [`Synthesizer`] resolves the referenced entities and relations,
//! validates the configuration, and renders:
//!
//! - **SQL**: one parameterized SELECT with its bound values
//! - **ORM descriptor**: a nested select/include/where/orderBy description
//! - **Type declaration**: the result-row type, in Rust or TypeScript
//! - **Scaffold**: an axum read endpoint plus Markdown documentation
//!
//! The [`ddl`] module renders CREATE TABLE / foreign-key DDL for a catalog.
//!

// ============================================================================
// Modules
// ============================================================================

pub mod context;
pub mod ddl;
pub mod naming;
pub mod orm;
pub mod plan;
pub mod scaffold;
pub mod sql;
pub mod synthesizer;
pub mod types;

// ============================================================================
// Re-exports
// ============================================================================

pub use context::{MetadataResolver, ResolvedContext};
pub use orm::{OrmDescriptor, OrmInclude, OrmSelection};
pub use plan::QueryPlan;
pub use scaffold::Scaffold;
pub use sql::SqlStatement;
pub use synthesizer::{SynthesizedQuery, Synthesizer};
pub use types::TypeDeclaration;

use metaquery_core::DatabaseType;
use metaquery_ir::validation::DEFAULT_MAX_PAGE_SIZE;
use serde::{Deserialize, Serialize};

// ============================================================================
// TypeTarget
// ============================================================================

/// Language of the generated result-row type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TypeTarget {
    #[default]
    Rust,
    TypeScript,
}

impl TypeTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTarget::Rust => "rust",
            TypeTarget::TypeScript => "typescript",
        }
    }
}

impl std::fmt::Display for TypeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TypeTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rust" | "rs" => Ok(TypeTarget::Rust),
            "typescript" | "ts" => Ok(TypeTarget::TypeScript),
            other => Err(format!("unknown type target: {}", other)),
        }
    }
}

// ============================================================================
// SynthesisConfig
// ============================================================================

/// Configuration for the synthesizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisConfig {
    /// Target database (placeholder style and DDL column types)
    pub database: DatabaseType,

    /// Language of the result-row type
    pub type_target: TypeTarget,

    /// Route prefix of the scaffolded endpoint
    pub route_prefix: String,

    /// Page size the endpoint falls back to when the query is not paginated
    pub default_page_size: i64,

    /// Largest page size a query or a request may ask for
    pub max_page_size: i64,

    /// Whether to generate endpoint documentation
    pub generate_docs: bool,

    /// Whether the documentation shows the generated SQL
    pub include_sql_in_docs: bool,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            database: DatabaseType::PostgreSQL,
            type_target: TypeTarget::Rust,
            route_prefix: "api/v1".to_string(),
            default_page_size: 10,
            max_page_size: DEFAULT_MAX_PAGE_SIZE,
            generate_docs: true,
            include_sql_in_docs: true,
        }
    }
}

impl SynthesisConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(mut self, database: DatabaseType) -> Self {
        self.database = database;
        self
    }

    pub fn with_type_target(mut self, target: TypeTarget) -> Self {
        self.type_target = target;
        self
    }

    pub fn with_route_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.route_prefix = prefix.into();
        self
    }

    pub fn with_default_page_size(mut self, size: i64) -> Self {
        self.default_page_size = size;
        self
    }

    pub fn with_max_page_size(mut self, size: i64) -> Self {
        self.max_page_size = size;
        self
    }

    /// Disable documentation generation
    pub fn without_docs(mut self) -> Self {
        self.generate_docs = false;
        self
    }

    /// Keep the SQL out of the documentation
    pub fn without_sql_in_docs(mut self) -> Self {
        self.include_sql_in_docs = false;
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesis_config_default() {
        let config = SynthesisConfig::default();
        assert_eq!(config.database, DatabaseType::PostgreSQL);
        assert_eq!(config.type_target, TypeTarget::Rust);
        assert_eq!(config.route_prefix, "api/v1");
        assert_eq!(config.default_page_size, 10);
        assert_eq!(config.max_page_size, 1000);
        assert!(config.generate_docs);
        assert!(config.include_sql_in_docs);
    }

    #[test]
    fn test_synthesis_config_builder() {
        let config = SynthesisConfig::new()
            .with_database(DatabaseType::SQLite)
            .with_type_target(TypeTarget::TypeScript)
            .with_default_page_size(25)
            .without_sql_in_docs();

        assert_eq!(config.database, DatabaseType::SQLite);
        assert_eq!(config.type_target, TypeTarget::TypeScript);
        assert_eq!(config.default_page_size, 25);
        assert!(config.generate_docs);
        assert!(!config.include_sql_in_docs);
    }

    #[test]
    fn test_synthesis_config_from_toml() {
        let config: SynthesisConfig = toml::from_str(
            r#"
            database = "mysql"
            type_target = "typescript"
            max_page_size = 200
            "#,
        )
        .unwrap();

        assert_eq!(config.database, DatabaseType::MySQL);
        assert_eq!(config.type_target, TypeTarget::TypeScript);
        assert_eq!(config.max_page_size, 200);
        assert_eq!(config.route_prefix, "api/v1");
        assert!(config.generate_docs);
    }

    #[test]
    fn test_type_target_parse() {
        assert_eq!("ts".parse::<TypeTarget>().unwrap(), TypeTarget::TypeScript);
        assert_eq!("Rust".parse::<TypeTarget>().unwrap(), TypeTarget::Rust);
        assert!("go".parse::<TypeTarget>().is_err());
    }
}
