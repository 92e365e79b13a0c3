//! # Metaquery Core
//!
//! Core types, traits, and error handling for metaquery.
//!
//! This crate provides the foundational building blocks shared by the
//! metadata model and the query synthesizer:
//!
//! - **Types**: Field and relation kinds, target databases, filter and parameter values
//! - **Traits**: `Validatable`
//! - **Errors**: Unified error handling with `EngineError` and `EngineResult`
//!

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used items at crate root
pub use error::{EngineError, EngineResult, ReferenceRole, ResultExt, Violation, ViolationCode};
pub use traits::Validatable;
pub use types::{
    ConfigValue, DatabaseType, EntityId, EntityStatus, FieldId, FieldType, JoinTableConfig,
    ProjectId, ReferentialAction, RelationId, RelationType, SqlValue,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
