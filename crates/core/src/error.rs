//! Error types for metaquery
//!
//! This module provides unified error handling across the engine. Three
//! variants form the request-level taxonomy that callers translate into
//! transport responses:
//!
//! - [`EngineError::NotFound`] - a referenced id does not resolve
//! - [`EngineError::ValidationFailed`] - one or more configuration rules are violated
//! - [`EngineError::BadConfig`] - structurally invalid operator arguments
//!
//! The remaining variants cover metadata-model invariants and infrastructure
//! (store client, file IO, serialization).

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for metaquery
#[derive(Debug, Error)]
pub enum EngineError {
    // ========================================================================
    // Request-level errors
    // ========================================================================
    /// A referenced entity, relation, or field id does not resolve
    #[error("{role} not found: {id}")]
    NotFound { role: ReferenceRole, id: String },

    /// The join-query configuration violates one or more rules
    #[error("Configuration validation failed: {}", summarize(.0))]
    ValidationFailed(Vec<Violation>),

    /// Structurally invalid operator arguments
    #[error("Bad configuration for {condition}: {message}")]
    BadConfig { condition: String, message: String },

    // ========================================================================
    // Metadata model errors
    // ========================================================================
    /// Entity validation failed
    #[error("Entity validation failed for '{entity}': {message}")]
    EntityValidation { entity: String, message: String },

    /// Field validation failed
    #[error("Field validation failed for '{entity}.{field}': {message}")]
    FieldValidation {
        entity: String,
        field: String,
        message: String,
    },

    /// Relation validation failed
    #[error("Relation validation failed for '{relation}': {message}")]
    RelationValidation { relation: String, message: String },

    /// Duplicate entity code within a project
    #[error("Duplicate entity code: '{0}' already exists in this project")]
    DuplicateEntity(String),

    /// Duplicate field code within an entity
    #[error("Duplicate field code: '{field}' already exists in entity '{entity}'")]
    DuplicateField { entity: String, field: String },

    /// Status transition not allowed
    #[error("Cannot move '{subject}' from {from} to {to}")]
    InvalidStatusTransition {
        subject: String,
        from: String,
        to: String,
    },

    /// Type change not allowed by the adjacency table
    #[error("Cannot change type of '{subject}' from {from} to {to}")]
    InvalidTypeChange {
        subject: String,
        from: String,
        to: String,
    },

    /// An entity is still referenced by relations
    #[error("Entity '{entity}' is referenced by {count} relation(s)")]
    ReferencedEntity { entity: String, count: usize },

    // ========================================================================
    // Infrastructure errors
    // ========================================================================
    /// The metadata store client failed
    #[error("Metadata store error: {0}")]
    Store(String),

    /// File IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// File read error
    #[error("Failed to read file '{path}': {message}")]
    FileRead { path: PathBuf, message: String },

    /// File write error
    #[error("Failed to write file '{path}': {message}")]
    FileWrite { path: PathBuf, message: String },

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    JsonSerialization(#[from] serde_json::Error),

    /// Invalid configuration file or option
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal error (should not happen)
    #[error("Internal error: {0}")]
    Internal(String),

    /// Generic error with context
    #[error("{context}: {message}")]
    WithContext { context: String, message: String },
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl EngineError {
    /// Create a not-found error
    pub fn not_found(role: ReferenceRole, id: impl ToString) -> Self {
        EngineError::NotFound {
            role,
            id: id.to_string(),
        }
    }

    /// Create a bad-config error
    pub fn bad_config(condition: impl Into<String>, msg: impl Into<String>) -> Self {
        EngineError::BadConfig {
            condition: condition.into(),
            message: msg.into(),
        }
    }

    /// Create an entity validation error
    pub fn entity_validation(entity: impl Into<String>, msg: impl Into<String>) -> Self {
        EngineError::EntityValidation {
            entity: entity.into(),
            message: msg.into(),
        }
    }

    /// Create a field validation error
    pub fn field_validation(
        entity: impl Into<String>,
        field: impl Into<String>,
        msg: impl Into<String>,
    ) -> Self {
        EngineError::FieldValidation {
            entity: entity.into(),
            field: field.into(),
            message: msg.into(),
        }
    }

    /// Create a relation validation error
    pub fn relation_validation(relation: impl Into<String>, msg: impl Into<String>) -> Self {
        EngineError::RelationValidation {
            relation: relation.into(),
            message: msg.into(),
        }
    }

    /// Create a store error
    pub fn store(msg: impl Into<String>) -> Self {
        EngineError::Store(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        EngineError::Internal(msg.into())
    }

    /// Create an error with context
    pub fn with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        EngineError::WithContext {
            context: context.into(),
            message: msg.into(),
        }
    }

    /// Check if this error is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, EngineError::NotFound { .. })
    }

    /// Check if this error is a configuration or model validation error
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            EngineError::ValidationFailed(_)
                | EngineError::EntityValidation { .. }
                | EngineError::FieldValidation { .. }
                | EngineError::RelationValidation { .. }
        )
    }

    /// Check if this error is a bad-config error
    pub fn is_bad_config(&self) -> bool {
        matches!(self, EngineError::BadConfig { .. })
    }

    /// Violations carried by a `ValidationFailed` error (empty otherwise)
    pub fn violations(&self) -> &[Violation] {
        match self {
            EngineError::ValidationFailed(v) => v,
            _ => &[],
        }
    }

    /// Check if this error is an IO error
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            EngineError::Io(_) | EngineError::FileRead { .. } | EngineError::FileWrite { .. }
        )
    }
}

/// Result type alias using EngineError
pub type EngineResult<T> = Result<T, EngineError>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn with_context<C: Into<String>>(self, context: C) -> EngineResult<T>;
}

impl<T, E: Into<EngineError>> ResultExt<T> for Result<T, E> {
    fn with_context<C: Into<String>>(self, context: C) -> EngineResult<T> {
        self.map_err(|e| {
            let err: EngineError = e.into();
            EngineError::WithContext {
                context: context.into(),
                message: err.to_string(),
            }
        })
    }
}

// ============================================================================
// ReferenceRole
// ============================================================================

/// The role an id plays when it fails to resolve.
///
/// `Entity`, `Field` and `Relation` are plain catalog lookups. The remaining
/// variants name a position inside a join-query configuration; indexed
/// variants point at the position in the corresponding config array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceRole {
    Entity,
    Field,
    Relation,
    MainEntity,
    JoinRelation(usize),
    RelationSourceEntity(usize),
    RelationTargetEntity(usize),
    RelationSourceField(usize),
    RelationTargetField(usize),
    SelectEntity(usize),
    SelectField(usize),
    FilterEntity(usize),
    FilterField(usize),
    SortEntity(usize),
    SortField(usize),
}

impl std::fmt::Display for ReferenceRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferenceRole::Entity => write!(f, "Entity"),
            ReferenceRole::Field => write!(f, "Field"),
            ReferenceRole::Relation => write!(f, "Relation"),
            ReferenceRole::MainEntity => write!(f, "Main entity (mainEntityId)"),
            ReferenceRole::JoinRelation(i) => {
                write!(f, "Join relation (joinConfigs[{}].relationId)", i)
            }
            ReferenceRole::RelationSourceEntity(i) => {
                write!(f, "Source entity of joinConfigs[{}]", i)
            }
            ReferenceRole::RelationTargetEntity(i) => {
                write!(f, "Target entity of joinConfigs[{}]", i)
            }
            ReferenceRole::RelationSourceField(i) => {
                write!(f, "Source field of joinConfigs[{}]", i)
            }
            ReferenceRole::RelationTargetField(i) => {
                write!(f, "Target field of joinConfigs[{}]", i)
            }
            ReferenceRole::SelectEntity(i) => {
                write!(f, "Select entity (selectFields[{}].entityId)", i)
            }
            ReferenceRole::SelectField(i) => {
                write!(f, "Select field (selectFields[{}].fieldId)", i)
            }
            ReferenceRole::FilterEntity(i) => {
                write!(f, "Filter entity (filterConditions[{}].entityId)", i)
            }
            ReferenceRole::FilterField(i) => {
                write!(f, "Filter field (filterConditions[{}].fieldId)", i)
            }
            ReferenceRole::SortEntity(i) => write!(f, "Sort entity (sortConfig[{}].entityId)", i),
            ReferenceRole::SortField(i) => write!(f, "Sort field (sortConfig[{}].fieldId)", i),
        }
    }
}

// ============================================================================
// Violation
// ============================================================================

/// A single configuration rule violation
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    /// Rule that was violated
    pub code: ViolationCode,

    /// Path of the offending config field (e.g. "joinConfigs[1].relationId")
    pub path: String,

    /// Offending value rendered as text
    pub value: String,

    /// Human-readable explanation
    pub message: String,
}

impl Violation {
    /// Create a new violation
    pub fn new(
        code: ViolationCode,
        path: impl Into<String>,
        value: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            code,
            path: path.into(),
            value: value.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} (value: {}, rule: {})",
            self.path,
            self.message,
            self.value,
            self.code.as_str()
        )
    }
}

/// Rules checked by the configuration validator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViolationCode {
    MainEntityMissing,
    JoinNotConnected,
    DuplicateJoinTarget,
    EntityNotInScope,
    UnknownField,
    EmptySelection,
    DuplicateAlias,
    InvalidIdentifier,
    InvalidAggregation,
    InvalidFilterValue,
    InvalidPagination,
    UnsupportedJoinType,
}

impl ViolationCode {
    /// Stable rule name
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationCode::MainEntityMissing => "MAIN_ENTITY_MISSING",
            ViolationCode::JoinNotConnected => "JOIN_NOT_CONNECTED",
            ViolationCode::DuplicateJoinTarget => "DUPLICATE_JOIN_TARGET",
            ViolationCode::EntityNotInScope => "ENTITY_NOT_IN_SCOPE",
            ViolationCode::UnknownField => "UNKNOWN_FIELD",
            ViolationCode::EmptySelection => "EMPTY_SELECTION",
            ViolationCode::DuplicateAlias => "DUPLICATE_ALIAS",
            ViolationCode::InvalidIdentifier => "INVALID_IDENTIFIER",
            ViolationCode::InvalidAggregation => "INVALID_AGGREGATION",
            ViolationCode::InvalidFilterValue => "INVALID_FILTER_VALUE",
            ViolationCode::InvalidPagination => "INVALID_PAGINATION",
            ViolationCode::UnsupportedJoinType => "UNSUPPORTED_JOIN_TYPE",
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_error() {
        let err = EngineError::not_found(ReferenceRole::SelectField(2), "abc");
        assert!(err.is_not_found());
        assert!(!err.is_validation());
        assert_eq!(
            err.to_string(),
            "Select field (selectFields[2].fieldId) not found: abc"
        );
    }

    #[test]
    fn test_validation_failed_lists_every_violation() {
        let err = EngineError::ValidationFailed(vec![
            Violation::new(
                ViolationCode::JoinNotConnected,
                "joinConfigs[0].relationId",
                "r1",
                "Relation does not touch the query",
            ),
            Violation::new(
                ViolationCode::EmptySelection,
                "selectFields",
                "[]",
                "At least one field must be selected",
            ),
        ]);
        assert!(err.is_validation());
        assert_eq!(err.violations().len(), 2);
        let text = err.to_string();
        assert!(text.contains("joinConfigs[0].relationId"));
        assert!(text.contains("EMPTY_SELECTION"));
    }

    #[test]
    fn test_bad_config_error() {
        let err = EngineError::bad_config("filterConditions[0]", "between requires 2 values");
        assert!(err.is_bad_config());
        assert!(err.violations().is_empty());
        assert_eq!(
            err.to_string(),
            "Bad configuration for filterConditions[0]: between requires 2 values"
        );
    }

    #[test]
    fn test_model_errors() {
        let err = EngineError::field_validation("user", "email", "Invalid code");
        assert!(err.is_validation());
        assert_eq!(
            err.to_string(),
            "Field validation failed for 'user.email': Invalid code"
        );

        let err = EngineError::DuplicateField {
            entity: "user".to_string(),
            field: "email".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Duplicate field code: 'email' already exists in entity 'user'"
        );
    }

    #[test]
    fn test_error_with_context() {
        let result: Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "denied",
        ));
        let err = result.with_context("Loading catalog").unwrap_err();
        assert!(err.to_string().starts_with("Loading catalog: IO error"));
    }

    #[test]
    fn test_io_error_classification() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: EngineError = io_err.into();
        assert!(err.is_io());
    }
}
