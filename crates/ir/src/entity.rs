//! Entity definitions for the schema metadata model
//!
//! This module contains the `Entity` struct: a user-declared record type with
//! a backing table, its fields, and its DRAFT -> PUBLISHED -> DEPRECATED
//! lifecycle.

use crate::field::Field;
use chrono::{DateTime, Utc};
use metaquery_core::{
    EngineError, EngineResult, EntityId, EntityStatus, FieldId, ProjectId, Validatable,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Version assigned to newly created entities
pub const INITIAL_VERSION: &str = "1.0.0";

// ============================================================================
// Entity
// ============================================================================

/// Represents a data entity (maps to a database table)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    /// Unique identifier for this entity
    pub id: EntityId,

    /// Owning project
    pub project_id: ProjectId,

    /// Entity code, unique within the project (e.g. "user", "orderItem")
    pub code: String,

    /// Human-readable name
    pub name: String,

    /// Database table name
    pub table_name: String,

    /// Free-form grouping
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,

    /// Lifecycle status
    #[serde(default)]
    pub status: EntityStatus,

    /// Schema version of this entity
    #[serde(default = "default_version")]
    pub version: String,

    /// Opaque configuration owned by the metadata-management surface
    #[serde(default)]
    pub config: serde_json::Value,

    /// Fields (columns) in this entity
    #[serde(default)]
    pub fields: Vec<Field>,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_version() -> String {
    INITIAL_VERSION.to_string()
}

impl Entity {
    /// Create a new DRAFT entity.
    ///
    /// The table name is derived from the code.
    pub fn create(
        project_id: ProjectId,
        code: impl Into<String>,
        name: impl Into<String>,
    ) -> EngineResult<Self> {
        let code = code.into();
        let now = Utc::now();
        let entity = Self {
            id: Uuid::new_v4(),
            project_id,
            table_name: Self::generate_table_name(&code),
            code,
            name: name.into(),
            category: None,
            status: EntityStatus::Draft,
            version: default_version(),
            config: serde_json::Value::Null,
            fields: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        entity.validate()?;
        Ok(entity)
    }

    /// Derive a table name from an entity code (camelCase -> snake_case)
    pub fn generate_table_name(code: &str) -> String {
        to_snake_case(code)
    }

    // ========================================================================
    // Builder methods
    // ========================================================================

    /// Set the table name
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    /// Set the category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the opaque configuration
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    /// Add a field using builder pattern
    pub fn with_field(mut self, field: Field) -> EngineResult<Self> {
        self.add_field(field)?;
        Ok(self)
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// DRAFT -> PUBLISHED
    pub fn publish(&mut self) -> EngineResult<()> {
        if self.status != EntityStatus::Draft {
            return Err(self.transition_error(EntityStatus::Published));
        }
        self.status = EntityStatus::Published;
        self.touch();
        Ok(())
    }

    /// DRAFT or PUBLISHED -> DEPRECATED
    pub fn deprecate(&mut self) -> EngineResult<()> {
        if self.status == EntityStatus::Deprecated {
            return Err(self.transition_error(EntityStatus::Deprecated));
        }
        self.status = EntityStatus::Deprecated;
        self.touch();
        Ok(())
    }

    /// Only draft entities may be deleted
    pub fn can_delete(&self) -> bool {
        self.status == EntityStatus::Draft
    }

    fn transition_error(&self, to: EntityStatus) -> EngineError {
        EngineError::InvalidStatusTransition {
            subject: self.code.clone(),
            from: self.status.to_string(),
            to: to.to_string(),
        }
    }

    // ========================================================================
    // Field management
    // ========================================================================

    /// Add a field to the entity, enforcing per-entity code uniqueness
    pub fn add_field(&mut self, field: Field) -> EngineResult<()> {
        let mut field = field;
        field.entity_id = self.id;
        field.validate().map_err(|e| {
            EngineError::field_validation(&self.code, &field.code, e.to_string())
        })?;

        if self.has_field(&field.code) {
            return Err(EngineError::DuplicateField {
                entity: self.code.clone(),
                field: field.code,
            });
        }

        if field.sort_order == 0 {
            field.sort_order = self.fields.len() as i32;
        }
        self.fields.push(field);
        self.touch();
        Ok(())
    }

    /// Remove a field by ID
    pub fn remove_field(&mut self, field_id: FieldId) -> Option<Field> {
        let pos = self.fields.iter().position(|f| f.id == field_id)?;
        self.touch();
        Some(self.fields.remove(pos))
    }

    /// Get a field by ID
    pub fn get_field(&self, field_id: FieldId) -> Option<&Field> {
        self.fields.iter().find(|f| f.id == field_id)
    }

    /// Get a mutable field by ID
    pub fn get_field_mut(&mut self, field_id: FieldId) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.id == field_id)
    }

    /// Get a field by code
    pub fn get_field_by_code(&self, code: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.code == code)
    }

    /// Check if entity has a field with this code
    pub fn has_field(&self, code: &str) -> bool {
        self.fields.iter().any(|f| f.code == code)
    }

    /// Get the primary key field
    pub fn primary_key(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.primary_key)
    }

    /// Get fields sorted by sort order
    pub fn sorted_fields(&self) -> Vec<&Field> {
        let mut fields: Vec<&Field> = self.fields.iter().collect();
        fields.sort_by_key(|f| f.sort_order);
        fields
    }

    /// Update the modification timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

impl Validatable for Entity {
    fn validate(&self) -> EngineResult<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::entity_validation(
                &self.code,
                "Entity name cannot be empty",
            ));
        }

        if !is_valid_code(&self.code) {
            return Err(EngineError::entity_validation(
                &self.code,
                format!(
                    "Entity code '{}' must start with a letter and contain only letters, digits and underscores",
                    self.code
                ),
            ));
        }

        if self.project_id.is_nil() {
            return Err(EngineError::entity_validation(
                &self.code,
                "Entity must belong to a project",
            ));
        }

        if self.table_name.is_empty() {
            return Err(EngineError::entity_validation(
                &self.code,
                "Table name cannot be empty",
            ));
        }

        for field in &self.fields {
            field.validate().map_err(|e| {
                EngineError::field_validation(&self.code, &field.code, e.to_string())
            })?;
        }

        let mut codes = std::collections::HashSet::new();
        for field in &self.fields {
            if !codes.insert(&field.code) {
                return Err(EngineError::DuplicateField {
                    entity: self.code.clone(),
                    field: field.code.clone(),
                });
            }
        }

        Ok(())
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Entity {}

impl std::hash::Hash for Entity {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Convert a camelCase / PascalCase code to snake_case
fn to_snake_case(s: &str) -> String {
    let mut result = String::with_capacity(s.len() + 4);
    let mut prev_was_upper = false;

    for (i, c) in s.chars().enumerate() {
        if c.is_ascii_uppercase() {
            if i > 0 && !prev_was_upper && !result.ends_with('_') {
                result.push('_');
            }
            result.push(c.to_ascii_lowercase());
            prev_was_upper = true;
        } else {
            result.push(c);
            prev_was_upper = false;
        }
    }

    result
}

/// Entity and field codes: an ASCII letter followed by letters, digits or `_`
pub(crate) fn is_valid_code(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use metaquery_core::FieldType;

    fn project() -> ProjectId {
        Uuid::new_v4()
    }

    #[test]
    fn test_entity_create() {
        let entity = Entity::create(project(), "orderItem", "Order Item").unwrap();
        assert_eq!(entity.table_name, "order_item");
        assert_eq!(entity.status, EntityStatus::Draft);
        assert_eq!(entity.version, "1.0.0");
        assert!(entity.fields.is_empty());
    }

    #[test]
    fn test_entity_create_validation() {
        assert!(Entity::create(project(), "9lives", "Cat").is_err());
        assert!(Entity::create(project(), "user-name", "User").is_err());
        assert!(Entity::create(project(), "user", "").is_err());
        assert!(Entity::create(Uuid::nil(), "user", "User").is_err());
    }

    #[test]
    fn test_entity_lifecycle() {
        let mut entity = Entity::create(project(), "user", "User").unwrap();
        assert!(entity.can_delete());

        entity.publish().unwrap();
        assert_eq!(entity.status, EntityStatus::Published);
        assert!(!entity.can_delete());
        assert!(matches!(
            entity.publish(),
            Err(EngineError::InvalidStatusTransition { .. })
        ));

        entity.deprecate().unwrap();
        assert_eq!(entity.status, EntityStatus::Deprecated);
        assert!(entity.deprecate().is_err());
        assert!(entity.publish().is_err());
    }

    #[test]
    fn test_entity_add_field() {
        let mut entity = Entity::create(project(), "user", "User").unwrap();
        entity.add_field(Field::uuid_primary_key()).unwrap();
        entity
            .add_field(Field::create("email", "Email", FieldType::String).unwrap())
            .unwrap();

        let email = entity.get_field_by_code("email").unwrap();
        assert_eq!(email.entity_id, entity.id);
        assert_eq!(email.sort_order, 1);
        assert_eq!(entity.primary_key().map(|f| f.code.as_str()), Some("id"));

        let dup = Field::create("email", "Email 2", FieldType::Text).unwrap();
        assert!(matches!(
            entity.add_field(dup),
            Err(EngineError::DuplicateField { .. })
        ));
    }

    #[test]
    fn test_entity_remove_field() {
        let mut entity = Entity::create(project(), "user", "User").unwrap();
        let field = Field::create("temp", "Temp", FieldType::String).unwrap();
        let field_id = field.id;
        entity.add_field(field).unwrap();

        assert!(entity.remove_field(field_id).is_some());
        assert!(!entity.has_field("temp"));
        assert!(entity.remove_field(field_id).is_none());
    }

    #[test]
    fn test_generate_table_name() {
        assert_eq!(Entity::generate_table_name("user"), "user");
        assert_eq!(Entity::generate_table_name("BlogPost"), "blog_post");
        assert_eq!(Entity::generate_table_name("orderItem"), "order_item");
        assert_eq!(Entity::generate_table_name("user_role"), "user_role");
    }

    #[test]
    fn test_is_valid_code() {
        assert!(is_valid_code("user"));
        assert!(is_valid_code("User_2"));
        assert!(!is_valid_code(""));
        assert!(!is_valid_code("_user"));
        assert!(!is_valid_code("usér"));
        assert!(!is_valid_code("user name"));
    }
}
