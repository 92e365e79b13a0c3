//! Field definitions for entities
//!
//! A `Field` is a typed attribute of an entity and maps to one table column.

use crate::entity::is_valid_code;
use metaquery_core::{
    ConfigValue, DatabaseType, EngineError, EngineResult, EntityId, FieldId, FieldType, Validatable,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum VARCHAR length accepted for STRING fields
pub const MAX_STRING_LENGTH: u32 = 65_535;

/// Maximum DECIMAL precision
pub const MAX_DECIMAL_PRECISION: u8 = 65;

/// Maximum DECIMAL scale
pub const MAX_DECIMAL_SCALE: u8 = 30;

// ============================================================================
// Field
// ============================================================================

/// Represents a field (column) in an entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Unique identifier for this field
    pub id: FieldId,

    /// Owning entity (set when the field is added to an entity)
    #[serde(default = "Uuid::nil")]
    pub entity_id: EntityId,

    /// Field code, unique within the entity
    pub code: String,

    /// Human-readable name
    pub name: String,

    /// Declared data type
    #[serde(rename = "type")]
    pub field_type: FieldType,

    /// Whether the column accepts NULL
    #[serde(default = "default_nullable")]
    pub nullable: bool,

    /// UNIQUE constraint
    #[serde(default)]
    pub unique_constraint: bool,

    /// Plain index on the column
    #[serde(default)]
    pub indexed: bool,

    /// Part of the primary key
    #[serde(default)]
    pub primary_key: bool,

    /// VARCHAR length (STRING only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,

    /// DECIMAL precision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<u8>,

    /// DECIMAL scale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<u8>,

    /// Column default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<ConfigValue>,

    /// Position within the entity
    #[serde(default)]
    pub sort_order: i32,

    /// Column name override (defaults to the code)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column_name: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl Field {
    /// Create a new field with a validated code
    pub fn create(
        code: impl Into<String>,
        name: impl Into<String>,
        field_type: FieldType,
    ) -> EngineResult<Self> {
        let field = Self {
            id: Uuid::new_v4(),
            entity_id: Uuid::nil(),
            code: code.into(),
            name: name.into(),
            field_type,
            nullable: true,
            unique_constraint: false,
            indexed: false,
            primary_key: false,
            length: None,
            precision: None,
            scale: None,
            default_value: None,
            sort_order: 0,
            column_name: None,
        };
        field.validate()?;
        Ok(field)
    }

    /// Create a UUID primary key field named `id`
    pub fn uuid_primary_key() -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_id: Uuid::nil(),
            code: "id".to_string(),
            name: "ID".to_string(),
            field_type: FieldType::Uuid,
            nullable: false,
            unique_constraint: false,
            indexed: false,
            primary_key: true,
            length: None,
            precision: None,
            scale: None,
            default_value: None,
            sort_order: 0,
            column_name: None,
        }
    }

    // ========================================================================
    // Builder methods
    // ========================================================================

    /// Mark as NOT NULL
    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Add a UNIQUE constraint
    pub fn unique(mut self) -> Self {
        self.unique_constraint = true;
        self
    }

    /// Add an index
    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    /// Mark as primary key (implies NOT NULL)
    pub fn primary(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Set the VARCHAR length
    pub fn with_length(mut self, length: u32) -> Self {
        self.length = Some(length);
        self
    }

    /// Set DECIMAL precision and scale
    pub fn with_precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }

    /// Set the column default
    pub fn with_default(mut self, value: impl Into<ConfigValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Override the column name
    pub fn with_column_name(mut self, column: impl Into<String>) -> Self {
        self.column_name = Some(column.into());
        self
    }

    /// Set the position within the entity
    pub fn with_sort_order(mut self, order: i32) -> Self {
        self.sort_order = order;
        self
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Change the declared type, following the type adjacency table.
    ///
    /// Size attributes that no longer apply are cleared.
    pub fn change_type(&mut self, new_type: FieldType) -> EngineResult<()> {
        if self.field_type == new_type {
            return Ok(());
        }
        if !self.field_type.can_change_to(new_type) {
            return Err(EngineError::InvalidTypeChange {
                subject: self.code.clone(),
                from: self.field_type.to_string(),
                to: new_type.to_string(),
            });
        }
        self.field_type = new_type;
        if new_type != FieldType::String {
            self.length = None;
        }
        if new_type != FieldType::Decimal {
            self.precision = None;
            self.scale = None;
        }
        Ok(())
    }

    // ========================================================================
    // Query methods
    // ========================================================================

    /// Column this field maps to
    pub fn column(&self) -> &str {
        self.column_name.as_deref().unwrap_or(&self.code)
    }

    /// Column type for the given database
    pub fn sql_type(&self, db: DatabaseType) -> String {
        self.field_type
            .to_sql_type(db, self.length, self.precision, self.scale)
    }

    /// Render the DDL column definition, e.g. `email VARCHAR(120) NOT NULL`
    pub fn column_definition(&self, db: DatabaseType) -> String {
        let mut def = format!("{} {}", self.column(), self.sql_type(db));
        if !self.nullable {
            def.push_str(" NOT NULL");
        }
        if let Some(default) = &self.default_value {
            if let Ok(value) = self.field_type.coerce(default) {
                def.push_str(&format!(" DEFAULT {}", value.display_literal()));
            }
        }
        def
    }

    fn invalid(&self, msg: impl Into<String>) -> EngineError {
        EngineError::FieldValidation {
            entity: self.entity_id.to_string(),
            field: self.code.clone(),
            message: msg.into(),
        }
    }
}

impl Validatable for Field {
    fn validate(&self) -> EngineResult<()> {
        if !is_valid_code(&self.code) {
            return Err(self.invalid(format!(
                "Field code '{}' must start with a letter and contain only letters, digits and underscores",
                self.code
            )));
        }

        if self.name.trim().is_empty() {
            return Err(self.invalid("Field name cannot be empty"));
        }

        match (self.field_type, self.length) {
            (FieldType::String, Some(len)) if !(1..=MAX_STRING_LENGTH).contains(&len) => {
                return Err(self.invalid(format!(
                    "String length must be between 1 and {}",
                    MAX_STRING_LENGTH
                )));
            }
            (t, Some(_)) if t != FieldType::String => {
                return Err(self.invalid("Length only applies to STRING fields"));
            }
            _ => {}
        }

        if self.field_type == FieldType::Decimal {
            if let Some(p) = self.precision {
                if !(1..=MAX_DECIMAL_PRECISION).contains(&p) {
                    return Err(self.invalid(format!(
                        "Decimal precision must be between 1 and {}",
                        MAX_DECIMAL_PRECISION
                    )));
                }
            }
            if let Some(s) = self.scale {
                if s > MAX_DECIMAL_SCALE {
                    return Err(self.invalid(format!(
                        "Decimal scale must be between 0 and {}",
                        MAX_DECIMAL_SCALE
                    )));
                }
            }
        } else if self.precision.is_some() || self.scale.is_some() {
            return Err(self.invalid("Precision and scale only apply to DECIMAL fields"));
        }

        if self.primary_key && self.nullable {
            return Err(self.invalid("Primary key fields cannot be nullable"));
        }

        if let Some(default) = &self.default_value {
            self.field_type
                .coerce(default)
                .map_err(|reason| self.invalid(format!("Invalid default value: {}", reason)))?;
        }

        Ok(())
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Field {}

// ============================================================================
// Tests
// ============================================================================
