//! Core types used throughout metaquery
//!
//! This module contains the shared vocabulary of the metadata model and the
//! query engine: identifiers, field and relation kinds, referential actions,
//! target databases, and the two value types that carry filter values from a
//! loose configuration (`ConfigValue`) to a bound SQL parameter (`SqlValue`).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Unique Identifiers
// ============================================================================

/// Type alias for project unique identifiers
pub type ProjectId = uuid::Uuid;

/// Type alias for entity unique identifiers
pub type EntityId = uuid::Uuid;

/// Type alias for field unique identifiers
pub type FieldId = uuid::Uuid;

/// Type alias for relation unique identifiers
pub type RelationId = uuid::Uuid;

// ============================================================================
// Entity Status
// ============================================================================

/// Lifecycle status of an entity. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityStatus {
    #[default]
    Draft,
    Published,
    Deprecated,
}

impl EntityStatus {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityStatus::Draft => "DRAFT",
            EntityStatus::Published => "PUBLISHED",
            EntityStatus::Deprecated => "DEPRECATED",
        }
    }
}

impl std::fmt::Display for EntityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Field Types
// ============================================================================

/// Data types supported for entity fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum FieldType {
    /// Variable-length string (VARCHAR)
    #[default]
    String,
    /// Long-form text content
    Text,
    /// 64-bit signed integer
    Integer,
    /// Fixed-point decimal
    Decimal,
    /// Boolean true/false
    Boolean,
    /// Date without time
    Date,
    /// Date and time
    Datetime,
    /// Time without date
    Time,
    /// UUID
    Uuid,
    /// JSON document
    Json,
}

impl FieldType {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::String => "STRING",
            FieldType::Text => "TEXT",
            FieldType::Integer => "INTEGER",
            FieldType::Decimal => "DECIMAL",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Date => "DATE",
            FieldType::Datetime => "DATETIME",
            FieldType::Time => "TIME",
            FieldType::Uuid => "UUID",
            FieldType::Json => "JSON",
        }
    }

    /// Get all field types
    pub fn all() -> &'static [FieldType] {
        &[
            FieldType::String,
            FieldType::Text,
            FieldType::Integer,
            FieldType::Decimal,
            FieldType::Boolean,
            FieldType::Date,
            FieldType::Datetime,
            FieldType::Time,
            FieldType::Uuid,
            FieldType::Json,
        ]
    }

    /// Types this field type may be changed into
    pub fn allowed_changes(&self) -> &'static [FieldType] {
        match self {
            FieldType::String => &[FieldType::Text],
            FieldType::Text => &[FieldType::String],
            FieldType::Integer => &[FieldType::Decimal],
            FieldType::Decimal => &[FieldType::Integer],
            FieldType::Date => &[FieldType::Datetime],
            FieldType::Datetime => &[FieldType::Date],
            FieldType::Boolean | FieldType::Time | FieldType::Uuid | FieldType::Json => &[],
        }
    }

    /// Check the type-change adjacency table
    pub fn can_change_to(&self, other: FieldType) -> bool {
        self.allowed_changes().contains(&other)
    }

    /// INTEGER or DECIMAL
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldType::Integer | FieldType::Decimal)
    }

    /// STRING or TEXT
    pub fn is_string_like(&self) -> bool {
        matches!(self, FieldType::String | FieldType::Text)
    }

    /// DATE, DATETIME or TIME
    pub fn is_temporal(&self) -> bool {
        matches!(self, FieldType::Date | FieldType::Datetime | FieldType::Time)
    }

    /// Column type for a specific database
    pub fn to_sql_type(
        &self,
        db: DatabaseType,
        length: Option<u32>,
        precision: Option<u8>,
        scale: Option<u8>,
    ) -> String {
        let length = length.unwrap_or(255);
        let precision = precision.unwrap_or(10);
        let scale = scale.unwrap_or(2);
        match db {
            DatabaseType::PostgreSQL => match self {
                FieldType::String => format!("VARCHAR({})", length),
                FieldType::Text => "TEXT".to_string(),
                FieldType::Integer => "INTEGER".to_string(),
                FieldType::Decimal => format!("DECIMAL({},{})", precision, scale),
                FieldType::Boolean => "BOOLEAN".to_string(),
                FieldType::Date => "DATE".to_string(),
                FieldType::Datetime => "TIMESTAMP".to_string(),
                FieldType::Time => "TIME".to_string(),
                FieldType::Uuid => "UUID".to_string(),
                FieldType::Json => "JSONB".to_string(),
            },
            DatabaseType::MySQL => match self {
                FieldType::String => format!("VARCHAR({})", length),
                FieldType::Text => "LONGTEXT".to_string(),
                FieldType::Integer => "INT".to_string(),
                FieldType::Decimal => format!("DECIMAL({},{})", precision, scale),
                FieldType::Boolean => "TINYINT(1)".to_string(),
                FieldType::Date => "DATE".to_string(),
                FieldType::Datetime => "DATETIME".to_string(),
                FieldType::Time => "TIME".to_string(),
                FieldType::Uuid => "CHAR(36)".to_string(),
                FieldType::Json => "JSON".to_string(),
            },
            DatabaseType::SQLite => match self {
                FieldType::Integer | FieldType::Boolean => "INTEGER".to_string(),
                FieldType::Decimal => "NUMERIC".to_string(),
                _ => "TEXT".to_string(),
            },
        }
    }

    /// Convert a loose filter value into the parameter type this column expects.
    ///
    /// Returns a short reason on failure so callers can build a violation.
    pub fn coerce(&self, value: &ConfigValue) -> Result<SqlValue, String> {
        if value.is_null() {
            return Ok(SqlValue::Null);
        }
        match self {
            FieldType::String | FieldType::Text => match value {
                ConfigValue::String(s) => Ok(SqlValue::Text(s.clone())),
                ConfigValue::Int(i) => Ok(SqlValue::Text(i.to_string())),
                ConfigValue::Float(f) => Ok(SqlValue::Text(f.to_string())),
                ConfigValue::Bool(b) => Ok(SqlValue::Text(b.to_string())),
                _ => Err(format!("expected a string for {}", self)),
            },
            FieldType::Integer => match value {
                ConfigValue::Int(i) => Ok(SqlValue::Integer(*i)),
                ConfigValue::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                    Ok(SqlValue::Integer(*f as i64))
                }
                ConfigValue::String(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(SqlValue::Integer)
                    .map_err(|_| format!("'{}' is not an integer", s)),
                _ => Err("expected an integer".to_string()),
            },
            FieldType::Decimal => match value {
                ConfigValue::Int(i) => Ok(SqlValue::Decimal(*i as f64)),
                ConfigValue::Float(f) => Ok(SqlValue::Decimal(*f)),
                ConfigValue::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map(SqlValue::Decimal)
                    .map_err(|_| format!("'{}' is not a number", s)),
                _ => Err("expected a number".to_string()),
            },
            FieldType::Boolean => match value {
                ConfigValue::Bool(b) => Ok(SqlValue::Bool(*b)),
                ConfigValue::Int(0) => Ok(SqlValue::Bool(false)),
                ConfigValue::Int(1) => Ok(SqlValue::Bool(true)),
                ConfigValue::String(s) if s.eq_ignore_ascii_case("true") => {
                    Ok(SqlValue::Bool(true))
                }
                ConfigValue::String(s) if s.eq_ignore_ascii_case("false") => {
                    Ok(SqlValue::Bool(false))
                }
                _ => Err("expected a boolean".to_string()),
            },
            FieldType::Uuid => {
                let s = value.as_str().ok_or("expected a UUID string")?;
                uuid::Uuid::parse_str(s)
                    .map(|id| SqlValue::Text(id.to_string()))
                    .map_err(|_| format!("'{}' is not a valid UUID", s))
            }
            FieldType::Date => {
                let s = value.as_str().ok_or("expected a date string")?;
                chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
                    .map(|_| SqlValue::Text(s.to_string()))
                    .map_err(|_| format!("'{}' is not a date (YYYY-MM-DD)", s))
            }
            FieldType::Datetime => {
                let s = value.as_str().ok_or("expected a datetime string")?;
                let valid = chrono::DateTime::parse_from_rfc3339(s).is_ok()
                    || s.parse::<chrono::NaiveDateTime>().is_ok()
                    || chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").is_ok();
                if valid {
                    Ok(SqlValue::Text(s.to_string()))
                } else {
                    Err(format!("'{}' is not a datetime", s))
                }
            }
            FieldType::Time => {
                let s = value.as_str().ok_or("expected a time string")?;
                let valid = s.parse::<chrono::NaiveTime>().is_ok()
                    || chrono::NaiveTime::parse_from_str(s, "%H:%M").is_ok();
                if valid {
                    Ok(SqlValue::Text(s.to_string()))
                } else {
                    Err(format!("'{}' is not a time (HH:MM[:SS])", s))
                }
            }
            FieldType::Json => Ok(SqlValue::Json(value.to_json())),
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Database Types
// ============================================================================

/// Supported database types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseType {
    #[default]
    PostgreSQL,
    MySQL,
    SQLite,
}

impl DatabaseType {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            DatabaseType::PostgreSQL => "PostgreSQL",
            DatabaseType::MySQL => "MySQL",
            DatabaseType::SQLite => "SQLite",
        }
    }

    /// Bind placeholder for the 1-based parameter position `n`
    pub fn placeholder(&self, n: usize) -> String {
        match self {
            DatabaseType::PostgreSQL => format!("${}", n),
            DatabaseType::MySQL | DatabaseType::SQLite => "?".to_string(),
        }
    }

    /// Placeholder for a value bound as text against a column of `field_type`.
    ///
    /// PostgreSQL does not compare `uuid`, temporal or `jsonb` columns with
    /// text, so those placeholders carry a cast (`$1::uuid`).
    pub fn typed_placeholder(&self, n: usize, field_type: FieldType) -> String {
        let cast = match (self, field_type) {
            (DatabaseType::PostgreSQL, FieldType::Uuid) => "::uuid",
            (DatabaseType::PostgreSQL, FieldType::Date) => "::date",
            (DatabaseType::PostgreSQL, FieldType::Datetime) => "::timestamp",
            (DatabaseType::PostgreSQL, FieldType::Time) => "::time",
            (DatabaseType::PostgreSQL, FieldType::Json) => "::jsonb",
            _ => "",
        };
        format!("{}{}", self.placeholder(n), cast)
    }

    /// Whether FULL OUTER JOIN is available
    pub fn supports_full_join(&self) -> bool {
        !matches!(self, DatabaseType::MySQL)
    }

    /// Get all database types
    pub fn all() -> &'static [DatabaseType] {
        &[
            DatabaseType::PostgreSQL,
            DatabaseType::MySQL,
            DatabaseType::SQLite,
        ]
    }
}

impl std::fmt::Display for DatabaseType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for DatabaseType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(DatabaseType::PostgreSQL),
            "mysql" => Ok(DatabaseType::MySQL),
            "sqlite" => Ok(DatabaseType::SQLite),
            other => Err(format!("unknown database type: {}", other)),
        }
    }
}

// ============================================================================
// Relation Types
// ============================================================================

/// Junction table of a many-to-many relation
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinTableConfig {
    /// Junction table name
    pub table_name: String,
    /// Column referencing the source entity
    pub source_column: String,
    /// Column referencing the target entity
    pub target_column: String,
}

impl JoinTableConfig {
    /// Create a new junction table config
    pub fn new(
        table_name: impl Into<String>,
        source_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        Self {
            table_name: table_name.into(),
            source_column: source_column.into(),
            target_column: target_column.into(),
        }
    }
}

/// Entity relation types.
///
/// The junction table config lives on the many-to-many variant, so a relation
/// has one exactly when it is many-to-many.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RelationType {
    /// One record relates to exactly one other record
    OneToOne,
    /// One record relates to many others (e.g., User has many Orders)
    OneToMany,
    /// Many records relate to one (inverse of OneToMany)
    ManyToOne,
    /// Many-to-many through a junction table
    ManyToMany {
        #[serde(rename = "joinTable")]
        join_table: JoinTableConfig,
    },
}

impl RelationType {
    /// Wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::OneToOne => "ONE_TO_ONE",
            RelationType::OneToMany => "ONE_TO_MANY",
            RelationType::ManyToOne => "MANY_TO_ONE",
            RelationType::ManyToMany { .. } => "MANY_TO_MANY",
        }
    }

    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            RelationType::OneToOne => "One to One",
            RelationType::OneToMany => "One to Many",
            RelationType::ManyToOne => "Many to One",
            RelationType::ManyToMany { .. } => "Many to Many",
        }
    }

    /// Junction table, for many-to-many relations
    pub fn join_table(&self) -> Option<&JoinTableConfig> {
        match self {
            RelationType::ManyToMany { join_table } => Some(join_table),
            _ => None,
        }
    }

    /// Check if this relation goes through a junction table
    pub fn is_many_to_many(&self) -> bool {
        matches!(self, RelationType::ManyToMany { .. })
    }

    /// Check the type-change adjacency table (junction config is not compared)
    pub fn can_change_to(&self, other: &RelationType) -> bool {
        use RelationType::*;
        matches!(
            (self, other),
            (OneToOne, OneToMany)
                | (OneToMany, OneToOne)
                | (OneToMany, ManyToMany { .. })
                | (ManyToMany { .. }, OneToMany)
                | (ManyToOne, OneToOne)
        )
    }

    /// Get the inverse relation type
    pub fn inverse(&self) -> Self {
        match self {
            RelationType::OneToOne => RelationType::OneToOne,
            RelationType::OneToMany => RelationType::ManyToOne,
            RelationType::ManyToOne => RelationType::OneToMany,
            RelationType::ManyToMany { join_table } => RelationType::ManyToMany {
                join_table: join_table.clone(),
            },
        }
    }
}

impl Default for RelationType {
    fn default() -> Self {
        RelationType::OneToMany
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Referential Actions
// ============================================================================

/// Actions for foreign key constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferentialAction {
    /// Delete related records when parent is deleted
    Cascade,
    /// Set foreign key to NULL when parent is deleted
    SetNull,
    /// Prevent deletion if related records exist
    #[default]
    Restrict,
    /// Do nothing (database default)
    NoAction,
}

impl ReferentialAction {
    /// Get SQL keyword
    pub fn to_sql(&self) -> &'static str {
        match self {
            ReferentialAction::Cascade => "CASCADE",
            ReferentialAction::SetNull => "SET NULL",
            ReferentialAction::Restrict => "RESTRICT",
            ReferentialAction::NoAction => "NO ACTION",
        }
    }
}

impl std::fmt::Display for ReferentialAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_sql())
    }
}

// ============================================================================
// Configuration Values
// ============================================================================

/// Dynamic configuration values (filter values, default values)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<ConfigValue>),
    Object(HashMap<String, ConfigValue>),
}

impl ConfigValue {
    /// Try to get as boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Try to get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(v) => Some(*v),
            ConfigValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Try to get as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(v) => Some(v.as_str()),
            _ => None,
        }
    }

    /// Try to get as array
    pub fn as_array(&self) -> Option<&Vec<ConfigValue>> {
        match self {
            ConfigValue::Array(v) => Some(v),
            _ => None,
        }
    }

    /// Check if null
    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    /// Check if numeric (int or float)
    pub fn is_numeric(&self) -> bool {
        matches!(self, ConfigValue::Int(_) | ConfigValue::Float(_))
    }

    /// Check if array
    pub fn is_array(&self) -> bool {
        matches!(self, ConfigValue::Array(_))
    }

    /// Convert into a JSON value
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            ConfigValue::Null => serde_json::Value::Null,
            ConfigValue::Bool(b) => serde_json::Value::Bool(*b),
            ConfigValue::Int(i) => serde_json::Value::from(*i),
            ConfigValue::Float(f) => serde_json::Value::from(*f),
            ConfigValue::String(s) => serde_json::Value::String(s.clone()),
            ConfigValue::Array(items) => {
                serde_json::Value::Array(items.iter().map(ConfigValue::to_json).collect())
            }
            ConfigValue::Object(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }
}

impl Default for ConfigValue {
    fn default() -> Self {
        ConfigValue::Null
    }
}

impl std::fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<i32> for ConfigValue {
    fn from(v: i32) -> Self {
        ConfigValue::Int(v as i64)
    }
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<f64> for ConfigValue {
    fn from(v: f64) -> Self {
        ConfigValue::Float(v)
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::String(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::String(v.to_string())
    }
}

impl<T: Into<ConfigValue>> From<Vec<T>> for ConfigValue {
    fn from(v: Vec<T>) -> Self {
        ConfigValue::Array(v.into_iter().map(Into::into).collect())
    }
}

// ============================================================================
// SQL Values
// ============================================================================

/// A typed bound parameter
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Decimal(f64),
    Text(String),
    Json(serde_json::Value),
}

impl SqlValue {
    /// Literal rendering for documentation. Never used to build SQL text.
    pub fn display_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            SqlValue::Integer(i) => i.to_string(),
            SqlValue::Decimal(d) => d.to_string(),
            SqlValue::Text(s) => format!("'{}'", s.replace('\'', "''")),
            SqlValue::Json(v) => format!("'{}'", v.to_string().replace('\'', "''")),
        }
    }

    /// JSON rendering (example payloads)
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            SqlValue::Null => serde_json::Value::Null,
            SqlValue::Bool(b) => serde_json::Value::Bool(*b),
            SqlValue::Integer(i) => serde_json::Value::from(*i),
            SqlValue::Decimal(d) => serde_json::Value::from(*d),
            SqlValue::Text(s) => serde_json::Value::String(s.clone()),
            SqlValue::Json(v) => v.clone(),
        }
    }
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_literal())
    }
}

// ============================================================================
// Tests
// ============================================================================
