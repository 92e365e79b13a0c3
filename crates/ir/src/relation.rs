//! Relation definitions between entities
//!
//! A `Relation` links a (source entity, source field) pair to a (target
//! entity, target field) pair with a cardinality and a cascade policy.
//! Many-to-many relations carry their junction table inside the relation type.

use chrono::{DateTime, Utc};
use metaquery_core::{
    EngineError, EngineResult, EntityId, FieldId, ProjectId, ReferentialAction, RelationId,
    RelationType, Validatable,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Relation
// ============================================================================

/// Represents a relation between two entities
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    /// Unique identifier for this relation
    pub id: RelationId,

    /// Owning project
    pub project_id: ProjectId,

    /// Human-readable name (e.g. "userOrders")
    pub name: String,

    /// Cardinality
    #[serde(rename = "type")]
    pub relation_type: RelationType,

    /// Source side entity
    pub source_entity_id: EntityId,

    /// Source side field
    pub source_field_id: FieldId,

    /// Target side entity
    pub target_entity_id: EntityId,

    /// Target side field
    pub target_field_id: FieldId,

    /// Referential action on delete
    #[serde(default)]
    pub on_delete: ReferentialAction,

    /// Referential action on update
    #[serde(default)]
    pub on_update: ReferentialAction,

    /// Whether the foreign key column gets an index
    #[serde(default = "default_indexed")]
    pub indexed: bool,

    /// Index name override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_name: Option<String>,

    /// Creation timestamp
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_indexed() -> bool {
    true
}

impl Relation {
    /// Create a new relation between two (entity, field) pairs
    pub fn create(
        project_id: ProjectId,
        name: impl Into<String>,
        relation_type: RelationType,
        source: (EntityId, FieldId),
        target: (EntityId, FieldId),
    ) -> EngineResult<Self> {
        let now = Utc::now();
        let relation = Self {
            id: Uuid::new_v4(),
            project_id,
            name: name.into(),
            relation_type,
            source_entity_id: source.0,
            source_field_id: source.1,
            target_entity_id: target.0,
            target_field_id: target.1,
            on_delete: ReferentialAction::Restrict,
            on_update: ReferentialAction::Restrict,
            indexed: true,
            index_name: None,
            created_at: now,
            updated_at: now,
        };
        relation.validate()?;
        Ok(relation)
    }

    // ========================================================================
    // Builder methods
    // ========================================================================

    /// Set the on-delete action
    pub fn with_on_delete(mut self, action: ReferentialAction) -> Self {
        self.on_delete = action;
        self
    }

    /// Set the on-update action
    pub fn with_on_update(mut self, action: ReferentialAction) -> Self {
        self.on_update = action;
        self
    }

    /// Toggle the foreign key index
    pub fn with_indexed(mut self, indexed: bool) -> Self {
        self.indexed = indexed;
        self
    }

    /// Override the index name
    pub fn with_index_name(mut self, name: impl Into<String>) -> Self {
        self.index_name = Some(name.into());
        self
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Change the cardinality, following the relation type adjacency table.
    ///
    /// Replacing the junction table of a many-to-many relation is always allowed.
    pub fn change_type(&mut self, new_type: RelationType) -> EngineResult<()> {
        let same_kind =
            std::mem::discriminant(&self.relation_type) == std::mem::discriminant(&new_type);
        if !same_kind && !self.relation_type.can_change_to(&new_type) {
            return Err(EngineError::InvalidTypeChange {
                subject: self.name.clone(),
                from: self.relation_type.to_string(),
                to: new_type.to_string(),
            });
        }
        let previous = std::mem::replace(&mut self.relation_type, new_type);
        if let Err(e) = self.validate() {
            self.relation_type = previous;
            return Err(e);
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    // ========================================================================
    // Query methods
    // ========================================================================

    /// Source and target entities are the same
    pub fn is_self_referencing(&self) -> bool {
        self.source_entity_id == self.target_entity_id
    }

    /// Check whether the relation touches an entity on either side
    pub fn touches(&self, entity_id: EntityId) -> bool {
        self.source_entity_id == entity_id || self.target_entity_id == entity_id
    }

    /// Foreign key constraint name for the column that carries the key
    pub fn foreign_key_name(&self, table: &str, column: &str) -> String {
        format!("fk_{}_{}", table, column)
    }

    /// Index name for the column that carries the key
    pub fn index_name(&self, table: &str, column: &str) -> String {
        self.index_name
            .clone()
            .unwrap_or_else(|| format!("idx_{}_{}", table, column))
    }

    fn invalid(&self, msg: impl Into<String>) -> EngineError {
        EngineError::relation_validation(&self.name, msg)
    }
}

impl Validatable for Relation {
    fn validate(&self) -> EngineResult<()> {
        if self.name.trim().is_empty() {
            return Err(self.invalid("Relation name cannot be empty"));
        }

        if self.project_id.is_nil() {
            return Err(self.invalid("Relation must belong to a project"));
        }

        let ids = [
            ("source entity", self.source_entity_id),
            ("source field", self.source_field_id),
            ("target entity", self.target_entity_id),
            ("target field", self.target_field_id),
        ];
        if let Some((role, _)) = ids.iter().find(|(_, id)| id.is_nil()) {
            return Err(self.invalid(format!("Relation {} is required", role)));
        }

        if self.source_entity_id == self.target_entity_id
            && self.source_field_id == self.target_field_id
        {
            return Err(self.invalid("A relation cannot point a field at itself"));
        }

        if let Some(join) = self.relation_type.join_table() {
            let parts = [
                ("table name", &join.table_name),
                ("source column", &join.source_column),
                ("target column", &join.target_column),
            ];
            for (what, value) in parts {
                if value.trim().is_empty() {
                    return Err(self.invalid(format!("Join table {} cannot be empty", what)));
                }
            }
            if join.source_column == join.target_column {
                return Err(self.invalid("Join table columns must differ"));
            }
        }

        Ok(())
    }
}

impl PartialEq for Relation {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Relation {}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use metaquery_core::JoinTableConfig;

    fn ends() -> ((EntityId, FieldId), (EntityId, FieldId)) {
        (
            (Uuid::new_v4(), Uuid::new_v4()),
            (Uuid::new_v4(), Uuid::new_v4()),
        )
    }

    fn m2m() -> RelationType {
        RelationType::ManyToMany {
            join_table: JoinTableConfig::new("user_role", "user_id", "role_id"),
        }
    }

    #[test]
    fn test_relation_create_defaults() {
        let (s, t) = ends();
        let rel = Relation::create(Uuid::new_v4(), "userOrders", RelationType::OneToMany, s, t)
            .unwrap();
        assert_eq!(rel.on_delete, ReferentialAction::Restrict);
        assert_eq!(rel.on_update, ReferentialAction::Restrict);
        assert!(rel.indexed);
        assert!(!rel.is_self_referencing());
        assert!(rel.touches(s.0));
        assert!(rel.touches(t.0));
    }

    #[test]
    fn test_relation_rejects_self_field() {
        let entity = Uuid::new_v4();
        let field = Uuid::new_v4();
        let err = Relation::create(
            Uuid::new_v4(),
            "loop",
            RelationType::OneToOne,
            (entity, field),
            (entity, field),
        )
        .unwrap_err();
        assert!(err.is_validation());

        // Same entity, different fields is a legitimate self-relation
        let rel = Relation::create(
            Uuid::new_v4(),
            "parent",
            RelationType::ManyToOne,
            (entity, Uuid::new_v4()),
            (entity, field),
        )
        .unwrap();
        assert!(rel.is_self_referencing());
    }

    #[test]
    fn test_relation_rejects_missing_ids() {
        let (s, _) = ends();
        let result = Relation::create(
            Uuid::new_v4(),
            "broken",
            RelationType::OneToMany,
            s,
            (Uuid::nil(), Uuid::new_v4()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_relation_join_table_validation() {
        let (s, t) = ends();
        let bad = RelationType::ManyToMany {
            join_table: JoinTableConfig::new("user_role", "", "role_id"),
        };
        assert!(Relation::create(Uuid::new_v4(), "roles", bad, s, t).is_err());
        assert!(Relation::create(Uuid::new_v4(), "roles", m2m(), s, t).is_ok());
    }

    #[test]
    fn test_relation_change_type() {
        let (s, t) = ends();
        let mut rel =
            Relation::create(Uuid::new_v4(), "profile", RelationType::OneToOne, s, t).unwrap();

        assert!(rel.change_type(m2m()).is_err());
        rel.change_type(RelationType::OneToMany).unwrap();
        rel.change_type(m2m()).unwrap();
        assert!(rel.relation_type.is_many_to_many());

        assert!(rel.change_type(RelationType::OneToOne).is_err());
        rel.change_type(RelationType::ManyToMany {
            join_table: JoinTableConfig::new("member", "user_id", "role_id"),
        })
        .unwrap();
        assert_eq!(
            rel.relation_type.join_table().map(|j| j.table_name.as_str()),
            Some("member")
        );
    }

    #[test]
    fn test_relation_change_type_keeps_previous_on_invalid_join_table() {
        let (s, t) = ends();
        let mut rel =
            Relation::create(Uuid::new_v4(), "roles", RelationType::OneToMany, s, t).unwrap();
        let bad = RelationType::ManyToMany {
            join_table: JoinTableConfig::new("user_role", "x", "x"),
        };
        assert!(rel.change_type(bad).is_err());
        assert_eq!(rel.relation_type, RelationType::OneToMany);
    }

    #[test]
    fn test_key_names() {
        let (s, t) = ends();
        let rel = Relation::create(Uuid::new_v4(), "userOrders", RelationType::OneToMany, s, t)
            .unwrap();
        assert_eq!(rel.foreign_key_name("orders", "user_id"), "fk_orders_user_id");
        assert_eq!(rel.index_name("orders", "user_id"), "idx_orders_user_id");
        let rel = rel.with_index_name("orders_by_user");
        assert_eq!(rel.index_name("orders", "user_id"), "orders_by_user");
    }

    #[test]
    fn test_relation_serde() {
        let (s, t) = ends();
        let rel = Relation::create(Uuid::new_v4(), "roles", m2m(), s, t).unwrap();
        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["type"]["kind"], "MANY_TO_MANY");
        assert_eq!(json["onDelete"], "RESTRICT");
        let back: Relation = serde_json::from_value(json).unwrap();
        assert_eq!(back.relation_type, rel.relation_type);
    }
}
