//! In-memory schema catalog
//!
//! `SchemaCatalog` is the root container for schema metadata: every entity
//! (with its fields) and every relation, keyed by id. It enforces the
//! invariants that span more than one record and implements `MetadataStore`
//! so the synthesizer can run against it directly.

use crate::entity::{Entity, is_valid_code};
use crate::field::Field;
use crate::relation::Relation;
use crate::store::{MetadataStore, RelationWithEndpoints};
use async_trait::async_trait;
use metaquery_core::{
    EngineError, EngineResult, EntityId, FieldId, ReferenceRole, RelationId, Validatable,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// SchemaCatalog
// ============================================================================

/// Root container for schema metadata
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaCatalog {
    /// All entities, keyed by ID
    #[serde(default)]
    pub entities: HashMap<EntityId, Entity>,

    /// All relations, keyed by ID
    #[serde(default)]
    pub relations: HashMap<RelationId, Relation>,
}

impl SchemaCatalog {
    /// Create an empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Entity Management
    // ========================================================================

    /// Add an entity. Codes are unique per project.
    pub fn add_entity(&mut self, entity: Entity) -> EngineResult<EntityId> {
        entity.validate()?;
        if self.entities.contains_key(&entity.id) || self.code_taken(&entity, &entity.code) {
            return Err(EngineError::DuplicateEntity(entity.code.clone()));
        }
        let id = entity.id;
        self.entities.insert(id, entity);
        Ok(id)
    }

    /// Add a field to an existing entity
    pub fn add_field(&mut self, entity_id: EntityId, field: Field) -> EngineResult<FieldId> {
        let entity = self
            .entities
            .get_mut(&entity_id)
            .ok_or_else(|| EngineError::not_found(ReferenceRole::Entity, entity_id))?;
        let id = field.id;
        entity.add_field(field)?;
        Ok(id)
    }

    /// Change an entity's code.
    ///
    /// The code is the entity's identity once relations point at it, so the
    /// change is rejected while any relation references the entity.
    pub fn change_entity_code(
        &mut self,
        entity_id: EntityId,
        new_code: impl Into<String>,
    ) -> EngineResult<()> {
        let new_code = new_code.into();
        let entity = self
            .entities
            .get(&entity_id)
            .ok_or_else(|| EngineError::not_found(ReferenceRole::Entity, entity_id))?;

        if entity.code == new_code {
            return Ok(());
        }

        let references = self.relations_for_entity(entity_id).len();
        if references > 0 {
            return Err(EngineError::ReferencedEntity {
                entity: entity.code.clone(),
                count: references,
            });
        }
        if !is_valid_code(&new_code) {
            return Err(EngineError::entity_validation(
                &entity.code,
                format!("Entity code '{}' is not valid", new_code),
            ));
        }
        if self.code_taken(entity, &new_code) {
            return Err(EngineError::DuplicateEntity(new_code));
        }

        if let Some(entity) = self.entities.get_mut(&entity_id) {
            entity.code = new_code;
            entity.touch();
        }
        Ok(())
    }

    /// Remove an entity. Only unreferenced DRAFT entities can be removed.
    pub fn remove_entity(&mut self, entity_id: EntityId) -> EngineResult<Entity> {
        let entity = self
            .entities
            .get(&entity_id)
            .ok_or_else(|| EngineError::not_found(ReferenceRole::Entity, entity_id))?;

        let references = self.relations_for_entity(entity_id).len();
        if references > 0 {
            return Err(EngineError::ReferencedEntity {
                entity: entity.code.clone(),
                count: references,
            });
        }
        if !entity.can_delete() {
            return Err(EngineError::entity_validation(
                &entity.code,
                format!("Only DRAFT entities can be deleted (status is {})", entity.status),
            ));
        }

        self.entities
            .remove(&entity_id)
            .ok_or_else(|| EngineError::internal("entity vanished during removal"))
    }

    /// Get an entity by ID
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get a mutable entity by ID
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Get an entity by code (first match across projects)
    pub fn entity_by_code(&self, code: &str) -> Option<&Entity> {
        self.entities.values().find(|e| e.code == code)
    }

    /// All entities ordered by code
    pub fn entities(&self) -> Vec<&Entity> {
        let mut entities: Vec<&Entity> = self.entities.values().collect();
        entities.sort_by(|a, b| a.code.cmp(&b.code));
        entities
    }

    /// Get the number of entities
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    fn code_taken(&self, entity: &Entity, code: &str) -> bool {
        self.entities
            .values()
            .any(|e| e.id != entity.id && e.project_id == entity.project_id && e.code == code)
    }

    // ========================================================================
    // Relation Management
    // ========================================================================

    /// Add a relation. Its endpoints must exist and each field must belong
    /// to the entity it is paired with.
    pub fn add_relation(&mut self, relation: Relation) -> EngineResult<RelationId> {
        relation.validate()?;
        self.check_endpoints(&relation)?;
        if self.relations.contains_key(&relation.id) {
            return Err(EngineError::relation_validation(
                &relation.name,
                "A relation with this id already exists",
            ));
        }
        let id = relation.id;
        self.relations.insert(id, relation);
        Ok(id)
    }

    /// Remove a relation by ID
    pub fn remove_relation(&mut self, id: RelationId) -> Option<Relation> {
        self.relations.remove(&id)
    }

    /// Get a relation by ID
    pub fn relation(&self, id: RelationId) -> Option<&Relation> {
        self.relations.get(&id)
    }

    /// All relations ordered by name
    pub fn relations(&self) -> Vec<&Relation> {
        let mut relations: Vec<&Relation> = self.relations.values().collect();
        relations.sort_by(|a, b| a.name.cmp(&b.name));
        relations
    }

    /// Get the number of relations
    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// Relations touching an entity on either side
    pub fn relations_for_entity(&self, entity_id: EntityId) -> Vec<&Relation> {
        self.relations
            .values()
            .filter(|r| r.touches(entity_id))
            .collect()
    }

    /// Resolve a relation's endpoint records
    pub fn with_endpoints(&self, id: RelationId) -> Option<RelationWithEndpoints> {
        let relation = self.relations.get(&id)?;
        let source_entity = self.entities.get(&relation.source_entity_id)?;
        let target_entity = self.entities.get(&relation.target_entity_id)?;
        Some(RelationWithEndpoints {
            source_field: source_entity.get_field(relation.source_field_id)?.clone(),
            target_field: target_entity.get_field(relation.target_field_id)?.clone(),
            source_entity: source_entity.clone(),
            target_entity: target_entity.clone(),
            relation: relation.clone(),
        })
    }

    fn check_endpoints(&self, relation: &Relation) -> EngineResult<()> {
        let ends = [
            ("source", relation.source_entity_id, relation.source_field_id),
            ("target", relation.target_entity_id, relation.target_field_id),
        ];
        for (side, entity_id, field_id) in ends {
            let entity = self.entities.get(&entity_id).ok_or_else(|| {
                EngineError::relation_validation(
                    &relation.name,
                    format!("{} entity {} does not exist", side, entity_id),
                )
            })?;
            if entity.project_id != relation.project_id {
                return Err(EngineError::relation_validation(
                    &relation.name,
                    format!("{} entity '{}' belongs to another project", side, entity.code),
                ));
            }
            if entity.get_field(field_id).is_none() {
                return Err(EngineError::relation_validation(
                    &relation.name,
                    format!(
                        "{} field {} does not belong to entity '{}'",
                        side, field_id, entity.code
                    ),
                ));
            }
        }
        Ok(())
    }

    // ========================================================================
    // Utility methods
    // ========================================================================

    /// Check if the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty() && self.relations.is_empty()
    }

    /// Clear all entities and relations
    pub fn clear(&mut self) {
        self.entities.clear();
        self.relations.clear();
    }
}

impl Validatable for SchemaCatalog {
    fn validate(&self) -> EngineResult<()> {
        for entity in self.entities.values() {
            entity.validate()?;
        }

        let mut codes = std::collections::HashSet::new();
        for entity in self.entities.values() {
            if !codes.insert((entity.project_id, &entity.code)) {
                return Err(EngineError::DuplicateEntity(entity.code.clone()));
            }
        }

        for relation in self.relations.values() {
            relation.validate()?;
            self.check_endpoints(relation)?;
        }

        Ok(())
    }
}

// ============================================================================
// MetadataStore
// ============================================================================

#[async_trait]
impl MetadataStore for SchemaCatalog {
    async fn get_entity(&self, id: EntityId) -> EngineResult<Option<Entity>> {
        Ok(self.entities.get(&id).cloned())
    }

    async fn get_relation(&self, id: RelationId) -> EngineResult<Option<RelationWithEndpoints>> {
        Ok(self.with_endpoints(id))
    }

    async fn get_entities_by_ids(&self, ids: &[EntityId]) -> EngineResult<Vec<Entity>> {
        Ok(ids
            .iter()
            .filter_map(|id| self.entities.get(id).cloned())
            .collect())
    }

    async fn get_relations_by_ids(
        &self,
        ids: &[RelationId],
    ) -> EngineResult<Vec<RelationWithEndpoints>> {
        Ok(ids.iter().filter_map(|id| self.with_endpoints(*id)).collect())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ShopFixture;
    use metaquery_core::{FieldType, RelationType};
    use uuid::Uuid;

    #[test]
    fn test_fixture_catalog_is_valid() {
        let shop = ShopFixture::new();
        assert!(shop.catalog.validate().is_ok());
        assert_eq!(shop.catalog.entity_count(), 3);
        assert_eq!(shop.catalog.relation_count(), 2);
        let codes: Vec<&str> = shop.catalog.entities().iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["order", "role", "user"]);
    }

    #[test]
    fn test_duplicate_entity_code_per_project() {
        let mut shop = ShopFixture::new();
        let dup = Entity::create(shop.project_id, "user", "Another User").unwrap();
        assert!(matches!(
            shop.catalog.add_entity(dup),
            Err(EngineError::DuplicateEntity(_))
        ));

        // The same code in another project is fine
        let other = Entity::create(Uuid::new_v4(), "user", "User").unwrap();
        assert!(shop.catalog.add_entity(other).is_ok());
    }

    #[test]
    fn test_relation_endpoints_must_exist_and_match() {
        let mut shop = ShopFixture::new();
        let user_name = shop.field(&shop.user, "name");
        let order_total = shop.field(&shop.order, "total");

        // Field paired with the wrong entity
        let wrong = Relation::create(
            shop.project_id,
            "wrong",
            RelationType::OneToOne,
            (shop.user.id, order_total),
            (shop.order.id, user_name),
        )
        .unwrap();
        let err = shop.catalog.add_relation(wrong).unwrap_err();
        assert!(err.to_string().contains("does not belong"));

        // Unknown entity
        let ghost = Relation::create(
            shop.project_id,
            "ghost",
            RelationType::OneToOne,
            (Uuid::new_v4(), Uuid::new_v4()),
            (shop.order.id, order_total),
        )
        .unwrap();
        assert!(shop.catalog.add_relation(ghost).is_err());
    }

    #[test]
    fn test_referenced_entity_is_protected() {
        let mut shop = ShopFixture::new();
        let err = shop.catalog.change_entity_code(shop.user.id, "member").unwrap_err();
        assert!(matches!(err, EngineError::ReferencedEntity { count: 2, .. }));

        let err = shop.catalog.remove_entity(shop.order.id).unwrap_err();
        assert!(matches!(err, EngineError::ReferencedEntity { count: 1, .. }));

        shop.catalog.remove_relation(shop.user_orders.id);
        shop.catalog.remove_entity(shop.order.id).unwrap();
        assert!(shop.catalog.entity(shop.order.id).is_none());
    }

    #[test]
    fn test_change_entity_code_when_unreferenced() {
        let mut catalog = SchemaCatalog::new();
        let project = Uuid::new_v4();
        let tag = catalog
            .add_entity(Entity::create(project, "tag", "Tag").unwrap())
            .unwrap();
        catalog
            .add_entity(Entity::create(project, "label", "Label").unwrap())
            .unwrap();

        assert!(catalog.change_entity_code(tag, "label").is_err());
        assert!(catalog.change_entity_code(tag, "bad code").is_err());
        catalog.change_entity_code(tag, "keyword").unwrap();
        assert_eq!(catalog.entity(tag).map(|e| e.code.as_str()), Some("keyword"));
    }

    #[test]
    fn test_published_entity_cannot_be_removed() {
        let mut catalog = SchemaCatalog::new();
        let mut entity = Entity::create(Uuid::new_v4(), "tag", "Tag").unwrap();
        entity.publish().unwrap();
        let id = catalog.add_entity(entity).unwrap();
        assert!(catalog.remove_entity(id).is_err());
    }

    #[test]
    fn test_add_field_to_missing_entity() {
        let mut catalog = SchemaCatalog::new();
        let field = Field::create("code", "Code", FieldType::String).unwrap();
        let err = catalog.add_field(Uuid::new_v4(), field).unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_store_batch_lookups() {
        let shop = ShopFixture::new();
        let relations = shop
            .catalog
            .get_relations_by_ids(&[shop.user_roles.id, Uuid::new_v4()])
            .await
            .unwrap();
        assert_eq!(relations.len(), 1);
        assert_eq!(relations[0].source_entity.code, "user");
        assert_eq!(relations[0].target_entity.code, "role");

        let entities = shop
            .catalog
            .get_entities_by_ids(&[shop.role.id])
            .await
            .unwrap();
        assert_eq!(entities[0].table_name, "roles");
    }

    #[test]
    fn test_catalog_json_round_trip() {
        let shop = ShopFixture::new();
        let json = serde_json::to_string(&shop.catalog).unwrap();
        let back: SchemaCatalog = serde_json::from_str(&json).unwrap();
        assert_eq!(back.entity_count(), 3);
        assert!(back.with_endpoints(shop.user_orders.id).is_some());
    }
}
