//! Metadata store interface
//!
//! The engine never owns schema persistence. It reads entities, fields and
//! relations through `MetadataStore`, which real deployments implement on top
//! of their database or API client. `SchemaCatalog` is the in-memory
//! implementation used by the CLI and the tests.

use crate::entity::Entity;
use crate::field::Field;
use crate::relation::Relation;
use async_trait::async_trait;
use metaquery_core::{EngineResult, EntityId, FieldId, RelationId};
use serde::{Deserialize, Serialize};

// ============================================================================
// RelationWithEndpoints
// ============================================================================

/// A relation together with its resolved source and target records
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationWithEndpoints {
    pub relation: Relation,
    pub source_entity: Entity,
    pub source_field: Field,
    pub target_entity: Entity,
    pub target_field: Field,
}

impl RelationWithEndpoints {
    /// Relation id
    pub fn id(&self) -> RelationId {
        self.relation.id
    }

    /// Given one endpoint entity, return the entity on the other side
    pub fn other_side(&self, entity_id: EntityId) -> Option<&Entity> {
        if self.relation.source_entity_id == entity_id {
            Some(&self.target_entity)
        } else if self.relation.target_entity_id == entity_id {
            Some(&self.source_entity)
        } else {
            None
        }
    }
}

// ============================================================================
// MetadataStore
// ============================================================================

/// Read access to schema metadata.
///
/// Single lookups return `Ok(None)` for unknown ids; `Err` is reserved for
/// store client failures. Batch lookups silently omit unknown ids.
///
/// # Example
///
/// ```ignore
/// use metaquery_ir::MetadataStore;
///
/// async fn example(
///     store: &impl MetadataStore,
///     ids: &[uuid::Uuid],
/// ) -> metaquery_core::EngineResult<()> {
///     let entities = store.get_entities_by_ids(ids).await?;
///     for entity in entities {
///         println!("{} -> {}", entity.code, entity.table_name);
///     }
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait MetadataStore: Send + Sync {
    // =========================================================================
    // Single lookups
    // =========================================================================

    /// Fetch an entity, including its fields
    async fn get_entity(&self, id: EntityId) -> EngineResult<Option<Entity>>;

    /// Fetch a relation with its resolved endpoints
    async fn get_relation(&self, id: RelationId) -> EngineResult<Option<RelationWithEndpoints>>;

    /// Fetch one field of an entity.
    ///
    /// Default implementation loads the owning entity.
    async fn get_field(
        &self,
        entity_id: EntityId,
        field_id: FieldId,
    ) -> EngineResult<Option<Field>> {
        Ok(self
            .get_entity(entity_id)
            .await?
            .and_then(|e| e.get_field(field_id).cloned()))
    }

    // =========================================================================
    // Batch operations (default implementations using parallel fetches)
    // =========================================================================

    /// Batch fetch entities.
    ///
    /// Default implementation fetches entities in parallel using `join_all`.
    async fn get_entities_by_ids(&self, ids: &[EntityId]) -> EngineResult<Vec<Entity>> {
        let futures: Vec<_> = ids.iter().map(|id| self.get_entity(*id)).collect();
        let results = futures::future::join_all(futures).await;

        let mut entities = Vec::with_capacity(results.len());
        for result in results {
            entities.extend(result?);
        }
        Ok(entities)
    }

    /// Batch fetch relations with their endpoints.
    ///
    /// Default implementation fetches relations in parallel using `join_all`.
    async fn get_relations_by_ids(
        &self,
        ids: &[RelationId],
    ) -> EngineResult<Vec<RelationWithEndpoints>> {
        let futures: Vec<_> = ids.iter().map(|id| self.get_relation(*id)).collect();
        let results = futures::future::join_all(futures).await;

        let mut relations = Vec::with_capacity(results.len());
        for result in results {
            relations.extend(result?);
        }
        Ok(relations)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ShopFixture;
    use metaquery_core::EngineError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store that only implements the single lookups and counts them
    struct CountingStore {
        shop: ShopFixture,
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl MetadataStore for CountingStore {
        async fn get_entity(&self, id: EntityId) -> EngineResult<Option<Entity>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EngineError::store("connection reset"));
            }
            self.shop.catalog.get_entity(id).await
        }

        async fn get_relation(
            &self,
            id: RelationId,
        ) -> EngineResult<Option<RelationWithEndpoints>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.shop.catalog.get_relation(id).await
        }
    }

    fn store(fail: bool) -> CountingStore {
        CountingStore {
            shop: ShopFixture::new(),
            calls: AtomicUsize::new(0),
            fail,
        }
    }

    #[tokio::test]
    async fn test_default_batch_fans_out_and_skips_unknown() {
        let store = store(false);
        let ids = [
            store.shop.user.id,
            uuid::Uuid::new_v4(),
            store.shop.order.id,
        ];
        let entities = store.get_entities_by_ids(&ids).await.unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_default_batch_propagates_store_errors() {
        let store = store(true);
        let err = store
            .get_entities_by_ids(&[store.shop.user.id])
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Store(_)));
    }

    #[tokio::test]
    async fn test_default_get_field() {
        let store = store(false);
        let user = &store.shop.user;
        let email = user.get_field_by_code("email").unwrap();

        let found = store.get_field(user.id, email.id).await.unwrap();
        assert_eq!(found.map(|f| f.code), Some("email".to_string()));

        let total = store.shop.order.get_field_by_code("total").unwrap();
        assert!(store.get_field(user.id, total.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_relation_other_side() {
        let store = store(false);
        let rel = store
            .get_relation(store.shop.user_orders.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(rel.other_side(store.shop.user.id).map(|e| e.code.as_str()), Some("order"));
        assert_eq!(rel.other_side(store.shop.order.id).map(|e| e.code.as_str()), Some("user"));
        assert!(rel.other_side(store.shop.role.id).is_none());
    }
}
