//! # Resolved Context
//!
//! `MetadataResolver` loads every record a join-query configuration refers
//! to and checks each reference. The resulting `ResolvedContext` is the only
//! metadata the validator and the generators read. Resolution is
//! all-or-nothing: the first dangling reference aborts the request.
//!
//! The resolver issues two batch fetches per request:
//!
//! 1. relations named by `joinConfigs`
//! 2. entities: the main entity, every relation endpoint, and every entity
//!    named by `selectFields`, `filterConditions` and `sortConfig`
//!

use metaquery_core::{EngineError, EngineResult, EntityId, FieldId, ReferenceRole, RelationId};
use metaquery_ir::{
    Entity, JoinQueryConfig, MetadataStore, RelationWithEndpoints, SchemaCatalog, SchemaLookup,
};
use std::collections::{HashMap, HashSet};

// ============================================================================
// ResolvedContext
// ============================================================================

/// Entities and relations loaded for one request, keyed by id
#[derive(Debug, Clone, Default)]
pub struct ResolvedContext {
    entities: HashMap<EntityId, Entity>,
    relations: HashMap<RelationId, RelationWithEndpoints>,
}

impl ResolvedContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every record of an in-memory catalog
    pub fn from_catalog(catalog: &SchemaCatalog) -> Self {
        let mut ctx = Self::new();
        for entity in catalog.entities() {
            ctx.insert_entity(entity.clone());
        }
        for relation in catalog.relations() {
            if let Some(resolved) = catalog.with_endpoints(relation.id) {
                ctx.insert_relation(resolved);
            }
        }
        ctx
    }

    pub fn insert_entity(&mut self, entity: Entity) {
        self.entities.insert(entity.id, entity);
    }

    pub fn insert_relation(&mut self, relation: RelationWithEndpoints) {
        self.relations.insert(relation.id(), relation);
    }

    /// Get an entity by id
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Get an entity, or a `NotFound` naming `role`
    pub fn require_entity(&self, id: EntityId, role: ReferenceRole) -> EngineResult<&Entity> {
        self.entity(id).ok_or_else(|| EngineError::not_found(role, id))
    }

    /// Get a relation by id
    pub fn relation(&self, id: RelationId) -> Option<&RelationWithEndpoints> {
        self.relations.get(&id)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn relations(&self) -> impl Iterator<Item = &RelationWithEndpoints> {
        self.relations.values()
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// Check every reference of `config`, in config order
    pub fn check_references(&self, config: &JoinQueryConfig) -> EngineResult<()> {
        self.require_entity(config.main_entity_id, ReferenceRole::MainEntity)?;

        for (i, join) in config.join_configs.iter().enumerate() {
            let rel = self
                .relation(join.relation_id)
                .ok_or_else(|| {
                    EngineError::not_found(ReferenceRole::JoinRelation(i), join.relation_id)
                })?;
            let r = &rel.relation;
            let source =
                self.require_entity(r.source_entity_id, ReferenceRole::RelationSourceEntity(i))?;
            let target =
                self.require_entity(r.target_entity_id, ReferenceRole::RelationTargetEntity(i))?;
            require_field(source, r.source_field_id, ReferenceRole::RelationSourceField(i))?;
            require_field(target, r.target_field_id, ReferenceRole::RelationTargetField(i))?;
        }

        for (i, s) in config.select_fields.iter().enumerate() {
            let entity = self.require_entity(s.entity_id, ReferenceRole::SelectEntity(i))?;
            require_field(entity, s.field_id, ReferenceRole::SelectField(i))?;
        }
        for (i, f) in config.filter_conditions.iter().enumerate() {
            let entity = self.require_entity(f.entity_id, ReferenceRole::FilterEntity(i))?;
            require_field(entity, f.field_id, ReferenceRole::FilterField(i))?;
        }
        for (i, s) in config.sort_config.iter().enumerate() {
            let entity = self.require_entity(s.entity_id, ReferenceRole::SortEntity(i))?;
            require_field(entity, s.field_id, ReferenceRole::SortField(i))?;
        }

        Ok(())
    }
}

impl SchemaLookup for ResolvedContext {
    fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    fn relation(&self, id: RelationId) -> Option<&RelationWithEndpoints> {
        self.relations.get(&id)
    }
}

fn require_field(entity: &Entity, field_id: FieldId, role: ReferenceRole) -> EngineResult<()> {
    match entity.get_field(field_id) {
        Some(_) => Ok(()),
        None => Err(EngineError::not_found(role, field_id)),
    }
}

// ============================================================================
// MetadataResolver
// ============================================================================

/// Loads the records a configuration refers to
#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataResolver;

impl MetadataResolver {
    pub fn new() -> Self {
        Self
    }

    /// Resolve `config` against `store`
    pub async fn resolve<S>(
        &self,
        store: &S,
        config: &JoinQueryConfig,
    ) -> EngineResult<ResolvedContext>
    where
        S: MetadataStore + ?Sized,
    {
        let mut ctx = ResolvedContext::new();

        let relation_ids = dedup(config.relation_ids());
        tracing::debug!(count = relation_ids.len(), "Fetching relations");
        let wanted: HashSet<RelationId> = relation_ids.iter().copied().collect();
        for relation in store.get_relations_by_ids(&relation_ids).await? {
            if wanted.contains(&relation.id()) {
                ctx.insert_relation(relation);
            } else {
                tracing::warn!(
                    relation_id = %relation.id(),
                    "Store returned a relation that was not requested"
                );
            }
        }
        for (i, join) in config.join_configs.iter().enumerate() {
            if ctx.relation(join.relation_id).is_none() {
                return Err(EngineError::not_found(
                    ReferenceRole::JoinRelation(i),
                    join.relation_id,
                ));
            }
        }

        let mut entity_ids = config.referenced_entity_ids();
        for rel in ctx.relations() {
            entity_ids.push(rel.relation.source_entity_id);
            entity_ids.push(rel.relation.target_entity_id);
        }
        let entity_ids = dedup(entity_ids);
        tracing::debug!(count = entity_ids.len(), "Fetching entities");
        let wanted: HashSet<EntityId> = entity_ids.iter().copied().collect();
        for entity in store.get_entities_by_ids(&entity_ids).await? {
            if wanted.contains(&entity.id) {
                ctx.insert_entity(entity);
            } else {
                tracing::warn!(
                    entity_id = %entity.id,
                    "Store returned an entity that was not requested"
                );
            }
        }

        ctx.check_references(config)?;
        tracing::debug!(
            entities = ctx.entity_count(),
            relations = ctx.relation_count(),
            "Resolved join query context"
        );
        Ok(ctx)
    }
}

/// Remove repeated ids, keeping first occurrences in order
fn dedup(ids: Vec<uuid::Uuid>) -> Vec<uuid::Uuid> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

// ============================================================================
// Tests
// ============================================================================
