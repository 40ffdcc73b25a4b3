//! Storage backend trait definitions

use crate::error::StorageResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemagraph_core::{Entity, EntityId, Relationship, RelationshipId, SchemaDocument};

/// Trait for storage backend implementations.
///
/// Backends are append-only logs with an index by id: entities and
/// relationships are listed in insertion order, entities may be replaced in
/// place, and relationships are never removed, only closed.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Initialize the storage (create tables, etc.)
    async fn initialize(&self) -> StorageResult<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Registry Document
    // ─────────────────────────────────────────────────────────────────────────

    /// Load the persisted registry document, if one was saved
    async fn load_schema(&self) -> StorageResult<Option<SchemaDocument>>;

    /// Persist the registry document (replaces the previous one)
    async fn save_schema(&self, schema: &SchemaDocument) -> StorageResult<()>;

    // ─────────────────────────────────────────────────────────────────────────
    // Entity Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a new entity; fails with `DuplicateEntity` if the id exists
    async fn insert_entity(&self, entity: &Entity) -> StorageResult<()>;

    /// Replace a stored entity, keeping its position in insertion order
    async fn replace_entity(&self, entity: &Entity) -> StorageResult<()>;

    /// Get an entity by id
    async fn get_entity(&self, id: &EntityId) -> StorageResult<Option<Entity>>;

    /// All entities in insertion order
    async fn list_entities(&self) -> StorageResult<Vec<Entity>>;

    /// Entities of one type in insertion order
    async fn list_entities_by_type(&self, entity_type: &str) -> StorageResult<Vec<Entity>> {
        Ok(self
            .list_entities()
            .await?
            .into_iter()
            .filter(|e| e.entity_type.as_str() == entity_type)
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Relationship Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append a new relationship; fails with `DuplicateRelationship` if the id exists
    async fn insert_relationship(&self, relationship: &Relationship) -> StorageResult<()>;

    /// Get a relationship by id
    async fn get_relationship(&self, id: &RelationshipId) -> StorageResult<Option<Relationship>>;

    /// All relationships in insertion order
    async fn list_relationships(&self) -> StorageResult<Vec<Relationship>>;

    /// Set `valid_to` if it is still unset, atomically.
    ///
    /// Fails with `AlreadyClosed` when the relationship was closed before,
    /// leaving the stored value untouched.
    async fn close_relationship(
        &self,
        id: &RelationshipId,
        valid_to: DateTime<Utc>,
    ) -> StorageResult<Relationship>;

    // ─────────────────────────────────────────────────────────────────────────
    // Bulk Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Append entities then relationships, all or nothing
    async fn insert_batch(
        &self,
        entities: &[Entity],
        relationships: &[Relationship],
    ) -> StorageResult<()>;
}
