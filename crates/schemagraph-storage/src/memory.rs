//! In-memory storage backend for testing

use crate::error::{StorageError, StorageResult};
use crate::traits::StorageBackend;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use schemagraph_core::{Entity, EntityId, Relationship, RelationshipId, SchemaDocument};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

/// Append-only log with an index by key
struct Log<K, V> {
    index: HashMap<K, usize>,
    items: Vec<V>,
}

impl<K: Hash + Eq, V: Clone> Log<K, V> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            items: Vec::new(),
        }
    }

    fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    fn push(&mut self, key: K, value: V) {
        self.index.insert(key, self.items.len());
        self.items.push(value);
    }

    fn get(&self, key: &K) -> Option<&V> {
        self.index.get(key).map(|&i| &self.items[i])
    }

    fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.index.get(key).map(|&i| &mut self.items[i])
    }
}

/// In-memory storage backend
///
/// Useful for testing and temporary storage.
pub struct MemoryStorage {
    schema: RwLock<Option<SchemaDocument>>,
    entities: RwLock<Log<EntityId, Entity>>,
    relationships: RwLock<Log<RelationshipId, Relationship>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self {
            schema: RwLock::new(None),
            entities: RwLock::new(Log::new()),
            relationships: RwLock::new(Log::new()),
        }
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    async fn initialize(&self) -> StorageResult<()> {
        Ok(())
    }

    // Registry document

    async fn load_schema(&self) -> StorageResult<Option<SchemaDocument>> {
        let schema = self.schema.read().map_err(StorageError::lock)?;
        Ok(schema.clone())
    }

    async fn save_schema(&self, schema: &SchemaDocument) -> StorageResult<()> {
        let mut stored = self.schema.write().map_err(StorageError::lock)?;
        *stored = Some(schema.clone());
        Ok(())
    }

    // Entity operations

    async fn insert_entity(&self, entity: &Entity) -> StorageResult<()> {
        let mut entities = self.entities.write().map_err(StorageError::lock)?;
        if entities.contains(&entity.id) {
            return Err(StorageError::DuplicateEntity(entity.id.to_string()));
        }
        entities.push(entity.id.clone(), entity.clone());
        Ok(())
    }

    async fn replace_entity(&self, entity: &Entity) -> StorageResult<()> {
        let mut entities = self.entities.write().map_err(StorageError::lock)?;
        let stored = entities
            .get_mut(&entity.id)
            .ok_or_else(|| StorageError::EntityNotFound(entity.id.to_string()))?;
        *stored = entity.clone();
        Ok(())
    }

    async fn get_entity(&self, id: &EntityId) -> StorageResult<Option<Entity>> {
        let entities = self.entities.read().map_err(StorageError::lock)?;
        Ok(entities.get(id).cloned())
    }

    async fn list_entities(&self) -> StorageResult<Vec<Entity>> {
        let entities = self.entities.read().map_err(StorageError::lock)?;
        Ok(entities.items.clone())
    }

    // Relationship operations

    async fn insert_relationship(&self, relationship: &Relationship) -> StorageResult<()> {
        let mut relationships = self.relationships.write().map_err(StorageError::lock)?;
        if relationships.contains(&relationship.id) {
            return Err(StorageError::DuplicateRelationship(
                relationship.id.to_string(),
            ));
        }
        relationships.push(relationship.id.clone(), relationship.clone());
        Ok(())
    }

    async fn get_relationship(&self, id: &RelationshipId) -> StorageResult<Option<Relationship>> {
        let relationships = self.relationships.read().map_err(StorageError::lock)?;
        Ok(relationships.get(id).cloned())
    }

    async fn list_relationships(&self) -> StorageResult<Vec<Relationship>> {
        let relationships = self.relationships.read().map_err(StorageError::lock)?;
        Ok(relationships.items.clone())
    }

    async fn close_relationship(
        &self,
        id: &RelationshipId,
        valid_to: DateTime<Utc>,
    ) -> StorageResult<Relationship> {
        let mut relationships = self.relationships.write().map_err(StorageError::lock)?;
        let stored = relationships
            .get_mut(id)
            .ok_or_else(|| StorageError::RelationshipNotFound(id.to_string()))?;
        if let Some(closed_at) = stored.valid_to {
            return Err(StorageError::AlreadyClosed {
                id: id.to_string(),
                valid_to: closed_at,
            });
        }
        stored.valid_to = Some(valid_to);
        Ok(stored.clone())
    }

    async fn insert_batch(
        &self,
        entities: &[Entity],
        relationships: &[Relationship],
    ) -> StorageResult<()> {
        // Both locks are held so the batch lands all at once
        let mut stored_entities = self.entities.write().map_err(StorageError::lock)?;
        let mut stored_relationships = self.relationships.write().map_err(StorageError::lock)?;

        if let Some(dup) = entities.iter().find(|e| stored_entities.contains(&e.id)) {
            return Err(StorageError::DuplicateEntity(dup.id.to_string()));
        }
        if let Some(dup) = relationships
            .iter()
            .find(|r| stored_relationships.contains(&r.id))
        {
            return Err(StorageError::DuplicateRelationship(dup.id.to_string()));
        }

        for entity in entities {
            stored_entities.push(entity.id.clone(), entity.clone());
        }
        for relationship in relationships {
            stored_relationships.push(relationship.id.clone(), relationship.clone());
        }
        Ok(())
    }
}
