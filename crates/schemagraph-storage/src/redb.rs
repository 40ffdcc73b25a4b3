//! ReDB storage backend

use crate::error::{StorageError, StorageResult};
use crate::traits::StorageBackend;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};
use schemagraph_core::{Entity, EntityId, Relationship, RelationshipId, SchemaDocument};
use serde::de::DeserializeOwned;
use std::path::Path;

type Records = TableDefinition<'static, &'static str, &'static [u8]>;
type SequenceLog = TableDefinition<'static, u64, &'static str>;

// Table definitions
const REGISTRY: Records = TableDefinition::new("registry");
const ENTITIES: Records = TableDefinition::new("entities");
const ENTITY_LOG: SequenceLog = TableDefinition::new("entity_log");
const RELATIONSHIPS: Records = TableDefinition::new("relationships");
const RELATIONSHIP_LOG: SequenceLog = TableDefinition::new("relationship_log");

const SCHEMA_KEY: &str = "schema";

/// ReDB storage backend
///
/// Records are JSON values keyed by id. The `*_log` tables map a sequence
/// number to an id and give listings their insertion order.
pub struct RedbStorage {
    db: Database,
}

impl RedbStorage {
    /// Open or create a ReDB database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let db = Database::create(path)?;

        // Initialize tables
        let write_txn = db.begin_write()?;
        {
            write_txn.open_table(REGISTRY)?;
            write_txn.open_table(ENTITIES)?;
            write_txn.open_table(ENTITY_LOG)?;
            write_txn.open_table(RELATIONSHIPS)?;
            write_txn.open_table(RELATIONSHIP_LOG)?;
        }
        write_txn.commit()?;

        tracing::debug!("Opened redb storage at {}", path.display());
        Ok(Self { db })
    }

    /// Append a record to a table and its log inside an open transaction
    fn append(
        txn: &WriteTransaction,
        records: Records,
        log: SequenceLog,
        key: &str,
        value: &[u8],
    ) -> StorageResult<bool> {
        let mut records = txn.open_table(records)?;
        if records.get(key)?.is_some() {
            return Ok(false);
        }
        records.insert(key, value)?;

        let mut log = txn.open_table(log)?;
        let seq = log.last()?.map(|(seq, _)| seq.value() + 1).unwrap_or(0);
        log.insert(seq, key)?;
        Ok(true)
    }

    fn get_record<T: DeserializeOwned>(&self, records: Records, key: &str) -> StorageResult<Option<T>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(records)?;
        let stored = table.get(key)?;
        let record = match stored {
            Some(value) => Some(serde_json::from_slice(value.value())?),
            None => None,
        };
        Ok(record)
    }

    /// Records in log order
    fn list_records<T: DeserializeOwned>(
        &self,
        records: Records,
        log: SequenceLog,
    ) -> StorageResult<Vec<T>> {
        let read_txn = self.db.begin_read()?;
        let records = read_txn.open_table(records)?;
        let log = read_txn.open_table(log)?;

        let mut items = Vec::new();
        for entry in log.iter()? {
            let (_, key) = entry?;
            let value = records
                .get(key.value())?
                .ok_or_else(|| StorageError::Database(format!("Dangling log entry: {}", key.value())))?;
            items.push(serde_json::from_slice(value.value())?);
        }
        Ok(items)
    }
}

#[async_trait]
impl StorageBackend for RedbStorage {
    async fn initialize(&self) -> StorageResult<()> {
        Ok(())
    }

    async fn load_schema(&self) -> StorageResult<Option<SchemaDocument>> {
        self.get_record(REGISTRY, SCHEMA_KEY)
    }

    async fn save_schema(&self, schema: &SchemaDocument) -> StorageResult<()> {
        let value = serde_json::to_vec(schema)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(REGISTRY)?;
            table.insert(SCHEMA_KEY, value.as_slice())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    async fn insert_entity(&self, entity: &Entity) -> StorageResult<()> {
        let key = entity.id.to_string();
        let value = serde_json::to_vec(entity)?;

        let write_txn = self.db.begin_write()?;
        if !Self::append(&write_txn, ENTITIES, ENTITY_LOG, &key, &value)? {
            write_txn.abort()?;
            return Err(StorageError::DuplicateEntity(key));
        }
        write_txn.commit()?;

        Ok(())
    }

    async fn replace_entity(&self, entity: &Entity) -> StorageResult<()> {
        let key = entity.id.to_string();
        let value = serde_json::to_vec(entity)?;

        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(ENTITIES)?;
            let exists = table.get(key.as_str())?.is_some();
            if !exists {
                drop(table);
                write_txn.abort()?;
                return Err(StorageError::EntityNotFound(key));
            }
            table.insert(key.as_str(), value.as_slice())?;
        }
        write_txn.commit()?;

        Ok(())
    }

    async fn get_entity(&self, id: &EntityId) -> StorageResult<Option<Entity>> {
        self.get_record(ENTITIES, &id.to_string())
    }

    async fn list_entities(&self) -> StorageResult<Vec<Entity>> {
        self.list_records(ENTITIES, ENTITY_LOG)
    }

    async fn insert_relationship(&self, relationship: &Relationship) -> StorageResult<()> {
        let key = relationship.id.to_string();
        let value = serde_json::to_vec(relationship)?;

        let write_txn = self.db.begin_write()?;
        if !Self::append(&write_txn, RELATIONSHIPS, RELATIONSHIP_LOG, &key, &value)? {
            write_txn.abort()?;
            return Err(StorageError::DuplicateRelationship(key));
        }
        write_txn.commit()?;

        Ok(())
    }

    async fn get_relationship(&self, id: &RelationshipId) -> StorageResult<Option<Relationship>> {
        self.get_record(RELATIONSHIPS, &id.to_string())
    }

    async fn list_relationships(&self) -> StorageResult<Vec<Relationship>> {
        self.list_records(RELATIONSHIPS, RELATIONSHIP_LOG)
    }

    async fn close_relationship(
        &self,
        id: &RelationshipId,
        valid_to: DateTime<Utc>,
    ) -> StorageResult<Relationship> {
        let key = id.to_string();

        // redb allows one write transaction at a time, so the check and the
        // update below cannot interleave with another close
        let write_txn = self.db.begin_write()?;
        let closed = {
            let mut table = write_txn.open_table(RELATIONSHIPS)?;
            let stored: Option<Relationship> = match table.get(key.as_str())? {
                Some(value) => Some(serde_json::from_slice(value.value())?),
                None => None,
            };
            match stored {
                None => Err(StorageError::RelationshipNotFound(key.clone())),
                Some(rel) => match rel.valid_to {
                    Some(closed_at) => Err(StorageError::AlreadyClosed {
                        id: key.clone(),
                        valid_to: closed_at,
                    }),
                    None => {
                        let mut rel = rel;
                        rel.valid_to = Some(valid_to);
                        let value = serde_json::to_vec(&rel)?;
                        table.insert(key.as_str(), value.as_slice())?;
                        Ok(rel)
                    }
                },
            }
        };

        match closed {
            Ok(rel) => {
                write_txn.commit()?;
                Ok(rel)
            }
            Err(e) => {
                write_txn.abort()?;
                Err(e)
            }
        }
    }

    async fn insert_batch(
        &self,
        entities: &[Entity],
        relationships: &[Relationship],
    ) -> StorageResult<()> {
        if entities.is_empty() && relationships.is_empty() {
            return Ok(());
        }

        let write_txn = self.db.begin_write()?;
        let mut duplicate = None;
        for entity in entities {
            let key = entity.id.to_string();
            let value = serde_json::to_vec(entity)?;
            if !Self::append(&write_txn, ENTITIES, ENTITY_LOG, &key, &value)? {
                duplicate = Some(StorageError::DuplicateEntity(key));
                break;
            }
        }
        if duplicate.is_none() {
            for relationship in relationships {
                let key = relationship.id.to_string();
                let value = serde_json::to_vec(relationship)?;
                if !Self::append(&write_txn, RELATIONSHIPS, RELATIONSHIP_LOG, &key, &value)? {
                    duplicate = Some(StorageError::DuplicateRelationship(key));
                    break;
                }
            }
        }

        if let Some(err) = duplicate {
            write_txn.abort()?;
            return Err(err);
        }
        write_txn.commit()?;
        tracing::debug!(
            "Batch saved {} entities and {} relationships in single transaction",
            entities.len(),
            relationships.len()
        );

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_redb_storage() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.redb");

        let storage = RedbStorage::open(&db_path).unwrap();
        storage.initialize().await.unwrap();

        let project = Entity::new("software_project", "AgentForge");
        let feature = Entity::new("feature", "Feed System");
        storage.insert_entity(&project).await.unwrap();
        storage.insert_entity(&feature).await.unwrap();

        let retrieved = storage.get_entity(&project.id).await.unwrap();
        assert_eq!(retrieved.unwrap().name, "AgentForge");

        let listed = storage.list_entities().await.unwrap();
        assert_eq!(listed, vec![project.clone(), feature.clone()]);

        assert!(matches!(
            storage.insert_entity(&project).await,
            Err(StorageError::DuplicateEntity(_))
        ));
        assert_eq!(storage.list_entities().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_redb_persists_across_reopen() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("nested").join("graph.redb");
        let t0 = Utc::now();

        let project = Entity::new("software_project", "AgentForge");
        let component = Entity::new("component", "API Routes");
        let rel = Relationship::new(
            "has_component",
            project.id.clone(),
            component.id.clone(),
            "AgentForge contains the API Routes component",
            t0,
        );

        {
            let storage = RedbStorage::open(&db_path).unwrap();
            storage
                .save_schema(&schemagraph_core::presets::software_project())
                .await
                .unwrap();
            storage
                .insert_batch(&[project.clone(), component.clone()], &[rel.clone()])
                .await
                .unwrap();
        }

        let storage = RedbStorage::open(&db_path).unwrap();
        let schema = storage.load_schema().await.unwrap().unwrap();
        assert_eq!(schema.entity_types.len(), 3);
        assert_eq!(storage.list_entities().await.unwrap().len(), 2);
        assert_eq!(storage.list_relationships().await.unwrap(), vec![rel]);
    }

    #[tokio::test]
    async fn test_redb_close_relationship_once() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.redb")).unwrap();
        let t0 = Utc::now();

        let rel = Relationship::new("depends_on", EntityId::new(), EntityId::new(), "", t0);
        storage.insert_relationship(&rel).await.unwrap();

        let first = t0 + Duration::minutes(10);
        storage.close_relationship(&rel.id, first).await.unwrap();
        let err = storage
            .close_relationship(&rel.id, t0 + Duration::minutes(20))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyClosed { .. }));

        let stored = storage.get_relationship(&rel.id).await.unwrap().unwrap();
        assert_eq!(stored.valid_to, Some(first));

        let err = storage
            .close_relationship(&RelationshipId::new(), first)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::RelationshipNotFound(_)));
    }

    #[tokio::test]
    async fn test_redb_replace_keeps_order() {
        let dir = tempdir().unwrap();
        let storage = RedbStorage::open(dir.path().join("test.redb")).unwrap();

        let mut first = Entity::new("feature", "Workflow Builder");
        let second = Entity::new("feature", "Feed System");
        storage.insert_entity(&first).await.unwrap();
        storage.insert_entity(&second).await.unwrap();

        first.summary = Some("Visual drag-and-drop workflow creation".to_string());
        storage.replace_entity(&first).await.unwrap();

        let listed = storage.list_entities_by_type("feature").await.unwrap();
        assert_eq!(listed[0], first);
        assert_eq!(listed[1], second);
    }
}
