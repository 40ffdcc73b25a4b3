//! Validated-write graph engine over a storage backend

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use schemagraph_core::limits;
use schemagraph_core::query::sort_relationships;
use schemagraph_core::validation::{self, ValidationReport};
use schemagraph_core::{
    Entity, EntityFilter, EntityId, EntityTypeDefinition, Error, GraphDocument, ImportDocument,
    ImportSummary, InstanceViolation, KnowledgeGraph, Metadata, NewEntity, NewRelationship,
    RedefinitionReport, Relationship, RelationshipFilter, RelationshipId,
    RelationshipTypeDefinition, Result, SchemaDocument, SchemaRegistry, TraversalEngine,
    TraversalQuery, TraversalResult,
};

use crate::traits::StorageBackend;

/// Schema-validated graph store.
///
/// Every write is checked against the registry before it reaches the
/// backend. Instance writes share `schema_guard` for reading, while type
/// registration and redefinition take it exclusively, so no instance is
/// validated against a definition that is being replaced.
pub struct GraphStore<S> {
    storage: S,
    registry: SchemaRegistry,
    schema_guard: RwLock<()>,
}

impl<S: StorageBackend> GraphStore<S> {
    /// Open a store, loading the persisted registry document
    pub async fn open(storage: S) -> Result<Self> {
        storage.initialize().await?;
        let registry = match storage.load_schema().await? {
            Some(doc) => SchemaRegistry::from_document(&doc)?,
            None => SchemaRegistry::new(),
        };
        tracing::debug!(
            "Opened graph store with {} entity types and {} relationship types",
            registry.entity_types()?.len(),
            registry.relationship_types()?.len()
        );
        Ok(Self {
            storage,
            registry,
            schema_guard: RwLock::new(()),
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Persist a staged registry, then make it the live one
    async fn publish(&self, staged: SchemaRegistry) -> Result<()> {
        self.storage.save_schema(&staged.document()?).await?;
        self.registry.commit(staged)
    }

    /// Write a batch together with the types staged for it.
    ///
    /// The live registry only changes once the batch is stored; if the batch
    /// fails the previous schema document is written back.
    async fn commit_batch(
        &self,
        staged: SchemaRegistry,
        schema_changed: bool,
        entities: &[Entity],
        relationships: &[Relationship],
    ) -> Result<()> {
        if !schema_changed {
            self.storage.insert_batch(entities, relationships).await?;
            return Ok(());
        }

        self.storage.save_schema(&staged.document()?).await?;
        if let Err(err) = self.storage.insert_batch(entities, relationships).await {
            if let Err(restore_err) = self.storage.save_schema(&self.registry.document()?).await {
                tracing::error!("Failed to write back schema after batch error: {}", restore_err);
            }
            return Err(err.into());
        }
        self.registry.commit(staged)
    }

    async fn entity_by_id(&self, id: &EntityId) -> Result<Entity> {
        self.storage
            .get_entity(id)
            .await?
            .ok_or_else(|| Error::EntityNotFound(id.to_string()))
    }

    async fn relationship_by_id(&self, id: &RelationshipId) -> Result<Relationship> {
        self.storage
            .get_relationship(id)
            .await?
            .ok_or_else(|| Error::RelationshipNotFound(id.to_string()))
    }

    async fn entity_map(&self) -> Result<HashMap<EntityId, Entity>> {
        Ok(self
            .storage
            .list_entities()
            .await?
            .into_iter()
            .map(|e| (e.id.clone(), e))
            .collect())
    }

}

/// Stage every type of `doc` not yet known, in document order.
///
/// Identical redeclarations are skipped; a differing one is a `DuplicateType`.
fn stage_types(staged: &SchemaRegistry, doc: &SchemaDocument) -> Result<(usize, usize)> {
    let mut counts = (0, 0);
    for def in &doc.entity_types {
        match staged.lookup_entity_type(&def.name) {
            Ok(existing) if &existing == def => {}
            Ok(_) => return Err(Error::DuplicateType(def.name.clone())),
            Err(Error::EntityTypeNotFound(_)) => {
                staged.register_entity_type(def.clone())?;
                counts.0 += 1;
            }
            Err(e) => return Err(e),
        }
    }
    for def in &doc.relationship_types {
        match staged.lookup_relationship_type(&def.name) {
            Ok(existing) if &existing == def => {}
            Ok(_) => return Err(Error::DuplicateType(def.name.clone())),
            Err(Error::RelationshipTypeNotFound(_)) => {
                staged.register_relationship_type(def.clone())?;
                counts.1 += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok(counts)
}

/// Check an entity's name, summary and metadata against its registered type
fn check_entity(
    registry: &SchemaRegistry,
    entity_type: &str,
    name: &str,
    summary: Option<&str>,
    metadata: &Metadata,
) -> Result<()> {
    limits::validate_entity_name(name)?;
    if let Some(summary) = summary {
        limits::validate_text(summary)?;
    }

    let def = match registry.lookup_entity_type(entity_type) {
        Ok(def) => def,
        Err(Error::EntityTypeNotFound(_)) => {
            return Err(Error::UnknownEntityType(entity_type.to_string()))
        }
        Err(e) => return Err(e),
    };
    let report = validation::validate_entity(&def, name, metadata);
    warn_unknown_fields(&def.name, name, &report);
    report.into_result(format!("{} '{}'", def.name, name))
}

/// Build a checked entity record against a registry
fn admit_entity(registry: &SchemaRegistry, new: NewEntity) -> Result<Entity> {
    check_entity(
        registry,
        &new.entity_type,
        &new.name,
        new.summary.as_deref(),
        &new.metadata,
    )?;

    let mut entity = Entity::new(new.entity_type, new.name).with_metadata(new.metadata);
    entity.summary = new.summary;
    Ok(entity)
}

fn warn_unknown_fields(entity_type: &str, name: &str, report: &ValidationReport) {
    if !report.unknown_fields.is_empty() {
        tracing::warn!(
            "{} '{}' carries undeclared fields: {}",
            entity_type,
            name,
            report.unknown_fields.join(", ")
        );
    }
}

/// Entities known to an import, by id and by display name
#[derive(Default)]
struct ImportIndex {
    types: HashMap<EntityId, String>,
    by_name: HashMap<String, Vec<EntityId>>,
}

impl ImportIndex {
    fn add(&mut self, entity: &Entity) {
        self.types
            .insert(entity.id.clone(), entity.entity_type.to_string());
        self.by_name
            .entry(entity.name.clone())
            .or_default()
            .push(entity.id.clone());
    }

    fn type_of(&self, id: &EntityId) -> Result<&str> {
        self.types
            .get(id)
            .map(String::as_str)
            .ok_or_else(|| Error::EntityNotFound(id.to_string()))
    }

    /// Resolve an id or a unique name to an id and its entity type
    fn resolve(&self, reference: &str) -> Result<(EntityId, &str)> {
        if let Ok(id) = EntityId::from_string(reference) {
            if let Some(entity_type) = self.types.get(&id) {
                return Ok((id, entity_type));
            }
        }
        match self.by_name.get(reference).map(Vec::as_slice) {
            Some([id]) => Ok((id.clone(), self.types[id].as_str())),
            Some(ids) if ids.len() > 1 => Err(Error::AmbiguousEntityName {
                name: reference.to_string(),
                count: ids.len(),
            }),
            _ => Err(Error::EntityNotFound(reference.to_string())),
        }
    }
}

#[async_trait]
impl<S: StorageBackend> KnowledgeGraph for GraphStore<S> {
    // ─────────────────────────────────────────────────────────────────────────
    // Schema Operations
    // ─────────────────────────────────────────────────────────────────────────

    async fn register_entity_type(&self, def: EntityTypeDefinition) -> Result<()> {
        let _guard = self.schema_guard.write().await;
        let name = def.name.clone();
        let staged = self.registry.staged()?;
        staged.register_entity_type(def)?;
        self.publish(staged).await?;
        tracing::info!("Registered entity type {}", name);
        Ok(())
    }

    async fn register_relationship_type(&self, def: RelationshipTypeDefinition) -> Result<()> {
        let _guard = self.schema_guard.write().await;
        let name = def.name.clone();
        let staged = self.registry.staged()?;
        staged.register_relationship_type(def)?;
        self.publish(staged).await?;
        tracing::info!("Registered relationship type {}", name);
        Ok(())
    }

    async fn lookup_entity_type(&self, name: &str) -> Result<EntityTypeDefinition> {
        self.registry.lookup_entity_type(name)
    }

    async fn lookup_relationship_type(&self, name: &str) -> Result<RelationshipTypeDefinition> {
        self.registry.lookup_relationship_type(name)
    }

    async fn schema(&self) -> Result<SchemaDocument> {
        self.registry.document()
    }

    async fn redefine_entity_type(&self, def: EntityTypeDefinition) -> Result<RedefinitionReport> {
        let _guard = self.schema_guard.write().await;
        let staged = self.registry.staged()?;
        let previous = staged.redefine_entity_type(def.clone())?;

        let entities = self.storage.list_entities_by_type(&def.name).await?;
        let violations: Vec<InstanceViolation> = entities
            .iter()
            .filter_map(|entity| {
                let report = validation::validate_entity(&def, &entity.name, &entity.metadata);
                (!report.is_valid()).then(|| InstanceViolation {
                    instance_id: entity.id.to_string(),
                    violations: report.violations,
                })
            })
            .collect();
        self.publish(staged).await?;

        tracing::info!(
            "Redefined entity type {} ({} -> {} fields)",
            def.name,
            previous.fields.len(),
            def.fields.len()
        );
        if !violations.is_empty() {
            tracing::warn!(
                "{} of {} {} entities violate the new definition",
                violations.len(),
                entities.len(),
                def.name
            );
        }

        Ok(RedefinitionReport {
            type_name: def.name,
            instances_checked: entities.len(),
            violations,
        })
    }

    async fn redefine_relationship_type(
        &self,
        def: RelationshipTypeDefinition,
    ) -> Result<RedefinitionReport> {
        let _guard = self.schema_guard.write().await;
        let staged = self.registry.staged()?;
        staged.redefine_relationship_type(def.clone())?;

        let entities = self.entity_map().await?;
        let relationships: Vec<Relationship> = self
            .storage
            .list_relationships()
            .await?
            .into_iter()
            .filter(|r| r.relationship_type == def.name)
            .collect();

        let mut violations = Vec::new();
        for rel in &relationships {
            let (Some(source), Some(target)) =
                (entities.get(&rel.source_id), entities.get(&rel.target_id))
            else {
                return Err(Error::Internal(format!(
                    "relationship {} references a missing entity",
                    rel.id
                )));
            };
            let report = validation::validate_relationship(&def, source, target);
            if !report.is_valid() {
                violations.push(InstanceViolation {
                    instance_id: rel.id.to_string(),
                    violations: report.violations,
                });
            }
        }
        self.publish(staged).await?;

        tracing::info!(
            "Redefined relationship type {} ({} -> {})",
            def.name,
            def.source_type,
            def.target_type
        );
        if !violations.is_empty() {
            tracing::warn!(
                "{} of {} {} relationships violate the new definition",
                violations.len(),
                relationships.len(),
                def.name
            );
        }

        Ok(RedefinitionReport {
            type_name: def.name,
            instances_checked: relationships.len(),
            violations,
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Entity Operations
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_entity(&self, entity: NewEntity) -> Result<Entity> {
        let _guard = self.schema_guard.read().await;
        let entity = admit_entity(&self.registry, entity)?;
        self.storage.insert_entity(&entity).await?;
        tracing::info!(
            "Created {} entity '{}' ({})",
            entity.entity_type,
            entity.name,
            entity.id
        );
        Ok(entity)
    }

    async fn get_entity(&self, id: &EntityId) -> Result<Entity> {
        self.entity_by_id(id).await
    }

    async fn update_entity(&self, id: &EntityId, metadata: Metadata) -> Result<Entity> {
        let _guard = self.schema_guard.read().await;
        let mut entity = self.entity_by_id(id).await?;
        let def = self
            .registry
            .lookup_entity_type(entity.entity_type.as_str())?;

        let report = validation::validate_entity(&def, &entity.name, &metadata);
        warn_unknown_fields(&def.name, &entity.name, &report);
        report.into_result(id.to_string())?;

        entity.replace_metadata(metadata);
        self.storage.replace_entity(&entity).await?;
        tracing::info!("Updated entity '{}' ({})", entity.name, entity.id);
        Ok(entity)
    }

    async fn list_entities_by_type(&self, entity_type: &str) -> Result<Vec<Entity>> {
        self.registry.lookup_entity_type(entity_type)?;
        Ok(self.storage.list_entities_by_type(entity_type).await?)
    }

    async fn find_entities_by_name(&self, name: &str) -> Result<Vec<Entity>> {
        Ok(self
            .storage
            .list_entities()
            .await?
            .into_iter()
            .filter(|e| e.name == name)
            .collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Relationship Operations
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_relationship(&self, relationship: NewRelationship) -> Result<Relationship> {
        let _guard = self.schema_guard.read().await;
        limits::validate_text(&relationship.fact)?;

        let def = self
            .registry
            .lookup_relationship_type(&relationship.relationship_type)?;
        let source = self.entity_by_id(&relationship.source_id).await?;
        let target = self.entity_by_id(&relationship.target_id).await?;

        validation::validate_relationship(&def, &source, &target).into_result(format!(
            "{} '{}' -> '{}'",
            def.name, source.name, target.name
        ))?;

        let valid_from = relationship.valid_from.unwrap_or_else(Utc::now);
        let rel = Relationship::new(
            def.name,
            source.id,
            target.id,
            relationship.fact,
            valid_from,
        );
        self.storage.insert_relationship(&rel).await?;
        tracing::info!(
            "Created relationship {}: '{}' -[{}]-> '{}'",
            rel.id,
            source.name,
            rel.relationship_type,
            target.name
        );
        Ok(rel)
    }

    async fn get_relationship(&self, id: &RelationshipId) -> Result<Relationship> {
        self.relationship_by_id(id).await
    }

    async fn supersede_relationship(
        &self,
        id: &RelationshipId,
        valid_to: DateTime<Utc>,
    ) -> Result<Relationship> {
        let rel = self.relationship_by_id(id).await?;
        if let Some(closed_at) = rel.valid_to {
            return Err(Error::AlreadyClosed {
                id: id.to_string(),
                valid_to: closed_at,
            });
        }
        if valid_to < rel.valid_from {
            return Err(Error::InvalidTimeRange {
                valid_from: rel.valid_from,
                valid_to,
            });
        }

        let closed = self.storage.close_relationship(id, valid_to).await?;
        tracing::info!("Superseded relationship {} at {}", id, valid_to);
        Ok(closed)
    }

    async fn query_relationships(&self, filter: &RelationshipFilter) -> Result<Vec<Relationship>> {
        let mut relationships: Vec<Relationship> = self
            .storage
            .list_relationships()
            .await?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        sort_relationships(&mut relationships);
        tracing::debug!("Relationship query matched {}", relationships.len());
        Ok(relationships)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Query Operations
    // ─────────────────────────────────────────────────────────────────────────

    async fn traverse(&self, query: &TraversalQuery) -> Result<TraversalResult> {
        limits::validate_traversal_depth(query.max_depth)?;

        let entities = self.entity_map().await?;
        for id in std::iter::once(&query.start).chain(query.target.as_ref()) {
            if !entities.contains_key(id) {
                return Err(Error::EntityNotFound(id.to_string()));
            }
        }
        let relationships = self.storage.list_relationships().await?;

        Ok(TraversalEngine::execute(query, &entities, &relationships))
    }

    async fn find_by_type(&self, filter: &EntityFilter) -> Result<Vec<Entity>> {
        let candidates = match filter.entity_type {
            Some(ref entity_type) => self.list_entities_by_type(entity_type).await?,
            None => self.storage.list_entities().await?,
        };
        Ok(candidates.into_iter().filter(|e| filter.matches(e)).collect())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Bulk Operations
    // ─────────────────────────────────────────────────────────────────────────

    async fn import(&self, document: ImportDocument) -> Result<ImportSummary> {
        limits::validate_batch(document.entities.len() + document.relationships.len())?;
        let _guard = self.schema_guard.write().await;

        let staged = self.registry.staged()?;
        let (entity_types, relationship_types) = stage_types(&staged, &document.schema)?;

        let mut index = ImportIndex::default();
        for entity in self.storage.list_entities().await? {
            index.add(&entity);
        }

        let mut entities = Vec::with_capacity(document.entities.len());
        for new in document.entities {
            let entity = admit_entity(&staged, new)?;
            index.add(&entity);
            entities.push(entity);
        }

        let mut relationships = Vec::with_capacity(document.relationships.len());
        for link in document.relationships {
            limits::validate_text(&link.fact)?;
            let def = staged.lookup_relationship_type(&link.relationship_type)?;
            let (source_id, source_type) = index.resolve(&link.source)?;
            let (target_id, target_type) = index.resolve(&link.target)?;
            validation::validate_endpoint_types(&def, source_type, target_type).into_result(
                format!("{} '{}' -> '{}'", def.name, link.source, link.target),
            )?;
            relationships.push(Relationship::new(
                def.name,
                source_id,
                target_id,
                link.fact,
                link.valid_from.unwrap_or_else(Utc::now),
            ));
        }

        let schema_changed = entity_types + relationship_types > 0;
        self.commit_batch(staged, schema_changed, &entities, &relationships)
            .await?;

        let summary = ImportSummary {
            entity_types_registered: entity_types,
            relationship_types_registered: relationship_types,
            entities_created: entities.len(),
            relationships_created: relationships.len(),
        };
        tracing::info!(
            "Imported {} entities and {} relationships",
            summary.entities_created,
            summary.relationships_created
        );
        Ok(summary)
    }

    async fn restore(&self, document: GraphDocument) -> Result<ImportSummary> {
        limits::validate_batch(document.entities.len() + document.relationships.len())?;
        let _guard = self.schema_guard.write().await;

        let staged = self.registry.staged()?;
        let (entity_types, relationship_types) = stage_types(&staged, &document.schema)?;

        let mut index = ImportIndex::default();
        for entity in self.storage.list_entities().await? {
            index.add(&entity);
        }
        for entity in &document.entities {
            check_entity(
                &staged,
                entity.entity_type.as_str(),
                &entity.name,
                entity.summary.as_deref(),
                &entity.metadata,
            )?;
            index.add(entity);
        }

        for rel in &document.relationships {
            limits::validate_text(&rel.fact)?;
            let def = staged.lookup_relationship_type(&rel.relationship_type)?;
            let source_type = index.type_of(&rel.source_id)?;
            let target_type = index.type_of(&rel.target_id)?;
            validation::validate_endpoint_types(&def, source_type, target_type)
                .into_result(format!("{} {}", def.name, rel.id))?;
            if let Some(valid_to) = rel.valid_to {
                if valid_to < rel.valid_from {
                    return Err(Error::InvalidTimeRange {
                        valid_from: rel.valid_from,
                        valid_to,
                    });
                }
            }
        }

        let schema_changed = entity_types + relationship_types > 0;
        self.commit_batch(
            staged,
            schema_changed,
            &document.entities,
            &document.relationships,
        )
        .await?;

        let summary = ImportSummary {
            entity_types_registered: entity_types,
            relationship_types_registered: relationship_types,
            entities_created: document.entities.len(),
            relationships_created: document.relationships.len(),
        };
        tracing::info!(
            "Restored {} entities and {} relationships",
            summary.entities_created,
            summary.relationships_created
        );
        Ok(summary)
    }

    async fn export(&self) -> Result<GraphDocument> {
        Ok(GraphDocument {
            schema: self.registry.document()?,
            entities: self.storage.list_entities().await?,
            relationships: self.storage.list_relationships().await?,
        })
    }
}
