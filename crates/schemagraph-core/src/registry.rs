//! Schema registry: the authority on registered entity and relationship types
//!
//! Registration is append-only. Changing an existing definition goes through
//! the `redefine_*` methods, whose callers are responsible for revalidating
//! dependent instances (see `KnowledgeGraph::redefine_entity_type`).

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{Error, Result};
use crate::schema::{EntityTypeDefinition, RelationshipTypeDefinition, SchemaDocument};

#[derive(Debug, Clone, Default)]
struct RegistryState {
    entity_types: Vec<EntityTypeDefinition>,
    entity_index: HashMap<String, usize>,
    relationship_types: Vec<RelationshipTypeDefinition>,
    relationship_index: HashMap<String, usize>,
}

impl RegistryState {
    fn entity_type(&self, name: &str) -> Option<&EntityTypeDefinition> {
        self.entity_index.get(name).map(|&i| &self.entity_types[i])
    }

    fn relationship_type(&self, name: &str) -> Option<&RelationshipTypeDefinition> {
        self.relationship_index
            .get(name)
            .map(|&i| &self.relationship_types[i])
    }

    fn check_endpoints(&self, def: &RelationshipTypeDefinition) -> Result<()> {
        for type_name in [&def.source_type, &def.target_type] {
            if !self.entity_index.contains_key(type_name.as_str()) {
                return Err(Error::UnknownEntityType(type_name.clone()));
            }
        }
        Ok(())
    }
}

/// Thread-safe registry of type definitions (one writer, many readers)
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    state: RwLock<RegistryState>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a registry document, entity types first
    pub fn from_document(doc: &SchemaDocument) -> Result<Self> {
        let registry = Self::new();
        for def in &doc.entity_types {
            registry.register_entity_type(def.clone())?;
        }
        for def in &doc.relationship_types {
            registry.register_relationship_type(def.clone())?;
        }
        Ok(registry)
    }

    /// Independent copy to apply changes to before they are published
    pub fn staged(&self) -> Result<Self> {
        Ok(Self {
            state: RwLock::new(self.read()?.clone()),
        })
    }

    /// Replace this registry's contents with a staged copy
    pub fn commit(&self, staged: SchemaRegistry) -> Result<()> {
        let state = staged
            .state
            .into_inner()
            .map_err(|e| Error::Internal(format!("Registry lock error: {}", e)))?;
        *self.write()? = state;
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RegistryState>> {
        self.state
            .read()
            .map_err(|e| Error::Internal(format!("Registry lock error: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RegistryState>> {
        self.state
            .write()
            .map_err(|e| Error::Internal(format!("Registry lock error: {}", e)))
    }

    /// Register a new entity type; fails with `DuplicateType` if the name is taken
    pub fn register_entity_type(&self, def: EntityTypeDefinition) -> Result<()> {
        def.check()?;
        let mut state = self.write()?;
        if state.entity_index.contains_key(&def.name) {
            return Err(Error::DuplicateType(def.name));
        }
        tracing::debug!("Registering entity type {} ({} fields)", def.name, def.fields.len());
        let index = state.entity_types.len();
        state.entity_index.insert(def.name.clone(), index);
        state.entity_types.push(def);
        Ok(())
    }

    /// Register a new relationship type.
    ///
    /// Source and target entity types must already be registered. Names are
    /// globally unique, so a second definition with the same name fails with
    /// `DuplicateType` even when its endpoint types differ.
    pub fn register_relationship_type(&self, def: RelationshipTypeDefinition) -> Result<()> {
        def.check()?;
        let mut state = self.write()?;
        state.check_endpoints(&def)?;
        if state.relationship_index.contains_key(&def.name) {
            return Err(Error::DuplicateType(def.name));
        }
        tracing::debug!(
            "Registering relationship type {} ({} -> {})",
            def.name,
            def.source_type,
            def.target_type
        );
        let index = state.relationship_types.len();
        state.relationship_index.insert(def.name.clone(), index);
        state.relationship_types.push(def);
        Ok(())
    }

    pub fn lookup_entity_type(&self, name: &str) -> Result<EntityTypeDefinition> {
        self.read()?
            .entity_type(name)
            .cloned()
            .ok_or_else(|| Error::EntityTypeNotFound(name.to_string()))
    }

    pub fn lookup_relationship_type(&self, name: &str) -> Result<RelationshipTypeDefinition> {
        self.read()?
            .relationship_type(name)
            .cloned()
            .ok_or_else(|| Error::RelationshipTypeNotFound(name.to_string()))
    }

    pub fn contains_entity_type(&self, name: &str) -> Result<bool> {
        Ok(self.read()?.entity_index.contains_key(name))
    }

    pub fn contains_relationship_type(&self, name: &str) -> Result<bool> {
        Ok(self.read()?.relationship_index.contains_key(name))
    }

    /// Entity types in registration order
    pub fn entity_types(&self) -> Result<Vec<EntityTypeDefinition>> {
        Ok(self.read()?.entity_types.clone())
    }

    /// Relationship types in registration order
    pub fn relationship_types(&self) -> Result<Vec<RelationshipTypeDefinition>> {
        Ok(self.read()?.relationship_types.clone())
    }

    /// Snapshot of the whole registry
    pub fn document(&self) -> Result<SchemaDocument> {
        let state = self.read()?;
        Ok(SchemaDocument {
            entity_types: state.entity_types.clone(),
            relationship_types: state.relationship_types.clone(),
        })
    }

    /// Replace an existing entity type definition, returning the previous one
    pub fn redefine_entity_type(&self, def: EntityTypeDefinition) -> Result<EntityTypeDefinition> {
        def.check()?;
        let mut state = self.write()?;
        let index = *state
            .entity_index
            .get(&def.name)
            .ok_or_else(|| Error::EntityTypeNotFound(def.name.clone()))?;
        tracing::debug!("Redefining entity type {}", def.name);
        Ok(std::mem::replace(&mut state.entity_types[index], def))
    }

    /// Replace an existing relationship type definition, returning the previous one
    pub fn redefine_relationship_type(
        &self,
        def: RelationshipTypeDefinition,
    ) -> Result<RelationshipTypeDefinition> {
        def.check()?;
        let mut state = self.write()?;
        let index = *state
            .relationship_index
            .get(&def.name)
            .ok_or_else(|| Error::RelationshipTypeNotFound(def.name.clone()))?;
        state.check_endpoints(&def)?;
        tracing::debug!("Redefining relationship type {}", def.name);
        Ok(std::mem::replace(&mut state.relationship_types[index], def))
    }
}
