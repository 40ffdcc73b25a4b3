//! Knowledge graph trait definition

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId, Metadata, NewEntity};
use crate::error::{Error, Result};
use crate::query::{sort_relationships, EntityFilter, RelationshipFilter};
use crate::relationship::{Direction, NewRelationship, Relationship, RelationshipId};
use crate::schema::{EntityTypeDefinition, RelationshipTypeDefinition, SchemaDocument};
use crate::traversal::{GraphPath, TraversalQuery, TraversalResult};
use crate::validation::Violation;

/// Full graph layout: registry document plus both instance collections
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphDocument {
    pub schema: SchemaDocument,
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

/// Relationship in an import document; endpoints are entity names or ids
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportRelationship {
    pub source: String,
    pub target: String,
    pub relationship_type: String,
    #[serde(default)]
    pub fact: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_from: Option<DateTime<Utc>>,
}

/// Batch of types and instances to load in one go
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportDocument {
    #[serde(default)]
    pub schema: SchemaDocument,
    #[serde(default)]
    pub entities: Vec<NewEntity>,
    #[serde(default)]
    pub relationships: Vec<ImportRelationship>,
}

/// Payload accepted by the `import` command: an exported graph, restored
/// with its ids and validity intervals, or a batch that names entities
#[derive(Debug, Clone)]
pub enum ImportSource {
    Graph(GraphDocument),
    Batch(ImportDocument),
}

impl ImportSource {
    /// Parse either shape; entities carrying an `id` or relationships keyed by
    /// `source_id` mark an exported graph
    pub fn from_json(content: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let any_has = |key: &str, field: &str| {
            value
                .get(key)
                .and_then(|v| v.as_array())
                .is_some_and(|items| items.iter().any(|item| item.get(field).is_some()))
        };
        if any_has("entities", "id") || any_has("relationships", "source_id") {
            Ok(Self::Graph(serde_json::from_value(value)?))
        } else {
            Ok(Self::Batch(serde_json::from_value(value)?))
        }
    }
}

/// Counts of what an import wrote
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    pub entity_types_registered: usize,
    pub relationship_types_registered: usize,
    pub entities_created: usize,
    pub relationships_created: usize,
}

/// Violations of one stored instance found after a redefinition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceViolation {
    /// Entity or relationship id
    pub instance_id: String,
    pub violations: Vec<Violation>,
}

impl InstanceViolation {
    pub fn into_error(self) -> Error {
        Error::SchemaViolation {
            subject: self.instance_id,
            violations: self.violations,
        }
    }
}

/// Outcome of redefining a type: per-instance results, not a single failure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedefinitionReport {
    pub type_name: String,
    pub instances_checked: usize,
    pub violations: Vec<InstanceViolation>,
}

impl RedefinitionReport {
    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Main trait for schema-validated graph operations
#[async_trait]
pub trait KnowledgeGraph: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Schema Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Register a new entity type
    async fn register_entity_type(&self, def: EntityTypeDefinition) -> Result<()>;

    /// Register a new relationship type between registered entity types
    async fn register_relationship_type(&self, def: RelationshipTypeDefinition) -> Result<()>;

    async fn lookup_entity_type(&self, name: &str) -> Result<EntityTypeDefinition>;

    async fn lookup_relationship_type(&self, name: &str) -> Result<RelationshipTypeDefinition>;

    /// The registry document
    async fn schema(&self) -> Result<SchemaDocument>;

    /// Entity types in registration order
    async fn list_entity_types(&self) -> Result<Vec<EntityTypeDefinition>> {
        Ok(self.schema().await?.entity_types)
    }

    /// Relationship types in registration order
    async fn list_relationship_types(&self) -> Result<Vec<RelationshipTypeDefinition>> {
        Ok(self.schema().await?.relationship_types)
    }

    /// Replace an entity type and revalidate every entity of that type
    async fn redefine_entity_type(&self, def: EntityTypeDefinition) -> Result<RedefinitionReport>;

    /// Replace a relationship type and revalidate every relationship of that type
    async fn redefine_relationship_type(
        &self,
        def: RelationshipTypeDefinition,
    ) -> Result<RedefinitionReport>;

    // ─────────────────────────────────────────────────────────────────────────
    // Entity Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Validate and store a new entity
    async fn create_entity(&self, entity: NewEntity) -> Result<Entity>;

    async fn get_entity(&self, id: &EntityId) -> Result<Entity>;

    /// Revalidate and replace an entity's metadata; id and created_at are kept
    async fn update_entity(&self, id: &EntityId, metadata: Metadata) -> Result<Entity>;

    /// Entities of one type, in insertion order
    async fn list_entities_by_type(&self, entity_type: &str) -> Result<Vec<Entity>>;

    /// Entities whose display name equals `name`, in insertion order
    async fn find_entities_by_name(&self, name: &str) -> Result<Vec<Entity>>;

    /// Resolve an id or a unique display name to an entity
    async fn resolve_entity(&self, reference: &str) -> Result<Entity> {
        if let Ok(id) = EntityId::from_string(reference) {
            match self.get_entity(&id).await {
                Err(Error::EntityNotFound(_)) => {}
                other => return other,
            }
        }
        let mut matches = self.find_entities_by_name(reference).await?;
        match matches.len() {
            0 => Err(Error::EntityNotFound(reference.to_string())),
            1 => Ok(matches.remove(0)),
            count => Err(Error::AmbiguousEntityName {
                name: reference.to_string(),
                count,
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Relationship Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Validate and store a new open relationship
    async fn create_relationship(
        &self,
        relationship: NewRelationship,
    ) -> Result<Relationship>;

    async fn get_relationship(&self, id: &RelationshipId) -> Result<Relationship>;

    /// Close a relationship at `valid_to`; fails with `AlreadyClosed` if already closed
    async fn supersede_relationship(
        &self,
        id: &RelationshipId,
        valid_to: DateTime<Utc>,
    ) -> Result<Relationship>;

    /// Relationships matching the filter, ordered by created_at then id
    async fn query_relationships(&self, filter: &RelationshipFilter) -> Result<Vec<Relationship>>;

    /// Relationships touching an entity in the given direction; current ones
    /// unless `as_of` is given
    async fn relationships_of(
        &self,
        entity_id: &EntityId,
        direction: Direction,
        as_of: Option<DateTime<Utc>>,
    ) -> Result<Vec<Relationship>> {
        self.get_entity(entity_id).await?;
        let base = match as_of {
            Some(at) => RelationshipFilter::new().as_of(at),
            None => RelationshipFilter::new().current(),
        };
        let mut relationships = Vec::new();
        if matches!(direction, Direction::Outgoing | Direction::Both) {
            relationships.extend(
                self.query_relationships(&base.clone().source(entity_id.clone()))
                    .await?,
            );
        }
        if matches!(direction, Direction::Incoming | Direction::Both) {
            let incoming = self
                .query_relationships(&base.target(entity_id.clone()))
                .await?;
            // Self-loops already came in through the outgoing side
            relationships.extend(incoming.into_iter().filter(|rel| {
                direction == Direction::Incoming || rel.source_id != *entity_id
            }));
        }
        sort_relationships(&mut relationships);
        Ok(relationships)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Query Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Breadth-first traversal (or shortest path when the query has a target)
    async fn traverse(&self, query: &TraversalQuery) -> Result<TraversalResult>;

    /// Shortest path between two entities, `None` if unreachable within depth
    async fn find_path(
        &self,
        from: &EntityId,
        to: &EntityId,
        query: TraversalQuery,
    ) -> Result<Option<GraphPath>> {
        let mut query = query.find_path_to(to.clone());
        query.start = from.clone();
        let result = self.traverse(&query).await?;
        Ok(result.paths.into_iter().next())
    }

    /// Linear scan of entities matching type and metadata predicates
    async fn find_by_type(&self, filter: &EntityFilter) -> Result<Vec<Entity>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Bulk Operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Register missing types, then create entities and relationships
    async fn import(&self, document: ImportDocument) -> Result<ImportSummary>;

    /// Load an exported graph, keeping ids, timestamps and validity
    /// intervals; validated in full before anything is written
    async fn restore(&self, document: GraphDocument) -> Result<ImportSummary>;

    /// Export the full graph layout
    async fn export(&self) -> Result<GraphDocument>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::ViolationKind;

    #[test]
    fn test_import_document_defaults() {
        let doc: ImportDocument = serde_json::from_str(
            r#"{
                "entities": [{"entity_type": "feature", "name": "Feed System"}],
                "relationships": [{"source": "AgentForge", "target": "Feed System", "relationship_type": "has_feature"}]
            }"#,
        )
        .unwrap();

        assert!(doc.schema.is_empty());
        assert_eq!(doc.entities[0].metadata.len(), 0);
        assert_eq!(doc.relationships[0].fact, "");
        assert!(doc.relationships[0].valid_from.is_none());
    }

    #[test]
    fn test_import_source_detects_shape() {
        let batch = ImportSource::from_json(
            r#"{"entities": [{"entity_type": "feature", "name": "Feed System"}]}"#,
        )
        .unwrap();
        assert!(matches!(batch, ImportSource::Batch(doc) if doc.entities.len() == 1));

        let exported = GraphDocument {
            entities: vec![Entity::new("feature", "Feed System")],
            ..GraphDocument::default()
        };
        let graph = ImportSource::from_json(&serde_json::to_string(&exported).unwrap()).unwrap();
        assert!(
            matches!(graph, ImportSource::Graph(doc) if doc.entities[0].id == exported.entities[0].id)
        );

        assert!(ImportSource::from_json("{not json").is_err());
    }

    #[test]
    fn test_instance_violation_into_error() {
        let violation = InstanceViolation {
            instance_id: "01J0000000000000000000000".to_string(),
            violations: vec![Violation::MissingField {
                field: "path".to_string(),
            }],
        };
        let err = violation.into_error();
        assert!(err.has_violation(ViolationKind::MissingField));
        assert!(err.to_string().contains("missing required field 'path'"));
    }
}
