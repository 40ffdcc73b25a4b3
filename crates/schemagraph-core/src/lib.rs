//! Schemagraph Core - schema-validated entity/relationship graph
//!
//! This crate provides the data model, the schema registry, the validator
//! and the traversal engine shared by the storage backends and the CLI.

pub mod entity;
pub mod error;
pub mod graph;
pub mod limits;
pub mod presets;
pub mod query;
pub mod registry;
pub mod relationship;
pub mod schema;
pub mod traversal;
pub mod validation;

pub use entity::{Entity, EntityId, EntityType, Metadata, NewEntity};
pub use error::{Error, Result};
pub use graph::{
    GraphDocument, ImportDocument, ImportRelationship, ImportSource, ImportSummary,
    InstanceViolation, KnowledgeGraph, RedefinitionReport,
};
pub use query::{EntityFilter, RelationshipFilter};
pub use registry::SchemaRegistry;
pub use relationship::{Direction, NewRelationship, Relationship, RelationshipId};
pub use schema::{
    EntityTypeDefinition, FieldDefinition, FieldKind, RelationshipTypeDefinition, SchemaDocument,
};
pub use traversal::{
    GraphPath, PathEdge, ReachedEntity, TraversalEngine, TraversalQuery, TraversalResult,
    TraversalStats,
};
pub use validation::{Endpoint, ValidationReport, Violation, ViolationKind};
