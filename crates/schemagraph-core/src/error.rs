//! Error types for schemagraph core

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::limits::ValidationError;
use crate::validation::{Violation, ViolationKind};

/// Result type alias using schemagraph's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Schemagraph error types
#[derive(Error, Debug)]
pub enum Error {
    #[error("Type already registered: {0}")]
    DuplicateType(String),

    #[error("Unknown entity type referenced: {0}")]
    UnknownEntityType(String),

    #[error("Entity type not found: {0}")]
    EntityTypeNotFound(String),

    #[error("Relationship type not found: {0}")]
    RelationshipTypeNotFound(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Relationship not found: {0}")]
    RelationshipNotFound(String),

    #[error("Schema violation for {subject}: {}", join_violations(.violations))]
    SchemaViolation {
        subject: String,
        violations: Vec<Violation>,
    },

    #[error("Relationship {id} already closed at {valid_to}")]
    AlreadyClosed { id: String, valid_to: DateTime<Utc> },

    #[error("Invalid time range: valid_to {valid_to} precedes valid_from {valid_from}")]
    InvalidTimeRange {
        valid_from: DateTime<Utc>,
        valid_to: DateTime<Utc>,
    },

    #[error("Invalid definition for {name}: {reason}")]
    InvalidDefinition { name: String, reason: String },

    #[error("Entity name '{name}' is ambiguous ({count} matches), use an id")]
    AmbiguousEntityName { name: String, count: usize },

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn invalid_definition(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// True for any "type or instance not found" failure
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::EntityTypeNotFound(_)
                | Self::RelationshipTypeNotFound(_)
                | Self::EntityNotFound(_)
                | Self::RelationshipNotFound(_)
        )
    }

    /// Field-level violations carried by a `SchemaViolation`, empty otherwise
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::SchemaViolation { violations, .. } => violations,
            _ => &[],
        }
    }

    /// Whether this is a `SchemaViolation` containing a violation of `kind`
    pub fn has_violation(&self, kind: ViolationKind) -> bool {
        self.violations().iter().any(|v| v.kind() == kind)
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
