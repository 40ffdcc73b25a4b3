//! Storage error types

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result type alias for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Storage-specific error types
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Relationship not found: {0}")]
    RelationshipNotFound(String),

    #[error("Duplicate entity: {0}")]
    DuplicateEntity(String),

    #[error("Duplicate relationship: {0}")]
    DuplicateRelationship(String),

    #[error("Relationship {id} already closed at {valid_to}")]
    AlreadyClosed { id: String, valid_to: DateTime<Utc> },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "redb")]
    #[error("ReDB database error: {0}")]
    RedbDatabase(#[from] ::redb::DatabaseError),

    #[cfg(feature = "redb")]
    #[error("ReDB table error: {0}")]
    RedbTable(#[from] ::redb::TableError),

    #[cfg(feature = "redb")]
    #[error("ReDB storage error: {0}")]
    RedbStorage(#[from] ::redb::StorageError),

    #[cfg(feature = "redb")]
    #[error("ReDB commit error: {0}")]
    RedbCommit(#[from] ::redb::CommitError),

    #[cfg(feature = "redb")]
    #[error("ReDB transaction error: {0}")]
    RedbTransaction(#[from] ::redb::TransactionError),
}

impl StorageError {
    pub(crate) fn lock(e: impl std::fmt::Display) -> Self {
        Self::Database(format!("Lock error: {}", e))
    }
}

impl From<StorageError> for schemagraph_core::Error {
    fn from(err: StorageError) -> Self {
        use schemagraph_core::Error;

        match err {
            StorageError::EntityNotFound(id) => Error::EntityNotFound(id),
            StorageError::RelationshipNotFound(id) => Error::RelationshipNotFound(id),
            StorageError::AlreadyClosed { id, valid_to } => Error::AlreadyClosed { id, valid_to },
            StorageError::Serialization(e) => Error::Serialization(e),
            other => Error::Storage(other.to_string()),
        }
    }
}
