//! Schemagraph Storage - Storage backends and the validated graph store
//!
//! This crate provides the backends persisting the registry document and
//! the entity and relationship logs, plus `GraphStore`, which validates
//! every write against the schema registry before it reaches a backend.

#![allow(clippy::result_large_err)]

pub mod error;
pub mod store;
pub mod traits;

#[cfg(feature = "redb")]
pub mod redb;

pub mod memory;

pub use error::{StorageError, StorageResult};
pub use store::GraphStore;
pub use traits::StorageBackend;

#[cfg(feature = "redb")]
pub use redb::RedbStorage;

pub use memory::MemoryStorage;
