//! The document store capability.
//!
//! Records are addressed by collection name and string ID. Every stored
//! record carries a version number maintained by the store; writes other than
//! `create` are conditional on that version so that concurrent
//! read-modify-write cycles cannot silently overwrite each other.

use std::sync::Arc;

use mongodb::bson::Document;
use thiserror::Error;

mod collection;
mod memory;
mod mongo;

pub use collection::{Coll, Record, MAX_WRITE_ATTEMPTS};
pub use memory::MemoryStore;
pub use mongo::MongoStore;

/// Version number of a stored record. Starts at 1 on creation.
pub type Version = i64;

/// A record together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub version: Version,
    pub data: T,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Document {collection}/{id} already exists")]
    AlreadyExists { collection: String, id: String },
    #[error("Document {collection}/{id} does not exist")]
    NotFound { collection: String, id: String },
    #[error("Document {collection}/{id} was modified concurrently")]
    ConcurrentModification { collection: String, id: String },
    #[error("Malformed document in {collection}: {reason}")]
    Malformed { collection: String, reason: String },
    #[error(transparent)]
    Db(#[from] mongodb::error::Error),
}

impl StoreError {
    pub(crate) fn already_exists(collection: &str, id: &str) -> Self {
        Self::AlreadyExists {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn not_found(collection: &str, id: &str) -> Self {
        Self::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn conflict(collection: &str, id: &str) -> Self {
        Self::ConcurrentModification {
            collection: collection.to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn malformed(collection: &str, reason: impl ToString) -> Self {
        Self::Malformed {
            collection: collection.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Key-addressed, collection-organised persistence.
#[rocket::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a new record. Fails with [`StoreError::AlreadyExists`] rather
    /// than overwriting.
    async fn create(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError>;

    /// Fetch a record and its current version.
    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Versioned<Document>>, StoreError>;

    /// Replace a record iff its version is still `expected`, returning the
    /// new version. Fails with [`StoreError::ConcurrentModification`] if the
    /// record changed since it was read.
    async fn replace(
        &self,
        collection: &str,
        id: &str,
        data: Document,
        expected: Version,
    ) -> Result<Version, StoreError>;

    /// Every record in the collection, keyed by ID.
    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError>;
}

/// The store handle placed into managed state.
pub type Store = Arc<dyn DocumentStore>;
