use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use mongodb::bson::Document;
use rocket::tokio::sync::RwLock;

use super::{DocumentStore, StoreError, Version, Versioned};

type Collection = BTreeMap<String, Versioned<Document>>;

/// An in-process [`DocumentStore`], for tests and local development.
///
/// Clones share the same underlying data.
#[derive(Clone, Default)]
pub struct MemoryStore {
    collections: Arc<RwLock<HashMap<String, Collection>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rocket::async_trait]
impl DocumentStore for MemoryStore {
    async fn create(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let records = collections.entry(collection.to_string()).or_default();
        if records.contains_key(id) {
            return Err(StoreError::already_exists(collection, id));
        }
        records.insert(id.to_string(), Versioned { version: 1, data });
        Ok(())
    }

    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Versioned<Document>>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|records| records.get(id))
            .cloned())
    }

    async fn replace(
        &self,
        collection: &str,
        id: &str,
        data: Document,
        expected: Version,
    ) -> Result<Version, StoreError> {
        let mut collections = self.collections.write().await;
        let record = collections
            .get_mut(collection)
            .and_then(|records| records.get_mut(id))
            .ok_or_else(|| StoreError::not_found(collection, id))?;
        if record.version != expected {
            return Err(StoreError::conflict(collection, id));
        }
        record.version += 1;
        record.data = data;
        Ok(record.version)
    }

    async fn list(&self, collection: &str) -> Result<Vec<(String, Document)>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|records| {
                records
                    .iter()
                    .map(|(id, record)| (id.clone(), record.data.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }
}
