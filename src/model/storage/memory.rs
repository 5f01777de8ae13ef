use std::collections::HashMap;
use std::sync::Arc;

use rocket::tokio::sync::RwLock;

use super::{ObjectStorage, StoredObject, Upload, UploadError};

/// An object as held by [`MemoryStorage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryObject {
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub download_token: String,
}

/// In-process [`ObjectStorage`], for tests and local development.
///
/// Clones share the same underlying objects.
#[derive(Clone)]
pub struct MemoryStorage {
    bucket: String,
    objects: Arc<RwLock<HashMap<String, MemoryObject>>>,
}

impl MemoryStorage {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Default::default(),
        }
    }

    /// Look up a stored object by name.
    pub async fn object(&self, name: &str) -> Option<MemoryObject> {
        self.objects.read().await.get(name).cloned()
    }

    /// Names of all stored objects.
    pub async fn names(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }
}

#[rocket::async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(&self, upload: Upload<'_>) -> Result<StoredObject, UploadError> {
        let bytes = rocket::tokio::fs::read(upload.path).await?;
        let object = MemoryObject {
            bytes,
            content_type: upload.content_type.to_string(),
            download_token: upload.download_token.to_string(),
        };
        self.objects
            .write()
            .await
            .insert(upload.key.to_string(), object);
        Ok(StoredObject {
            bucket: self.bucket.clone(),
            name: upload.key.to_string(),
            download_token: upload.download_token.to_string(),
        })
    }

    async fn is_finalized(&self, object: &StoredObject) -> Result<bool, UploadError> {
        Ok(self
            .object(&object.name)
            .await
            .map(|stored| stored.download_token == object.download_token)
            .unwrap_or(false))
    }
}
