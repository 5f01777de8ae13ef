//! The object storage capability: put a file somewhere retrievable and hand
//! back enough to build a public download URL.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

mod cloud;
mod memory;

pub use cloud::CloudStorage;
pub use memory::{MemoryObject, MemoryStorage};

/// Base of the public download endpoint for stored objects.
pub const DOWNLOAD_BASE_URL: &str = "https://firebasestorage.googleapis.com/v0";

/// Object metadata key holding the download token.
pub const DOWNLOAD_TOKEN_KEY: &str = "firebaseStorageDownloadTokens";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file provided")]
    MissingFile,
    #[error("Storage request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Storage service responded with {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("Uploaded object {0} was not finalized in time")]
    NotFinalized(String),
    #[error("Failed to read upload: {0}")]
    Io(#[from] std::io::Error),
}

/// A file waiting to be uploaded.
#[derive(Debug)]
pub struct Upload<'a> {
    /// Local path of the staged file.
    pub path: &'a Path,
    /// Name to store the object under.
    pub key: &'a str,
    pub content_type: &'a str,
    /// Token that authorises anonymous download of the object.
    pub download_token: &'a str,
}

/// An object as stored by the storage service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bucket: String,
    pub name: String,
    pub download_token: String,
}

impl StoredObject {
    /// The public URL the object can be fetched from.
    pub fn download_url(&self) -> String {
        format!(
            "{DOWNLOAD_BASE_URL}/b/{}/o/{}?alt=media&token={}",
            self.bucket, self.name, self.download_token
        )
    }
}

#[rocket::async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store the file, attaching its content type and download token as
    /// object metadata.
    async fn upload(&self, upload: Upload<'_>) -> Result<StoredObject, UploadError>;

    /// Whether the object is fully written and its download token is live.
    async fn is_finalized(&self, object: &StoredObject) -> Result<bool, UploadError>;
}

/// The storage handle placed into managed state.
pub type Storage = Arc<dyn ObjectStorage>;

/// Poll until the object is finalized, checking up to `attempts` times with
/// `interval` between checks.
pub async fn wait_until_finalized(
    storage: &dyn ObjectStorage,
    object: &StoredObject,
    interval: Duration,
    attempts: u32,
) -> Result<(), UploadError> {
    for attempt in 1..=attempts {
        if storage.is_finalized(object).await? {
            debug!("{} finalized after {attempt} check(s)", object.name);
            return Ok(());
        }
        if attempt < attempts {
            rocket::tokio::time::sleep(interval).await;
        }
    }
    Err(UploadError::NotFinalized(object.name.clone()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn object() -> StoredObject {
        StoredObject {
            bucket: "wyr.appspot.com".to_string(),
            name: "avatar-u1-abc.png".to_string(),
            download_token: "1234".to_string(),
        }
    }

    #[test]
    fn download_url_embeds_bucket_name_and_token() {
        assert_eq!(
            object().download_url(),
            "https://firebasestorage.googleapis.com/v0/b/wyr.appspot.com/o/avatar-u1-abc.png?alt=media&token=1234"
        );
    }

    /// Reports finalized from the `ready_after`th check onwards.
    struct Eventually {
        checks: AtomicU32,
        ready_after: u32,
    }

    #[rocket::async_trait]
    impl ObjectStorage for Eventually {
        async fn upload(&self, _: Upload<'_>) -> Result<StoredObject, UploadError> {
            Ok(object())
        }

        async fn is_finalized(&self, _: &StoredObject) -> Result<bool, UploadError> {
            let checks = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(checks >= self.ready_after)
        }
    }

    #[rocket::async_test]
    async fn polls_until_finalized() {
        let storage = Eventually {
            checks: AtomicU32::new(0),
            ready_after: 3,
        };
        wait_until_finalized(&storage, &object(), Duration::from_millis(1), 5)
            .await
            .unwrap();
        assert_eq!(storage.checks.load(Ordering::SeqCst), 3);
    }

    #[rocket::async_test]
    async fn gives_up_after_attempts() {
        let storage = Eventually {
            checks: AtomicU32::new(0),
            ready_after: 10,
        };
        let result = wait_until_finalized(&storage, &object(), Duration::from_millis(1), 4).await;
        assert!(matches!(result, Err(UploadError::NotFinalized(_))));
        assert_eq!(storage.checks.load(Ordering::SeqCst), 4);
    }
}
