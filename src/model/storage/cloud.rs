use std::collections::HashMap;

use reqwest::{header::CONTENT_TYPE, Client, Response, StatusCode};
use rocket::serde::json::serde_json::json;
use serde::Deserialize;

use super::{ObjectStorage, StoredObject, Upload, UploadError, DOWNLOAD_TOKEN_KEY};

/// Object storage in a Google Cloud Storage bucket, via the JSON API.
pub struct CloudStorage {
    client: Client,
    api_url: String,
    bucket: String,
    access_token: String,
}

/// The parts of a GCS object resource we care about.
#[derive(Debug, Deserialize)]
struct ObjectResource {
    bucket: String,
    name: String,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl ObjectResource {
    /// Whether the given download token is among those attached to the object.
    fn has_token(&self, token: &str) -> bool {
        self.metadata
            .get(DOWNLOAD_TOKEN_KEY)
            .map(|tokens| tokens.split(',').any(|t| t.trim() == token))
            .unwrap_or(false)
    }
}

impl CloudStorage {
    pub fn new(
        api_url: impl Into<String>,
        bucket: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            access_token: access_token.into(),
        }
    }

    fn object_url(&self, name: &str) -> String {
        format!("{}/storage/v1/b/{}/o/{}", self.api_url, self.bucket, name)
    }
}

/// Turn a non-success response into an [`UploadError::Rejected`].
async fn check(response: Response) -> Result<Response, UploadError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(UploadError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

#[rocket::async_trait]
impl ObjectStorage for CloudStorage {
    async fn upload(&self, upload: Upload<'_>) -> Result<StoredObject, UploadError> {
        let bytes = rocket::tokio::fs::read(upload.path).await?;
        debug!(
            "Uploading {} ({} bytes) to bucket {}",
            upload.key,
            bytes.len(),
            self.bucket
        );

        // Media upload first, then attach the metadata.
        let response = self
            .client
            .post(format!(
                "{}/upload/storage/v1/b/{}/o",
                self.api_url, self.bucket
            ))
            .query(&[("uploadType", "media"), ("name", upload.key)])
            .bearer_auth(&self.access_token)
            .header(CONTENT_TYPE, upload.content_type)
            .body(bytes)
            .send()
            .await?;
        let created: ObjectResource = check(response).await?.json().await?;

        let patch = json!({
            "contentType": upload.content_type,
            "metadata": { DOWNLOAD_TOKEN_KEY: upload.download_token },
        });
        let response = self
            .client
            .patch(self.object_url(&created.name))
            .bearer_auth(&self.access_token)
            .json(&patch)
            .send()
            .await?;
        let patched: ObjectResource = check(response).await?.json().await?;

        Ok(StoredObject {
            bucket: patched.bucket,
            name: patched.name,
            download_token: upload.download_token.to_string(),
        })
    }

    async fn is_finalized(&self, object: &StoredObject) -> Result<bool, UploadError> {
        let response = self
            .client
            .get(self.object_url(&object.name))
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        let resource: ObjectResource = check(response).await?.json().await?;
        Ok(resource.has_token(&object.download_token))
    }
}
