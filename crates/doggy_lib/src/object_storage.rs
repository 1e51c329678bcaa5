//! A minimal client for S3-compatible object storage, used for profile
//! images.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use doggy_store::BoxError;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};
use url::Url;

use crate::config::ObjectStorageConfig;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("upload timed out after {0:?}")]
    Timeout(Duration),
    #[error("object storage answered with HTTP {0}")]
    Rejected(u16),
    #[error("object storage request failed: {0}")]
    Request(#[source] BoxError),
}

#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    /// Stores `content` under `bucket`/`key` and returns the URL at which the
    /// object can be publicly read.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content: Bytes,
        content_type: &str,
    ) -> Result<String, UploadError>;
}

/// Like [`ObjectStorage::put`], but gives up after `timeout`.
pub async fn put_with_timeout(
    storage: &dyn ObjectStorage,
    bucket: &str,
    key: &str,
    content: Bytes,
    content_type: &str,
    timeout: Duration,
) -> Result<String, UploadError> {
    match tokio::time::timeout(timeout, storage.put(bucket, key, content, content_type)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(%bucket, %key, ?timeout, "Upload timed out");
            Err(UploadError::Timeout(timeout))
        }
    }
}

/// Talks to the storage service over plain HTTP `PUT`s.
#[derive(Debug, Clone)]
pub struct HttpObjectStorage {
    client: reqwest::Client,
    endpoint: Url,
    public_base_url: Url,
}

impl HttpObjectStorage {
    pub fn new(endpoint: Url, public_base_url: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            public_base_url,
        }
    }

    pub fn from_config(config: &ObjectStorageConfig) -> Self {
        Self::new(config.endpoint.clone(), config.public_base_url.clone())
    }

    pub fn object_url(&self, bucket: &str, key: &str) -> String {
        join(&self.endpoint, bucket, key)
    }

    pub fn public_url(&self, bucket: &str, key: &str) -> String {
        join(&self.public_base_url, bucket, key)
    }
}

fn join(base: &Url, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", base.as_str().trim_end_matches('/'), bucket, key)
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        content: Bytes,
        content_type: &str,
    ) -> Result<String, UploadError> {
        let url = self.object_url(bucket, key);
        debug!(%url, size = content.len(), "Uploading object");

        let response = self
            .client
            .put(&url)
            .header(CONTENT_TYPE, content_type)
            .body(content)
            .send()
            .await
            .map_err(|e| UploadError::Request(Box::new(e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Rejected(status.as_u16()));
        }

        Ok(self.public_url(bucket, key))
    }
}
