//! Blob upload collaborator.
//!
//! The image host is an external service behind a narrow interface: bytes in,
//! durable URL out. Every caller fails closed when the store is missing or
//! the upload fails; there is no local-disk fallback on any path.

use crate::error::{AppError, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// Folder for owner profile images.
pub const PROFILE_FOLDER: &str = "owner_profiles";
/// Folder for listing cover images.
pub const COVER_FOLDER: &str = "owner_books";

/// Narrow interface to the image-hosting service.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Upload raw bytes and return a durable URL.
    async fn upload(&self, bytes: Vec<u8>, filename: &str, folder: &str) -> Result<String>;
}

/// Response shape of the upload endpoint.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
}

/// HTTP-backed blob store posting multipart uploads to a configured
/// endpoint.
pub struct HttpBlobStore {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpBlobStore {
    /// Create a store targeting `endpoint`, authenticated with `api_key`.
    pub fn new(endpoint: String, api_key: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
        }
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn upload(&self, bytes: Vec<u8>, filename: &str, folder: &str) -> Result<String> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("folder", folder.to_string());

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Blob upload request failed");
                AppError::Upstream("Image upload failed".to_string())
            })?;

        if !response.status().is_success() {
            tracing::error!(status = %response.status(), "Blob store rejected upload");
            return Err(AppError::Upstream("Image upload failed".to_string()));
        }

        let body: UploadResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "Blob store returned unparseable response");
            AppError::Upstream("Image upload failed".to_string())
        })?;

        Ok(body.secure_url)
    }
}

/// In-memory blob store (for testing).
#[derive(Default)]
pub struct MemoryBlobStore {
    uploads: parking_lot::Mutex<Vec<String>>,
}

impl MemoryBlobStore {
    /// Filenames uploaded so far.
    pub fn uploaded(&self) -> Vec<String> {
        self.uploads.lock().clone()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(&self, _bytes: Vec<u8>, filename: &str, folder: &str) -> Result<String> {
        self.uploads.lock().push(filename.to_string());
        Ok(format!("memory://{}/{}", folder, filename))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_returns_durable_url() {
        let store = MemoryBlobStore::default();
        let url = tokio_test::block_on(store.upload(vec![1, 2, 3], "cover.png", COVER_FOLDER));
        assert_eq!(url.unwrap(), "memory://owner_books/cover.png");
        assert_eq!(store.uploaded(), vec!["cover.png".to_string()]);
    }
}
