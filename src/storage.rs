//! Object-storage upload adapter.
//!
//! Ingestion uploads each source PDF so retrieved chunks can cite a fetchable
//! document URL. The store is optional; without one, ingestion falls back to
//! local file paths.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use thiserror::Error;

/// Errors raised while talking to the object store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Store responded with an unexpected status code.
    #[error("Unexpected object store response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the store.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
}

/// Interface implemented by object storage backends.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload an object and return its public URL.
    async fn upload(&self, object_name: &str, bytes: Vec<u8>) -> Result<String, StorageError>;
}

/// Object store speaking plain HTTP PUT against a base URL.
pub struct HttpObjectStore {
    pub(crate) client: Client,
    pub(crate) base_url: String,
}

impl HttpObjectStore {
    /// Construct a store rooted at `base_url`.
    pub fn new(base_url: &str) -> Result<Self, StorageError> {
        let client = Client::builder().user_agent("studyrag/0.1").build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn upload(&self, object_name: &str, bytes: Vec<u8>) -> Result<String, StorageError> {
        let url = format!("{}/{}", self.base_url, object_name.trim_start_matches('/'));
        tracing::debug!(object = object_name, bytes = bytes.len(), "Uploading object");

        let response = self
            .client
            .put(&url)
            .header("content-type", "application/octet-stream")
            .body(bytes)
            .send()
            .await?;

        if response.status().is_success() {
            tracing::info!(object = object_name, url = %url, "Object uploaded");
            Ok(url)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = StorageError::UnexpectedStatus { status, body };
            tracing::error!(object = object_name, error = %error, "Object upload failed");
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::PUT, MockServer};

    #[tokio::test]
    async fn upload_puts_bytes_and_returns_url() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(PUT)
                    .path("/documents/physics.pdf")
                    .body("pdf-bytes");
                then.status(200);
            })
            .await;

        let store = HttpObjectStore::new(&format!("{}/documents", server.base_url()))
            .expect("store builds");
        let url = store
            .upload("physics.pdf", b"pdf-bytes".to_vec())
            .await
            .expect("upload");

        mock.assert();
        assert!(url.ends_with("/documents/physics.pdf"));
    }

    #[tokio::test]
    async fn failed_upload_surfaces_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(PUT).path("/documents/physics.pdf");
                then.status(503).body("unavailable");
            })
            .await;

        let store = HttpObjectStore::new(&format!("{}/documents", server.base_url()))
            .expect("store builds");
        let err = store
            .upload("physics.pdf", b"pdf-bytes".to_vec())
            .await
            .expect_err("must fail");
        assert!(matches!(err, StorageError::UnexpectedStatus { .. }));
    }
}
