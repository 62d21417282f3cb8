//! Embedding client abstraction and the OpenAI-compatible adapter.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;

use crate::config::get_config;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// HTTP layer failed before receiving a response.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    /// Provider responded with an unexpected status code.
    #[error("Unexpected embedding response ({status}): {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient {
    /// Produce an embedding vector for each supplied chunk of text.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Embedding client speaking the OpenAI `/embeddings` wire format.
pub struct OpenAiEmbeddingClient {
    pub(crate) client: Client,
    pub(crate) base_url: String,
    pub(crate) api_key: String,
    pub(crate) model: String,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbeddingClient {
    /// Construct a client from the process configuration.
    pub fn new() -> Result<Self, EmbeddingClientError> {
        let config = get_config();
        let client = Client::builder().user_agent("studyrag/0.1").build()?;
        Ok(Self {
            client,
            base_url: config.openai_api_url.clone(),
            api_key: config.openai_api_key.clone(),
            model: config.embedding_model.clone(),
        })
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Err(EmbeddingClientError::GenerationFailed(
                "no texts provided".to_string(),
            ));
        }

        let expected = texts.len();
        tracing::debug!(model = %self.model, batch = expected, "Generating embeddings");

        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "input": texts,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let error = EmbeddingClientError::UnexpectedStatus { status, body };
            tracing::error!(error = %error, "Embedding request failed");
            return Err(error);
        }

        let payload: EmbeddingsResponse = response.json().await?;
        if payload.data.len() != expected {
            return Err(EmbeddingClientError::GenerationFailed(format!(
                "provider returned {} embeddings for {} inputs",
                payload.data.len(),
                expected
            )));
        }

        // the provider may reorder the batch; `index` restores input order
        let mut data = payload.data;
        data.sort_by_key(|datum| datum.index);
        Ok(data.into_iter().map(|datum| datum.embedding).collect())
    }
}
