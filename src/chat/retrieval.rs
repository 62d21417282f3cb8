//! Retrieval seam: query embedding plus similarity search.

use async_trait::async_trait;
use std::sync::Arc;

use crate::chat::ChatError;
use crate::chat::types::RetrievedChunk;
use crate::embedding::EmbeddingClient;
use crate::vector::{ScoredPoint, VectorService};

/// Interface the orchestrator retrieves context through.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return up to `k` chunks from `collection` relevant to `query`.
    async fn search(
        &self,
        collection: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, ChatError>;
}

/// Production retriever composing the embedding client and the vector store.
pub struct VectorRetriever {
    embeddings: Arc<dyn EmbeddingClient + Send + Sync>,
    vectors: Arc<VectorService>,
}

impl VectorRetriever {
    /// Compose a retriever from its two collaborators.
    pub fn new(
        embeddings: Arc<dyn EmbeddingClient + Send + Sync>,
        vectors: Arc<VectorService>,
    ) -> Self {
        Self {
            embeddings,
            vectors,
        }
    }
}

#[async_trait]
impl Retriever for VectorRetriever {
    async fn search(
        &self,
        collection: &str,
        query: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, ChatError> {
        let mut vectors = self
            .embeddings
            .generate_embeddings(vec![query.to_string()])
            .await?;
        let vector = vectors
            .pop()
            .ok_or_else(|| ChatError::InvalidInput("query produced no embedding".into()))?;

        let points = self.vectors.search_points(collection, vector, k).await?;
        tracing::debug!(collection, k, hits = points.len(), "Retrieved context chunks");
        Ok(points.into_iter().map(chunk_from_point).collect())
    }
}

/// Map a scored payload onto the chunk shape the orchestrator consumes.
pub(crate) fn chunk_from_point(point: ScoredPoint) -> RetrievedChunk {
    let payload = point.payload.unwrap_or_default();
    let text = payload
        .get("text")
        .and_then(|value| value.as_str())
        .unwrap_or_default()
        .to_string();
    let source = payload
        .get("source")
        .or_else(|| payload.get("filename"))
        .and_then(|value| value.as_str())
        .map(str::to_string);
    let page = payload
        .get("page")
        .and_then(|value| value.as_u64())
        .map(|page| page as u32);
    let storage_url = payload
        .get("storage_url")
        .and_then(|value| value.as_str())
        .map(str::to_string);

    RetrievedChunk {
        text,
        source,
        page,
        storage_url,
        score: point.score,
    }
}
