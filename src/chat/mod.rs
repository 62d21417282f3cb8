//! Retrieval-augmented chat orchestration.
//!
//! One canonical path serves every streaming endpoint; the endpoints differ
//! only in configuration (retrieval fan-out and persona shaping). The
//! orchestrator talks to its collaborators through narrow traits so tests can
//! swap in stubs.

pub mod citations;
mod orchestrator;
mod retrieval;
pub mod types;

use thiserror::Error;

pub use orchestrator::{ChatOrchestrator, ChatRequest, PreparedQuery};
pub use retrieval::{Retriever, VectorRetriever};

use crate::embedding::EmbeddingClientError;
use crate::llm::LlmError;
use crate::vector::VectorStoreError;

/// Errors raised while orchestrating a chat exchange.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Request was malformed; reported to the caller before any stream opens.
    #[error("{0}")]
    InvalidInput(String),
    /// Vector store failed during retrieval.
    #[error("Retrieval failed: {0}")]
    Vector(#[from] VectorStoreError),
    /// Embedding provider failed during retrieval.
    #[error("Retrieval failed: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Language model failed during generation or transcription.
    #[error("Generation failed: {0}")]
    Llm(#[from] LlmError),
    /// Audio payload could not be resolved to bytes.
    #[error("Audio transcription failed: {0}")]
    Audio(String),
}
