//! Qdrant-backed vector store integration.
//!
//! The store speaks Qdrant's REST API over plain `reqwest`; payload helpers
//! keep chunk metadata on an allow-list so arbitrary client metadata never
//! lands in collection payloads.

mod client;
mod payload;
mod types;

pub use client::VectorService;
pub use payload::{
    build_payload, compute_chunk_hash, current_timestamp_rfc3339, sanitize_chunk_metadata,
};
pub use types::{PointInsert, ScoredPoint, VectorStoreError};
