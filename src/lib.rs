#![deny(missing_docs)]

//! Core library for the StudyRAG chat backend.

/// HTTP routing and REST handlers.
pub mod api;
/// Bearer-token authentication gate.
pub mod auth;
/// Retrieval-augmented chat orchestration and streaming.
pub mod chat;
/// Environment-driven configuration management.
pub mod config;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// PDF ingestion pipeline: loading, chunking, indexing, insights.
pub mod ingest;
/// Language-model client: buffered, streaming, and transcription calls.
pub mod llm;
/// Structured logging and tracing setup.
pub mod logging;
/// Prompt templates and persona handling.
pub mod prompts;
/// In-memory session and ingestion-task registries.
pub mod registry;
/// Object-storage upload adapter.
pub mod storage;
/// Vector store integration.
pub mod vector;
