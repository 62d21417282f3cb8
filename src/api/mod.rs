//! HTTP routing and REST handlers.

mod files;
mod rag;
mod utility;

use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use crate::chat::{ChatError, ChatOrchestrator};
use crate::ingest::Ingestor;
use crate::llm::Generator;
use crate::registry::{SessionRegistry, TaskRegistry};
use crate::vector::VectorService;

/// Error envelope returned by every handler, mapped onto HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Request failed validation.
    #[error("{0}")]
    BadRequest(String),
    /// Missing or invalid credentials.
    #[error("{0}")]
    Unauthorized(String),
    /// Addressed resource does not exist.
    #[error("{0}")]
    NotFound(String),
    /// A collaborator or internal step failed.
    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(status = %status, detail = %self, "Request failed");
        } else {
            tracing::debug!(status = %status, detail = %self, "Request rejected");
        }
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<ChatError> for ApiError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::InvalidInput(msg) => ApiError::BadRequest(msg),
            ChatError::Audio(msg) => ApiError::BadRequest(msg),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Shared handler state: registries plus collaborator handles.
#[derive(Clone)]
pub struct AppState {
    /// Chat session registry.
    pub sessions: SessionRegistry,
    /// Ingestion task registry.
    pub tasks: TaskRegistry,
    /// The canonical chat path.
    pub orchestrator: ChatOrchestrator,
    /// Background ingestion runner.
    pub ingestor: Ingestor,
    /// Vector store client, used directly by collection management.
    pub vectors: Arc<VectorService>,
    /// Buffered generation, used by summaries and session naming.
    pub generator: Arc<dyn Generator>,
}

/// Build the application router over the shared state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route(
            "/api/v1/fileProcessing/createVectorStore",
            post(files::create_vector_store),
        )
        .route(
            "/api/v1/fileProcessing/taskStatus/:task_id",
            get(files::task_status),
        )
        .route("/api/v1/rag/asyncStreamQuery", post(rag::async_stream_query))
        .route(
            "/api/v1/rag/asyncStreamQueryV2",
            post(rag::async_stream_query_v2),
        )
        .route(
            "/api/v1/rag/personaStreamQuery",
            post(rag::persona_stream_query),
        )
        .route(
            "/api/v1/rag/summarizeCollection",
            post(rag::summarize_collection),
        )
        .route("/api/v1/rag/deleteCollection", delete(rag::delete_collection))
        .route(
            "/api/v1/generalUtility/:collection/createNewSession",
            get(utility::create_new_session),
        )
        .route(
            "/api/v1/generalUtility/:collection/createSessionName/:session_id",
            get(utility::create_session_name),
        )
        .route(
            "/api/v1/generalUtility/sessionStats",
            get(utility::session_stats),
        )
        .with_state(state)
}

/// Public liveness probe.
async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "studyrag",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
