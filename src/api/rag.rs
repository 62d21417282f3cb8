//! Retrieval-augmented chat and collection management handlers.

use axum::Json;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use std::convert::Infallible;

use crate::api::{ApiError, AppState};
use crate::auth::AuthUser;
use crate::chat::ChatRequest;
use crate::chat::types::{StreamFrame, StreamItem};
use crate::config::get_config;
use crate::llm::ChatTurn;
use crate::prompts::{SummaryLength, collection_summary_prompt};
use crate::vector::current_timestamp_rfc3339;

/// Maximum characters of scrolled chunk text fed into a collection summary.
const SUMMARY_CONTEXT_CHARS: usize = 14_000;
/// Maximum points scrolled out of a collection for summarization.
const SUMMARY_MAX_POINTS: usize = 200;

type FrameStream = Sse<futures_util::stream::BoxStream<'static, Result<Event, Infallible>>>;

async fn run_stream(
    state: AppState,
    request: ChatRequest,
    top_k: usize,
    persona_mode: bool,
) -> Result<FrameStream, ApiError> {
    let orchestrator = state.orchestrator.clone();
    let prepared = orchestrator.prepare(&request, persona_mode).await?;

    let stream = orchestrator
        .stream_frames(request, prepared, top_k)
        .map(|item| {
            let event = match item {
                StreamItem::Frame(frame) => Event::default().data(encode_frame(&frame)),
                StreamItem::Done => Event::default().data("[DONE]"),
            };
            Ok::<Event, Infallible>(event)
        })
        .boxed();

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

fn encode_frame(frame: &StreamFrame) -> String {
    serde_json::to_string(frame)
        .unwrap_or_else(|_| r#"{"type":"error","error":"frame serialization failed"}"#.to_string())
}

/// `POST /api/v1/rag/asyncStreamQuery` — primary streaming endpoint.
pub async fn async_stream_query(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<ChatRequest>,
) -> Result<FrameStream, ApiError> {
    let top_k = get_config().retrieval_top_k;
    run_stream(state, request, top_k, false).await
}

/// `POST /api/v1/rag/asyncStreamQueryV2` — compact-context variant.
pub async fn async_stream_query_v2(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<ChatRequest>,
) -> Result<FrameStream, ApiError> {
    let top_k = get_config().retrieval_top_k_compact;
    run_stream(state, request, top_k, false).await
}

/// `POST /api/v1/rag/personaStreamQuery` — persona-shaped variant.
pub async fn persona_stream_query(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<ChatRequest>,
) -> Result<FrameStream, ApiError> {
    let top_k = get_config().retrieval_top_k_compact;
    run_stream(state, request, top_k, true).await
}

#[derive(Debug, Deserialize)]
pub(crate) struct SummarizeRequest {
    collection: String,
    #[serde(default)]
    length: Option<String>,
}

/// `POST /api/v1/rag/summarizeCollection` — buffered collection summary.
pub async fn summarize_collection(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<SummarizeRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.collection.trim().is_empty() {
        return Err(ApiError::BadRequest("Collection name must not be empty".into()));
    }
    let length: SummaryLength = request
        .length
        .as_deref()
        .unwrap_or("medium")
        .parse()
        .map_err(ApiError::BadRequest)?;

    let payloads = state
        .vectors
        .scroll_payloads(&request.collection, SUMMARY_MAX_POINTS)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    let texts: Vec<&str> = payloads
        .iter()
        .filter_map(|payload| payload.get("text").and_then(|value| value.as_str()))
        .collect();
    if texts.is_empty() {
        return Err(ApiError::NotFound(format!(
            "Collection '{}' contains no documents",
            request.collection
        )));
    }

    let context: String = texts
        .join("\n\n")
        .chars()
        .take(SUMMARY_CONTEXT_CHARS)
        .collect();
    let summary = state
        .generator
        .complete(vec![ChatTurn::user(collection_summary_prompt(
            length, &context,
        ))])
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok(Json(json!({
        "collection": request.collection,
        "summary": summary.trim(),
        "document_count": texts.len(),
        "timestamp": current_timestamp_rfc3339(),
    })))
}

#[derive(Debug, Deserialize)]
pub(crate) struct DeleteCollectionRequest {
    collection: String,
    #[serde(default)]
    confirm: bool,
}

/// `DELETE /api/v1/rag/deleteCollection` — guarded collection removal.
///
/// Refusals (missing confirmation, unknown collection) report
/// `success: false` with a 200 status; only infrastructure failures error.
pub async fn delete_collection(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<DeleteCollectionRequest>,
) -> Result<Json<Value>, ApiError> {
    if request.collection.trim().is_empty() {
        return Err(ApiError::BadRequest("Collection name must not be empty".into()));
    }
    if !request.confirm {
        return Ok(Json(json!({
            "success": false,
            "message": "Deletion not confirmed. Pass confirm: true to delete the collection.",
        })));
    }

    let exists = state
        .vectors
        .collection_exists(&request.collection)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;
    if !exists {
        return Ok(Json(json!({
            "success": false,
            "message": format!("Nothing to delete: collection '{}' does not exist", request.collection),
        })));
    }

    state
        .vectors
        .delete_collection(&request.collection)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Collection '{}' deleted", request.collection),
    })))
}
