//! Session utility handlers.

use axum::Json;
use axum::extract::{Path, State};
use serde_json::{Value, json};

use crate::api::{ApiError, AppState};
use crate::auth::AuthUser;
use crate::llm::ChatTurn;
use crate::prompts::session_name_prompt;
use crate::registry::SessionStats;

/// Fallback session name when history is empty or generation fails.
const DEFAULT_SESSION_NAME: &str = "New Chat Session";
/// Maximum characters of a generated session name.
const SESSION_NAME_MAX_CHARS: usize = 50;

/// `GET /api/v1/generalUtility/:collection/createNewSession`.
pub async fn create_new_session(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(collection): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if collection.trim().is_empty() {
        return Err(ApiError::BadRequest("Collection name must not be empty".into()));
    }
    let session_id = state.sessions.create(&collection);
    let session = state
        .sessions
        .get(&session_id)
        .ok_or_else(|| ApiError::Internal("Session vanished after creation".into()))?;

    Ok(Json(json!({
        "session_id": session.id,
        "collection_name": session.collection_name,
        "created_at": session.created_at,
        "message_count": session.message_count,
    })))
}

/// `GET /api/v1/generalUtility/:collection/createSessionName/:session_id`.
///
/// Never surfaces an error to the caller: any failure falls back to the
/// default name.
pub async fn create_session_name(
    State(state): State<AppState>,
    _user: AuthUser,
    Path((_collection, session_id)): Path<(String, String)>,
) -> Json<Value> {
    let name = generate_name(&state, &session_id).await;
    Json(json!({
        "session_id": session_id,
        "name": name,
    }))
}

async fn generate_name(state: &AppState, session_id: &str) -> String {
    let Some(session) = state.sessions.get(session_id) else {
        return DEFAULT_SESSION_NAME.to_string();
    };
    if session.chat_history.is_empty() {
        return DEFAULT_SESSION_NAME.to_string();
    }

    let excerpt: String = session
        .chat_history
        .iter()
        .rev()
        .take(4)
        .rev()
        .map(|message| {
            let content: String = message.content.chars().take(200).collect();
            format!("{}: {content}", message.role.as_str())
        })
        .collect::<Vec<_>>()
        .join("\n");

    match state
        .generator
        .complete(vec![ChatTurn::user(session_name_prompt(&excerpt))])
        .await
    {
        Ok(raw) => clean_session_name(&raw),
        Err(err) => {
            tracing::warn!(session_id, error = %err, "Session name generation failed");
            DEFAULT_SESSION_NAME.to_string()
        }
    }
}

/// `GET /api/v1/generalUtility/sessionStats`.
pub async fn session_stats(State(state): State<AppState>, _user: AuthUser) -> Json<SessionStats> {
    Json(state.sessions.stats())
}

fn clean_session_name(raw: &str) -> String {
    let name = raw
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .trim_matches(['"', '\''])
        .trim();
    if name.is_empty() {
        return DEFAULT_SESSION_NAME.to_string();
    }
    name.chars().take(SESSION_NAME_MAX_CHARS).collect()
}
