//! Document upload and ingestion task handlers.

use axum::Json;
use axum::extract::{Multipart, Path, State};
use serde_json::{Value, json};
use std::path::Path as FsPath;
use uuid::Uuid;

use crate::api::{ApiError, AppState};
use crate::auth::AuthUser;
use crate::ingest::IngestJob;
use crate::registry::TaskSnapshot;

/// `POST /api/v1/fileProcessing/createVectorStore` — submit PDFs for
/// background ingestion.
///
/// Validation (missing project name, non-PDF files, empty upload) fails the
/// request up front; everything after submission is reported through the
/// task registry.
pub async fn create_vector_store(
    State(state): State<AppState>,
    _user: AuthUser,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut project_name: Option<String> = None;
    let mut is_subsequent = false;
    let mut files: Vec<(String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::BadRequest(format!("Malformed multipart body: {err}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "project_name" => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
                project_name = Some(value.trim().to_string());
            }
            "description" => {
                // accepted for compatibility, not stored
                let _ = field.text().await;
            }
            "is_subsequent" => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
                is_subsequent = value.trim().eq_ignore_ascii_case("true");
            }
            _ => {
                let Some(filename) = field.file_name().map(str::to_string) else {
                    continue;
                };
                let filename = FsPath::new(&filename)
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or("upload.pdf")
                    .to_string();
                if !filename.to_lowercase().ends_with(".pdf") {
                    return Err(ApiError::BadRequest(format!(
                        "Only PDF uploads are accepted, got '{filename}'"
                    )));
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|err| ApiError::BadRequest(err.to_string()))?;
                files.push((filename, bytes.to_vec()));
            }
        }
    }

    let project_name = project_name
        .filter(|name| !name.is_empty())
        .ok_or_else(|| ApiError::BadRequest("project_name is required".into()))?;
    if files.is_empty() {
        return Err(ApiError::BadRequest(
            "At least one PDF file must be uploaded".into(),
        ));
    }

    let collection = collection_name_for(&project_name);
    let work_dir = std::env::temp_dir().join(format!("studyrag-upload-{}", Uuid::new_v4()));
    tokio::fs::create_dir_all(&work_dir)
        .await
        .map_err(|err| ApiError::Internal(format!("Failed to stage upload: {err}")))?;
    for (filename, bytes) in &files {
        tokio::fs::write(work_dir.join(filename), bytes)
            .await
            .map_err(|err| ApiError::Internal(format!("Failed to stage upload: {err}")))?;
    }

    let task_id = state.tasks.start("Queued for processing");
    tracing::info!(
        task_id = %task_id,
        collection = %collection,
        files = files.len(),
        is_subsequent,
        "Accepted ingestion job"
    );

    let job = IngestJob {
        task_id: task_id.clone(),
        collection: collection.clone(),
        project_name,
        work_dir,
    };
    let ingestor = state.ingestor.clone();
    tokio::spawn(async move { ingestor.run(job).await });

    Ok(Json(json!({
        "task_id": task_id,
        "status": "pending",
        "collection": collection,
    })))
}

/// `GET /api/v1/fileProcessing/taskStatus/:task_id` — poll a background job.
pub async fn task_status(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(task_id): Path<String>,
) -> Result<Json<TaskSnapshot>, ApiError> {
    state
        .tasks
        .poll(&task_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Task '{task_id}' not found")))
}

/// Derive a collection name from a user-supplied project name.
fn collection_name_for(project_name: &str) -> String {
    let mut name: String = project_name
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    while name.contains("--") {
        name = name.replace("--", "-");
    }
    name.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::collection_name_for;

    #[test]
    fn collection_names_are_normalized() {
        assert_eq!(collection_name_for("Physics Grade 7"), "physics-grade-7");
        assert_eq!(collection_name_for("  Chemie!! 2024  "), "chemie-2024");
        assert_eq!(collection_name_for("abc"), "abc");
    }
}
