//! Media library API endpoints (authenticated)
//!
//! - POST /api/v1/admin/media - Upload one or more files (multipart, field `file`)
//! - GET /api/v1/admin/media - List stored files
//! - DELETE /api/v1/admin/media/{name}

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    response::Response,
    routing::{delete, get},
    Json, Router,
};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::{ApiResponse, MessageResponse};
use crate::services::MediaFile;

/// Result of a multipart upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub files: Vec<MediaFile>,
    /// `"<original name>: <reason>"` for each rejected file
    pub failed: Vec<String>,
}

pub fn router(max_file_size: u64) -> Router<AppState> {
    // headroom for the multipart framing around the file
    let body_limit = usize::try_from(max_file_size).unwrap_or(usize::MAX).saturating_add(64 * 1024);
    Router::new()
        .route("/", get(list_media).post(upload_media))
        .route("/{name}", delete(delete_media))
        .layer(DefaultBodyLimit::max(body_limit))
}

async fn upload_media(State(state): State<AppState>, mut multipart: Multipart) -> Result<Response, ApiError> {
    let mut files = Vec::new();
    let mut failed = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().unwrap_or("unknown").to_string();
        let content_type = field.content_type().unwrap_or("application/octet-stream").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;

        match state.media_service.store(&content_type, &data).await {
            Ok(file) => {
                tracing::info!("Uploaded {} as {}", filename, file.name);
                files.push(file);
            }
            Err(e) => failed.push(format!("{}: {}", filename, e)),
        }
    }

    if files.is_empty() {
        return Err(match failed.first() {
            Some(reason) => ApiError::validation_error(reason.clone()),
            None => ApiError::validation_error("No file provided"),
        });
    }

    Ok(ApiResponse::created(UploadResponse { files, failed }))
}

async fn list_media(State(state): State<AppState>) -> Result<Json<ApiResponse<Vec<MediaFile>>>, ApiError> {
    Ok(ApiResponse::ok(state.media_service.list().await?))
}

async fn delete_media(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.media_service.delete(&name).await?;
    Ok(MessageResponse::new("File deleted"))
}
