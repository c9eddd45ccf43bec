//! Upload HTTP handlers.

use axum::extract::{Multipart, State};
use axum::Json;
use tracing::info;

use thinkbank_jobs::{UploadFile, UploadedAsset};

use crate::{ApiError, AppState};

/// Accept one or more files and start them through the ingestion pipeline.
///
/// # Multipart Fields
/// - `files` (or `file`): file parts, repeated for batch uploads
///
/// # Returns
/// - 200 OK with the created assets, in upload order
/// - 400 Bad Request if no file part is present
/// - 500 if recording or storing a file fails (earlier files stay uploaded)
pub async fn upload_files(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Vec<UploadedAsset>>, ApiError> {
    let mut files = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if !matches!(field.name(), Some("files") | Some("file")) {
            continue;
        }
        let file_name = field
            .file_name()
            .map(|n| n.to_string())
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ApiError::BadRequest("File part is missing a filename".into()))?;
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("Read error: {}", e)))?;
        files.push(UploadFile::new(file_name, bytes.to_vec()));
    }

    if files.is_empty() {
        return Err(ApiError::BadRequest("No files in multipart form".into()));
    }

    let uploaded = state.uploads.upload_many(&files).await?;
    info!(count = uploaded.len(), "Upload request completed");
    Ok(Json(uploaded))
}
