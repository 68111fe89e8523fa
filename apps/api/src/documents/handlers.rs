use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::documents::ingest::{ingest_document, IngestLimits};
use crate::errors::AppError;
use crate::models::document::UploadResponse;
use crate::state::AppState;

const FILE_FIELD: &str = "file";

/// POST /api/v1/resumes
/// Multipart upload; the document is in the `file` field.
pub async fn handle_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>), AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Malformed multipart body: {e}")))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Failed to read upload: {e}")))?;
        info!("Received upload {filename} ({} bytes)", data.len());

        let limits = IngestLimits {
            chunking: state.config.chunking,
            max_upload_bytes: state.config.max_upload_bytes,
        };
        let response = ingest_document(
            state.artifacts.as_ref(),
            state.embedder.as_ref(),
            &limits,
            &filename,
            data,
        )
        .await?;
        return Ok((StatusCode::CREATED, Json(response)));
    }

    Err(AppError::Validation(format!(
        "Multipart field '{FILE_FIELD}' is required"
    )))
}
