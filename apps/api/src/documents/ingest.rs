//! Upload ingestion: extract → chunk → store raw bytes and text → embed → index.
//!
//! Nothing is written until the upload yields indexable text, so rejected
//! uploads leave no artifacts. The document becomes analyzable once its text
//! artifact exists. The index is written last, so a failed embedding leaves a
//! document that analysis handles through the full-text fallback.

use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::documents::extract::extract_text;
use crate::errors::AppError;
use crate::models::document::UploadResponse;
use crate::retrieval::chunker::{chunk_text, normalize_whitespace, ChunkConfig};
use crate::retrieval::embedder::Embedder;
use crate::retrieval::index::{self, VectorIndex};
use crate::storage::{self, ArtifactStore};

const PREVIEW_CHARS: usize = 600;

pub struct IngestLimits {
    pub chunking: ChunkConfig,
    pub max_upload_bytes: usize,
}

/// Final path component of a client-supplied filename, trimmed.
fn sanitize_filename(raw: &str) -> Option<String> {
    let name = raw
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

fn preview(text: &str) -> String {
    text.chars()
        .take(PREVIEW_CHARS)
        .map(|c| if c == '\n' || c == '\r' { ' ' } else { c })
        .collect()
}

pub async fn ingest_document(
    artifacts: &dyn ArtifactStore,
    embedder: &dyn Embedder,
    limits: &IngestLimits,
    filename: &str,
    data: Bytes,
) -> Result<UploadResponse, AppError> {
    let filename = sanitize_filename(filename)
        .ok_or_else(|| AppError::Validation("Uploaded file has no filename".to_string()))?;
    if data.len() > limits.max_upload_bytes {
        return Err(AppError::Validation(format!(
            "Upload is {} bytes, limit is {}",
            data.len(),
            limits.max_upload_bytes
        )));
    }

    let text = extract_text(&filename, data.clone()).await?;
    if text.trim().is_empty() {
        return Err(AppError::UnprocessableEntity(format!(
            "No text could be extracted from '{filename}'"
        )));
    }

    let chunks = chunk_text(&normalize_whitespace(&text), &limits.chunking);
    if chunks.is_empty() {
        return Err(AppError::UnprocessableEntity(format!(
            "'{filename}' produced no indexable text"
        )));
    }

    let document_id = Uuid::new_v4().simple().to_string();
    artifacts
        .put(&storage::upload_key(&document_id, &filename), data)
        .await?;
    storage::save_text(artifacts, &document_id, &text).await?;

    let embeddings = embedder.embed(&chunks).await?;
    let built = VectorIndex::build(chunks, embeddings)?;
    index::persist(artifacts, &built, &document_id).await?;

    info!(
        "Ingested {filename} as {document_id}: {} chars, {} chunks, dimension {} ({})",
        text.chars().count(),
        built.len(),
        built.dimension(),
        embedder.model_id()
    );

    Ok(UploadResponse {
        id: document_id,
        filename,
        text_preview: preview(&text),
    })
}
