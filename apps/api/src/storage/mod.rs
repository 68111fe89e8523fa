//! Per-document artifact storage.
//!
//! Every artifact lives under a key derived from the document identifier, so
//! analyses of different documents never share mutable state. Backends:
//! local filesystem (default) and S3 / MinIO.

pub mod local;
pub mod s3;

use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::AppError;

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Writes `data` under `key`, replacing any previous value.
    async fn put(&self, key: &str, data: Bytes) -> Result<(), AppError>;

    /// Reads `key`. `Ok(None)` when nothing is stored there.
    async fn get(&self, key: &str) -> Result<Option<Bytes>, AppError>;

    /// Backend name, for logs.
    fn backend(&self) -> &'static str;
}

/// Extracted plain text of an uploaded document.
pub fn text_key(document_id: &str) -> String {
    format!("documents/{document_id}.txt")
}

/// Raw upload as received.
pub fn upload_key(document_id: &str, filename: &str) -> String {
    format!("documents/{document_id}_{filename}")
}

/// Binary flat vector structure.
pub fn index_key(document_id: &str) -> String {
    format!("index/{document_id}.index")
}

/// Ordered JSON array of chunk strings, aligned with the index vectors.
pub fn chunks_key(document_id: &str) -> String {
    format!("index/{document_id}_chunks.json")
}

/// Loads a document's extracted text. NotFound when it was never uploaded.
pub async fn load_text(store: &dyn ArtifactStore, document_id: &str) -> Result<String, AppError> {
    let raw = store
        .get(&text_key(document_id))
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Resume {document_id} not found")))?;

    String::from_utf8(raw.to_vec())
        .map_err(|e| AppError::Storage(format!("Extracted text for {document_id} is not UTF-8: {e}")))
}

pub async fn save_text(
    store: &dyn ArtifactStore,
    document_id: &str,
    text: &str,
) -> Result<(), AppError> {
    store
        .put(&text_key(document_id), Bytes::copy_from_slice(text.as_bytes()))
        .await
}
