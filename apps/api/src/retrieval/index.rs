//! Flat exact vector index over one document's chunk embeddings.
//!
//! Per-document chunk counts are small, so search is a brute-force scan
//! using squared Euclidean distance. The index is built once, persisted as
//! two co-located artifacts (binary vectors + JSON chunk list) and reloaded
//! read-only for queries.

use std::cmp::Ordering;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::info;

use crate::errors::AppError;
use crate::retrieval::embedder::Embeddings;
use crate::storage::{self, ArtifactStore};

const INDEX_MAGIC: &[u8; 4] = b"RMVX";
const INDEX_FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 16;

/// Vectors plus the chunks they were derived from; `vectors[i]` embeds `chunks[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
    chunks: Vec<String>,
}

impl VectorIndex {
    /// Builds an index. Fails when counts differ or any vector has the wrong width.
    pub fn build(chunks: Vec<String>, embeddings: Embeddings) -> Result<Self, AppError> {
        let Embeddings { dimension, vectors } = embeddings;

        if chunks.len() != vectors.len() {
            return Err(AppError::Validation(format!(
                "Cannot build index: {} chunks but {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        if let Some(pos) = vectors.iter().position(|v| v.len() != dimension) {
            return Err(AppError::Validation(format!(
                "Cannot build index: vector {pos} has dimension {} (expected {dimension})",
                vectors[pos].len()
            )));
        }

        Ok(Self {
            dimension,
            vectors,
            chunks,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    #[cfg(test)]
    pub fn chunks(&self) -> &[String] {
        &self.chunks
    }

    /// Returns up to `k` chunks, nearest first. `k` is clamped to the chunk count.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<String>, AppError> {
        let k = k.min(self.chunks.len());
        if k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dimension {
            return Err(AppError::Validation(format!(
                "Query dimension {} does not match index dimension {}",
                query.len(),
                self.dimension
            )));
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, squared_l2(query, v)))
            .collect();

        // Stable sort keeps chunk order among equal distances; NaN sinks to the end.
        scored.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Greater));

        Ok(scored
            .into_iter()
            .take(k)
            .filter_map(|(i, _)| self.chunks.get(i).cloned())
            .collect())
    }

    /// Encodes the vector structure (not the chunk text) into the binary artifact format.
    pub fn encode_vectors(&self) -> Result<Bytes, AppError> {
        let dimension = header_u32(self.dimension, "dimension")?;
        let count = header_u32(self.vectors.len(), "vector count")?;
        let mut buf =
            BytesMut::with_capacity(HEADER_LEN + self.vectors.len() * self.dimension * 4);
        buf.put_slice(INDEX_MAGIC);
        buf.put_u32_le(INDEX_FORMAT_VERSION);
        buf.put_u32_le(dimension);
        buf.put_u32_le(count);
        for vector in &self.vectors {
            for value in vector {
                buf.put_f32_le(*value);
            }
        }
        Ok(buf.freeze())
    }

    /// Decodes the binary vector artifact into an `Embeddings` matrix.
    pub fn decode_vectors(mut raw: Bytes) -> Result<Embeddings, AppError> {
        if raw.len() < HEADER_LEN || &raw[..4] != INDEX_MAGIC {
            return Err(AppError::Storage("Index artifact has no valid header".to_string()));
        }
        raw.advance(4);

        let version = raw.get_u32_le();
        if version != INDEX_FORMAT_VERSION {
            return Err(AppError::Storage(format!(
                "Unsupported index format version {version}"
            )));
        }
        let dimension = raw.get_u32_le() as usize;
        let count = raw.get_u32_le() as usize;

        let expected = count
            .checked_mul(dimension)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| AppError::Storage("Index artifact header overflows".to_string()))?;
        if raw.remaining() != expected {
            return Err(AppError::Storage(format!(
                "Index artifact body is {} bytes, header promises {expected}",
                raw.remaining()
            )));
        }

        let vectors = (0..count)
            .map(|_| (0..dimension).map(|_| raw.get_f32_le()).collect())
            .collect();

        Ok(Embeddings { dimension, vectors })
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Writes the index and its chunk list under `document_id`.
///
/// The chunk list is written first and the vector artifact last, so a reader
/// that finds the vector artifact always finds the chunk list too.
/// Header fields are u32; larger values cannot be represented.
fn header_u32(value: usize, what: &str) -> Result<u32, AppError> {
    u32::try_from(value)
        .map_err(|_| AppError::Storage(format!("Index {what} {value} exceeds the u32 header field")))
}

pub async fn persist(
    store: &dyn ArtifactStore,
    index: &VectorIndex,
    document_id: &str,
) -> Result<(), AppError> {
    let chunks_json = serde_json::to_vec_pretty(&index.chunks)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to serialize chunks: {e}")))?;

    store
        .put(&storage::chunks_key(document_id), Bytes::from(chunks_json))
        .await?;
    store
        .put(&storage::index_key(document_id), index.encode_vectors()?)
        .await?;

    info!(
        "Persisted index for document {document_id}: {} chunks, dimension {}",
        index.len(),
        index.dimension
    );
    Ok(())
}

/// Loads the index for `document_id`. NotFound when either artifact is missing;
/// never returns a partially-loaded index.
pub async fn load(store: &dyn ArtifactStore, document_id: &str) -> Result<VectorIndex, AppError> {
    let not_found = || AppError::NotFound(format!("Vector index for document {document_id} not found"));

    let raw_index = store
        .get(&storage::index_key(document_id))
        .await?
        .ok_or_else(not_found)?;
    let raw_chunks = store
        .get(&storage::chunks_key(document_id))
        .await?
        .ok_or_else(not_found)?;

    let embeddings = VectorIndex::decode_vectors(raw_index)?;
    let chunks: Vec<String> = serde_json::from_slice(&raw_chunks)
        .map_err(|e| AppError::Storage(format!("Chunk metadata is not a JSON string array: {e}")))?;

    // Count mismatch here means the two artifacts disagree.
    VectorIndex::build(chunks, embeddings).map_err(|e| AppError::Storage(e.to_string()))
}
