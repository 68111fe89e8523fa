//! Embedding backends behind a single async trait.
//!
//! `AppState` holds an `Arc<dyn Embedder>` built once at startup and shared by
//! ingestion, retrieval and the ATS scorer. Swapping backends never touches callers.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::errors::AppError;

/// Output width of all-MiniLM-L6-v2.
pub const MINILM_DIMENSION: usize = 384;
pub const DEFAULT_LOCAL_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";

const EMBEDDING_TIMEOUT_SECS: u64 = 60;
const DIMENSION_SAMPLE_TEXT: &str = "dimension sample";

/// A `[rows, dimension]` matrix. The width is kept even when there are no rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Embeddings {
    pub dimension: usize,
    pub vectors: Vec<Vec<f32>>,
}

impl Embeddings {
    pub fn empty(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
        }
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Model identifier, for logs.
    fn model_id(&self) -> &str;

    /// Vector width. Fixed for the process lifetime once known.
    async fn dimension(&self) -> Result<usize, AppError>;

    /// Embeds `texts` in order. Empty input yields a zero-row matrix of the right width.
    async fn embed(&self, texts: &[String]) -> Result<Embeddings, AppError>;

    /// Embeds a single text.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>, AppError> {
        let mut result = self.embed(&[text.to_string()]).await?;
        result
            .vectors
            .pop()
            .ok_or_else(|| AppError::Embedding("No embedding returned".to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HttpEmbedder: OpenAI-compatible /embeddings endpoint
// ────────────────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedder backed by a remote embeddings API. Single attempt per call.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dimension: OnceCell<usize>,
}

impl HttpEmbedder {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: String,
        dimension: Option<usize>,
    ) -> anyhow::Result<Self> {
        anyhow::ensure!(!model.trim().is_empty(), "missing embedding model name");
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(EMBEDDING_TIMEOUT_SECS))
            .build()
            .context("failed to build embeddings HTTP client")?;
        let endpoint = format!("{}/embeddings", base_url.trim_end_matches('/'));

        Ok(Self {
            client,
            endpoint,
            api_key,
            model,
            dimension: match dimension {
                Some(d) => OnceCell::from(d),
                None => OnceCell::new(),
            },
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AppError> {
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::Embedding(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Embedding(format!("API error ({status}): {body}")));
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AppError::Embedding(format!("Parse error: {e}")))?;

        if parsed.data.len() != texts.len() {
            return Err(AppError::Embedding(format!(
                "API returned {} embeddings for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }

        parsed.data.sort_by_key(|entry| entry.index);
        Ok(parsed.data.into_iter().map(|entry| entry.embedding).collect())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn dimension(&self) -> Result<usize, AppError> {
        self.dimension
            .get_or_try_init(|| async {
                let sample = self.request(&[DIMENSION_SAMPLE_TEXT.to_string()]).await?;
                let width = sample.first().map(Vec::len).unwrap_or_default();
                info!("Embedding model {} reports dimension {width}", self.model);
                Ok::<usize, AppError>(width)
            })
            .await
            .copied()
    }

    async fn embed(&self, texts: &[String]) -> Result<Embeddings, AppError> {
        if texts.is_empty() {
            return Ok(Embeddings::empty(self.dimension().await?));
        }

        let vectors = self.request(texts).await?;
        let width = vectors.first().map(Vec::len).unwrap_or_default();
        let expected = *self.dimension.get_or_init(|| async { width }).await;

        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(AppError::Embedding(format!(
                "Embedding width {} does not match model dimension {expected}",
                bad.len()
            )));
        }

        debug!("Embedded {} texts with {}", texts.len(), self.model);
        Ok(Embeddings {
            dimension: expected,
            vectors,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// FastEmbedder: in-process sentence-transformers model
// ────────────────────────────────────────────────────────────────────────────

/// Accepted spellings of the local model name.
const MINILM_NAMES: &[&str] = &[
    "minilm",
    "all-minilm-l6-v2",
    "sentence-transformers/all-minilm-l6-v2",
];

/// Maps a configured model name onto a model fastembed can run locally.
pub fn local_model(name: &str) -> anyhow::Result<EmbeddingModel> {
    let lowered = name.trim().to_lowercase();
    if MINILM_NAMES.contains(&lowered.as_str()) {
        Ok(EmbeddingModel::AllMiniLML6V2)
    } else {
        anyhow::bail!(
            "Unsupported local embedding model '{name}'. Supported: {DEFAULT_LOCAL_MODEL}, \
             or set EMBEDDING_API_URL to use a remote model"
        )
    }
}

type ModelLoader<M> = Arc<dyn Fn() -> anyhow::Result<M> + Send + Sync>;

/// A blocking model built at most once, on first use.
///
/// Loading runs on the blocking pool. Concurrent first callers wait on the
/// same load; a failed load is retried by the next caller.
struct LazyModel<M> {
    cell: OnceCell<Arc<Mutex<M>>>,
    load: ModelLoader<M>,
}

impl<M: Send + 'static> LazyModel<M> {
    fn new(load: impl Fn() -> anyhow::Result<M> + Send + Sync + 'static) -> Self {
        Self {
            cell: OnceCell::new(),
            load: Arc::new(load),
        }
    }

    async fn get(&self) -> Result<Arc<Mutex<M>>, AppError> {
        self.cell
            .get_or_try_init(|| async {
                let load = Arc::clone(&self.load);
                let model = tokio::task::spawn_blocking(move || load())
                    .await
                    .map_err(|e| {
                        AppError::Internal(anyhow::anyhow!(
                            "spawn_blocking failed loading embedding model: {e}"
                        ))
                    })?
                    .map_err(|e| AppError::Embedding(format!("Failed to load embedding model: {e:#}")))?;
                Ok::<_, AppError>(Arc::new(Mutex::new(model)))
            })
            .await
            .cloned()
    }
}

/// Local embedder running all-MiniLM-L6-v2 through fastembed (ONNX runtime).
///
/// Construction is cheap; the model files are fetched into `cache_dir` and
/// loaded on the first `embed` call.
pub struct FastEmbedder {
    model_id: String,
    engine: LazyModel<TextEmbedding>,
}

impl FastEmbedder {
    pub fn new(model_name: &str, cache_dir: PathBuf) -> anyhow::Result<Self> {
        let model = local_model(model_name)?;
        let model_id = model.to_string();
        let engine = LazyModel::new(move || {
            info!("Loading local embedding model {model} into {}", cache_dir.display());
            let options = InitOptions::new(model.clone())
                .with_cache_dir(cache_dir.clone())
                .with_show_download_progress(false);
            TextEmbedding::try_new(options).context("Failed to initialize fastembed model")
        });
        Ok(Self { model_id, engine })
    }
}

#[async_trait]
impl Embedder for FastEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn dimension(&self) -> Result<usize, AppError> {
        Ok(MINILM_DIMENSION)
    }

    async fn embed(&self, texts: &[String]) -> Result<Embeddings, AppError> {
        if texts.is_empty() {
            return Ok(Embeddings::empty(MINILM_DIMENSION));
        }

        let engine = self.engine.get().await?;
        let batch = texts.to_vec();
        let mut vectors = tokio::task::spawn_blocking(move || {
            let mut engine = engine
                .lock()
                .map_err(|_| "embedding model lock poisoned".to_string())?;
            engine.embed(batch, None).map_err(|e| e.to_string())
        })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("spawn_blocking failed in embedding: {e}")))?
        .map_err(|e| AppError::Embedding(format!("Local embedding failed: {e}")))?;

        if vectors.len() != texts.len() {
            return Err(AppError::Embedding(format!(
                "Model returned {} embeddings for {} inputs",
                vectors.len(),
                texts.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != MINILM_DIMENSION) {
            return Err(AppError::Embedding(format!(
                "Embedding width {} does not match model dimension {MINILM_DIMENSION}",
                bad.len()
            )));
        }
        for vector in vectors.iter_mut() {
            l2_normalize(vector);
        }

        debug!("Embedded {} texts with {}", texts.len(), self.model_id);
        Ok(Embeddings {
            dimension: MINILM_DIMENSION,
            vectors,
        })
    }
}

// ────────────────────────────────────────────────────────────────────────────
// HashingEmbedder: deterministic test double
// ────────────────────────────────────────────────────────────────────────────

/// Signed feature-hashing bag-of-words embedder. No model, no network:
/// texts sharing vocabulary land close together, identical texts embed identically.
#[cfg(test)]
pub struct HashingEmbedder {
    dimension: usize,
    model_id: String,
}

#[cfg(test)]
impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        let dimension = dimension.max(1);
        Self {
            dimension,
            model_id: format!("hashing-{dimension}"),
        }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0_f32; self.dimension];
        let lowered = text.to_lowercase();
        let tokens = lowered
            .split(|c: char| !(c.is_alphanumeric() || matches!(c, '+' | '#' | '.' | '-')))
            .map(|t| t.trim_matches('.'))
            .filter(|t| !t.is_empty());

        for token in tokens {
            let hash = fnv1a(token.as_bytes());
            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if (hash >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        l2_normalize(&mut vector);
        vector
    }
}

#[cfg(test)]
impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(MINILM_DIMENSION)
    }
}

#[cfg(test)]
#[async_trait]
impl Embedder for HashingEmbedder {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn dimension(&self) -> Result<usize, AppError> {
        Ok(self.dimension)
    }

    async fn embed(&self, texts: &[String]) -> Result<Embeddings, AppError> {
        Ok(Embeddings {
            dimension: self.dimension,
            vectors: texts.iter().map(|t| self.embed_text(t)).collect(),
        })
    }
}

#[cfg(test)]
fn fnv1a(bytes: &[u8]) -> u64 {
    const OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0100_0000_01b3;
    bytes
        .iter()
        .fold(OFFSET, |hash, b| (hash ^ u64::from(*b)).wrapping_mul(PRIME))
}

fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity. Zero-magnitude or mismatched vectors score 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let magnitude_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let magnitude_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return 0.0;
    }

    dot / (magnitude_a * magnitude_b)
}
