use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::retrieval::chunker::{ChunkConfig, DEFAULT_CHUNK_OVERLAP, DEFAULT_MAX_CHARS};
use crate::retrieval::embedder::DEFAULT_LOCAL_MODEL;

const DEFAULT_RETRIEVAL_TOP_K: usize = 5;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// S3 / MinIO settings. Present only when `S3_BUCKET` is set.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

/// OpenAI-compatible embeddings endpoint. Absent means the local hashing embedder.
#[derive(Debug, Clone)]
pub struct EmbeddingApiConfig {
    pub base_url: String,
    pub api_key: Option<String>,
}

/// Application configuration loaded from environment variables.
/// Only the optional backends have required companions; everything else has a default.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub data_dir: PathBuf,
    pub s3: Option<S3Config>,
    pub database_url: Option<String>,
    pub embedding_api: Option<EmbeddingApiConfig>,
    pub embedding_model: String,
    pub embedding_dimension: Option<usize>,
    pub anthropic_api_key: Option<String>,
    pub chunking: ChunkConfig,
    pub retrieval_top_k: usize,
    pub max_upload_bytes: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let s3 = match optional_env("S3_BUCKET") {
            Some(bucket) => Some(S3Config {
                bucket,
                endpoint: require_env("S3_ENDPOINT")?,
                access_key_id: require_env("AWS_ACCESS_KEY_ID")?,
                secret_access_key: require_env("AWS_SECRET_ACCESS_KEY")?,
            }),
            None => None,
        };

        let embedding_api = optional_env("EMBEDDING_API_URL").map(|base_url| EmbeddingApiConfig {
            base_url,
            api_key: optional_env("EMBEDDING_API_KEY"),
        });

        let embedding_dimension = match optional_env("EMBEDDING_DIMENSION") {
            Some(raw) => Some(
                raw.parse::<usize>()
                    .context("EMBEDDING_DIMENSION must be a positive integer")?,
            ),
            None => None,
        };

        let chunking = ChunkConfig::new(
            parse_env("CHUNK_MAX_CHARS", DEFAULT_MAX_CHARS)?,
            parse_env("CHUNK_OVERLAP", DEFAULT_CHUNK_OVERLAP)?,
        )
        .context("Invalid chunking configuration")?;

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            data_dir: optional_env("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data")),
            s3,
            database_url: optional_env("DATABASE_URL"),
            embedding_api,
            embedding_model: optional_env("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_LOCAL_MODEL.to_string()),
            embedding_dimension,
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            chunking,
            retrieval_top_k: require_positive(
                "RETRIEVAL_TOP_K",
                parse_env("RETRIEVAL_TOP_K", DEFAULT_RETRIEVAL_TOP_K)?,
            )?,
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
        })
    }

    /// Local-only configuration rooted at `data_dir`, with every optional backend off.
    #[cfg(test)]
    pub fn local(data_dir: impl Into<PathBuf>) -> Self {
        Config {
            port: 8080,
            rust_log: "info".to_string(),
            data_dir: data_dir.into(),
            s3: None,
            database_url: None,
            embedding_api: None,
            embedding_model: DEFAULT_LOCAL_MODEL.to_string(),
            embedding_dimension: None,
            anthropic_api_key: None,
            chunking: ChunkConfig::default(),
            retrieval_top_k: DEFAULT_RETRIEVAL_TOP_K,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

/// Returns the variable's value, treating unset and blank the same.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn require_positive(key: &str, value: usize) -> Result<usize> {
    anyhow::ensure!(value > 0, "{key} must be at least 1");
    Ok(value)
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .ok()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_retrieval_top_k_is_rejected() {
        assert!(require_positive("RETRIEVAL_TOP_K", 0).is_err());
        assert_eq!(require_positive("RETRIEVAL_TOP_K", 5).unwrap(), 5);
    }

    #[test]
    fn test_local_config_defaults() {
        let config = Config::local("/tmp/matcher");
        assert_eq!(config.retrieval_top_k, 5);
        assert_eq!(config.embedding_model, DEFAULT_LOCAL_MODEL);
        assert!(config.s3.is_none() && config.embedding_api.is_none());
    }
}
