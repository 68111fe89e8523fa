use std::sync::Arc;

use crate::analysis::pipeline::AnalysisPipeline;
use crate::config::Config;
use crate::retrieval::embedder::Embedder;
use crate::storage::ArtifactStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Local filesystem or S3, chosen at startup.
    pub artifacts: Arc<dyn ArtifactStore>,
    /// Process-wide embedder, shared by ingestion and the pipeline.
    pub embedder: Arc<dyn Embedder>,
    pub pipeline: AnalysisPipeline,
}
