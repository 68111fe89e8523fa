mod analysis;
mod config;
mod db;
mod documents;
mod errors;
mod llm_client;
mod models;
mod retrieval;
mod routes;
mod state;
mod storage;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::analysis::narrative::{LlmNarrator, NarrativeGenerator, RuleBasedNarrator};
use crate::analysis::pipeline::AnalysisPipeline;
use crate::analysis::results::{InMemoryResultStore, PgResultStore, ResultStore};
use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::retrieval::embedder::{Embedder, FastEmbedder, HttpEmbedder, MINILM_DIMENSION};
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::local::LocalArtifactStore;
use crate::storage::s3::S3ArtifactStore;
use crate::storage::ArtifactStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing companions of optional backends)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting matcher v{}", env!("CARGO_PKG_VERSION"));

    // Artifact storage: S3 / MinIO when configured, local filesystem otherwise
    let artifacts: Arc<dyn ArtifactStore> = match &config.s3 {
        Some(s3) => Arc::new(S3ArtifactStore::from_config(s3).await),
        None => Arc::new(LocalArtifactStore::new(config.data_dir.clone())),
    };
    info!("Artifact store: {}", artifacts.backend());

    // Embedder: constructed once, shared by ingestion, retrieval and scoring
    let embedder: Arc<dyn Embedder> = match &config.embedding_api {
        Some(api) => Arc::new(HttpEmbedder::new(
            &api.base_url,
            api.api_key.clone(),
            config.embedding_model.clone(),
            config.embedding_dimension,
        )?),
        None => {
            if let Some(dimension) = config.embedding_dimension {
                anyhow::ensure!(
                    dimension == MINILM_DIMENSION,
                    "EMBEDDING_DIMENSION={dimension} does not match the local model ({MINILM_DIMENSION})"
                );
            }
            // Model files are fetched into data_dir/models on first use
            Arc::new(FastEmbedder::new(
                &config.embedding_model,
                config.data_dir.join("models"),
            )?)
        }
    };
    info!("Embedder: {}", embedder.model_id());

    // Result store: Postgres when DATABASE_URL is set
    let results: Arc<dyn ResultStore> = match &config.database_url {
        Some(url) => Arc::new(PgResultStore::new(create_pool(url).await?)),
        None => Arc::new(InMemoryResultStore::new()),
    };
    info!("Result store: {}", results.backend());

    // Narrative: LLM when an API key is present, rule-based otherwise
    let narrator: Arc<dyn NarrativeGenerator> = match &config.anthropic_api_key {
        Some(key) => {
            info!("LLM client initialized (model: {})", llm_client::MODEL);
            Arc::new(LlmNarrator(LlmClient::new(key.clone())?))
        }
        None => Arc::new(RuleBasedNarrator),
    };
    info!("Narrative generator: {}", narrator.backend());

    let pipeline = AnalysisPipeline::new(
        Arc::clone(&artifacts),
        Arc::clone(&embedder),
        narrator,
        results,
        config.retrieval_top_k,
    );

    // Build app state
    let state = AppState {
        config: config.clone(),
        artifacts,
        embedder,
        pipeline,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
