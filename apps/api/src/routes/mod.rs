pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::analysis::handlers as analysis;
use crate::documents::handlers as documents;
use crate::state::AppState;

/// Room for multipart framing on top of the file itself.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state
        .config
        .max_upload_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/resumes", post(documents::handle_upload))
        .route("/api/v1/analyze", post(analysis::handle_analyze))
        .route("/api/v1/results/:id", get(analysis::handle_get_result))
        .route("/api/v1/job/skills", post(analysis::handle_job_skills))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}
