use axum::{
    extract::{Path, State},
    Json,
};

use crate::analysis::skills::{extract_job_skills, JobSkills};
use crate::errors::AppError;
use crate::models::analysis::AnalysisResult;
use crate::models::document::{AnalyzeRequest, JobSkillsRequest};
use crate::state::AppState;

/// POST /api/v1/analyze
pub async fn handle_analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalysisResult>, AppError> {
    let result = state
        .pipeline
        .analyze(&req.resume_id, &req.job_description)
        .await?;
    Ok(Json(result))
}

/// GET /api/v1/results/:id
pub async fn handle_get_result(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisResult>, AppError> {
    Ok(Json(state.pipeline.get_result(&id).await?))
}

/// POST /api/v1/job/skills
pub async fn handle_job_skills(
    Json(req): Json<JobSkillsRequest>,
) -> Result<Json<JobSkills>, AppError> {
    if req.job_description.trim().is_empty() {
        return Err(AppError::Validation(
            "Job description must not be empty".to_string(),
        ));
    }
    Ok(Json(extract_job_skills(&req.job_description)))
}
