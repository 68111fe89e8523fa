use serde::{Deserialize, Serialize};

/// Returned by the upload endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub id: String,
    pub filename: String,
    pub text_preview: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    pub resume_id: String,
    pub job_description: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobSkillsRequest {
    pub job_description: String,
}
