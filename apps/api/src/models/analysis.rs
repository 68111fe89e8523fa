use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::ats::AtsResult;
use crate::analysis::narrative::Narrative;
use crate::analysis::skills::SkillAnalysis;

/// Where the narrative's résumé context came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    /// Top-k chunks from the document's vector index.
    Retrieval,
    /// Whole extracted text; retrieval was unavailable.
    FullText,
}

/// One completed analysis, stored under the document identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub id: String,
    /// 0 – 100
    pub match_percentage: f64,
    pub skill_analysis: SkillAnalysis,
    pub ats: AtsResult,
    pub narrative: Narrative,
    pub context_source: ContextSource,
    /// Causes of any degraded stage, in pipeline order.
    #[serde(default)]
    pub diagnostics: Vec<String>,
    pub created_at: DateTime<Utc>,
}
