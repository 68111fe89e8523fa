//! ATS scoring. Blends lexical keyword overlap, whole-document semantic
//! similarity and section presence into one bounded score.
//!
//! score = 0.4 × keyword_match + 0.4 × (semantic_similarity × 100) + 0.2 × section_completeness
//!
//! Semantic similarity is best-effort: an embedding failure scores 0.0 and
//! the cause is kept in `diagnostic` instead of failing the request.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::AppError;
use crate::retrieval::embedder::{cosine_similarity, Embedder};

pub const KEYWORD_WEIGHT: f64 = 0.4;
pub const SEMANTIC_WEIGHT: f64 = 0.4;
pub const SECTION_WEIGHT: f64 = 0.2;

pub const ATS_EXPLANATION: &str = "ATS score is a weighted blend of keyword overlap, semantic \
    similarity, and presence of common resume sections.";

/// Each entry is one section; any of its signals marks it present.
const SECTION_SIGNALS: &[&[&str]] = &[
    &["experience", "work history"],
    &["education"],
    &["skills"],
    &["projects", "project"],
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtsResult {
    /// 0 – 100
    pub score: f64,
    /// 0 – 100
    pub keyword_match_score: f64,
    /// 0 – 1
    pub semantic_similarity_score: f64,
    /// 0 – 100
    pub section_completeness_score: f64,
    pub explanation: String,
    pub matched_keywords: Vec<String>,
    pub missing_keywords: Vec<String>,
    /// Why semantic similarity fell back to 0.0, when it did.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

/// Keyword overlap between whitespace-split résumé tokens and the job keywords.
/// Returns (score, matched, missing); score is 0 when there are no keywords.
pub fn keyword_overlap(resume_text: &str, job_keywords: &[String]) -> (f64, Vec<String>, Vec<String>) {
    let resume_set: BTreeSet<String> = resume_text
        .to_lowercase()
        .split_whitespace()
        .map(String::from)
        .collect();
    let keyword_set: BTreeSet<String> = job_keywords.iter().map(|k| k.to_lowercase()).collect();

    let matched: Vec<String> = keyword_set.intersection(&resume_set).cloned().collect();
    let missing: Vec<String> = keyword_set.difference(&resume_set).cloned().collect();

    let score = if keyword_set.is_empty() {
        0.0
    } else {
        100.0 * matched.len() as f64 / keyword_set.len() as f64
    };

    (score, matched, missing)
}

/// Share of the four standard sections mentioned anywhere in the résumé, 0 – 100.
pub fn section_completeness(resume_text: &str) -> f64 {
    let lowered = resume_text.to_lowercase();
    let present = SECTION_SIGNALS
        .iter()
        .filter(|signals| signals.iter().any(|s| lowered.contains(s)))
        .count();
    100.0 * present as f64 / SECTION_SIGNALS.len() as f64
}

/// Clamps a raw cosine into [0, 1]; non-finite values become 0.
fn clamp_similarity(raw: f64) -> f64 {
    if raw.is_finite() {
        raw.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

pub fn composite_score(keyword_match: f64, semantic_similarity: f64, section_completeness: f64) -> f64 {
    (KEYWORD_WEIGHT * keyword_match
        + SEMANTIC_WEIGHT * (semantic_similarity * 100.0)
        + SECTION_WEIGHT * section_completeness)
        .clamp(0.0, 100.0)
}

/// Scores a résumé against a job description. Holds the shared embedder.
#[derive(Clone)]
pub struct AtsScorer {
    embedder: Arc<dyn Embedder>,
}

impl AtsScorer {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    async fn semantic_similarity(&self, resume_text: &str, job_text: &str) -> Result<f64, AppError> {
        let embeddings = self
            .embedder
            .embed(&[resume_text.to_string(), job_text.to_string()])
            .await?;

        match embeddings.vectors.as_slice() {
            [resume, job] => Ok(clamp_similarity(f64::from(cosine_similarity(resume, job)))),
            other => Err(AppError::Embedding(format!(
                "Expected 2 document embeddings, got {}",
                other.len()
            ))),
        }
    }

    pub async fn compute_score(
        &self,
        resume_text: &str,
        job_text: &str,
        job_keywords: &[String],
    ) -> AtsResult {
        let (keyword_match_score, matched_keywords, missing_keywords) =
            keyword_overlap(resume_text, job_keywords);

        let (semantic_similarity_score, diagnostic) =
            match self.semantic_similarity(resume_text, job_text).await {
                Ok(sim) => (sim, None),
                Err(e) => {
                    warn!(
                        "Semantic similarity unavailable ({}), scoring 0.0: {e}",
                        self.embedder.model_id()
                    );
                    (0.0, Some(format!("semantic similarity unavailable: {e}")))
                }
            };

        let section_completeness_score = section_completeness(resume_text);

        AtsResult {
            score: composite_score(
                keyword_match_score,
                semantic_similarity_score,
                section_completeness_score,
            ),
            keyword_match_score,
            semantic_similarity_score,
            section_completeness_score,
            explanation: ATS_EXPLANATION.to_string(),
            matched_keywords,
            missing_keywords,
            diagnostic,
        }
    }
}
