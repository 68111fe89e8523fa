//! Analysis orchestrator.
//!
//! load text → validate job → retrieve context (or fall back to full text)
//! → skills → ATS → match % → narrative (or placeholder) → store.
//!
//! Only a missing document and blank job text fail the request. Retrieval,
//! semantic similarity and narrative failures are downgraded and recorded in
//! `diagnostics`.

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::analysis::ats::AtsScorer;
use crate::analysis::narrative::{degraded_narrative, NarrativeGenerator, NarrativeInput};
use crate::analysis::results::ResultStore;
use crate::analysis::skills::extract_profile;
use crate::errors::AppError;
use crate::models::analysis::{AnalysisResult, ContextSource};
use crate::retrieval::embedder::Embedder;
use crate::retrieval::index;
use crate::storage::{self, ArtifactStore};

const ATS_SHARE: f64 = 0.5;
const SIMILARITY_SHARE: f64 = 0.5;
const CONTEXT_SEPARATOR: &str = "\n\n";

/// Final blend. Semantic similarity counts here and again inside the ATS score.
pub fn match_percentage(ats_score: f64, semantic_similarity: f64) -> f64 {
    (ATS_SHARE * ats_score + SIMILARITY_SHARE * (semantic_similarity * 100.0)).clamp(0.0, 100.0)
}

#[derive(Clone)]
pub struct AnalysisPipeline {
    artifacts: Arc<dyn ArtifactStore>,
    embedder: Arc<dyn Embedder>,
    scorer: AtsScorer,
    narrator: Arc<dyn NarrativeGenerator>,
    results: Arc<dyn ResultStore>,
    retrieval_top_k: usize,
}

impl AnalysisPipeline {
    pub fn new(
        artifacts: Arc<dyn ArtifactStore>,
        embedder: Arc<dyn Embedder>,
        narrator: Arc<dyn NarrativeGenerator>,
        results: Arc<dyn ResultStore>,
        retrieval_top_k: usize,
    ) -> Self {
        Self {
            artifacts,
            scorer: AtsScorer::new(Arc::clone(&embedder)),
            embedder,
            narrator,
            results,
            retrieval_top_k,
        }
    }

    /// Top-k chunks nearest the job text, joined by blank lines.
    async fn retrieve_context(&self, document_id: &str, job_text: &str) -> Result<String, AppError> {
        let index = index::load(self.artifacts.as_ref(), document_id).await?;
        if index.is_empty() {
            return Err(AppError::NotFound(format!(
                "Vector index for document {document_id} holds no chunks"
            )));
        }
        let query = self.embedder.embed_one(job_text).await?;
        let hits = index.search(&query, self.retrieval_top_k)?;
        Ok(hits.join(CONTEXT_SEPARATOR))
    }

    pub async fn analyze(&self, document_id: &str, job_text: &str) -> Result<AnalysisResult, AppError> {
        let resume_text = storage::load_text(self.artifacts.as_ref(), document_id).await?;

        if job_text.trim().is_empty() {
            return Err(AppError::Validation(
                "Job description must not be empty".to_string(),
            ));
        }

        info!("Analyzing document {document_id}");
        let mut diagnostics = Vec::new();

        let (retrieval_context, context_source) =
            match self.retrieve_context(document_id, job_text).await {
                Ok(context) => (context, ContextSource::Retrieval),
                Err(e) => {
                    warn!("Retrieval failed for {document_id}, using full text: {e}");
                    diagnostics.push(format!("retrieval unavailable: {e}"));
                    (resume_text.clone(), ContextSource::FullText)
                }
            };

        let skill_analysis = extract_profile(&resume_text, job_text);
        let ats = self
            .scorer
            .compute_score(&resume_text, job_text, &skill_analysis.job_skills)
            .await;
        if let Some(cause) = &ats.diagnostic {
            diagnostics.push(cause.clone());
        }

        let match_percentage = match_percentage(ats.score, ats.semantic_similarity_score);
        info!(
            "Document {document_id}: ATS {:.1}, match {:.1}% ({:?} context)",
            ats.score, match_percentage, context_source
        );

        let input = NarrativeInput {
            resume_text: &resume_text,
            job_text,
            retrieval_context: &retrieval_context,
            skills: &skill_analysis,
            ats: &ats,
        };
        let narrative = match self.narrator.generate(&input).await {
            Ok(narrative) => narrative,
            Err(e) => {
                warn!(
                    "Narrative generation ({}) failed for {document_id}: {e}",
                    self.narrator.backend()
                );
                diagnostics.push(format!("narrative unavailable: {e}"));
                degraded_narrative(&e.to_string())
            }
        };

        let result = AnalysisResult {
            id: document_id.to_string(),
            match_percentage,
            skill_analysis,
            ats,
            narrative,
            context_source,
            diagnostics,
            created_at: Utc::now(),
        };

        self.results.put(result.clone()).await?;
        Ok(result)
    }

    pub async fn get_result(&self, id: &str) -> Result<AnalysisResult, AppError> {
        self.results
            .get(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("No analysis found for {id}")))
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::analysis::narrative::{Narrative, RuleBasedNarrator};
    use crate::analysis::results::InMemoryResultStore;
    use crate::retrieval::chunker::{chunk_text, ChunkConfig};
    use crate::retrieval::embedder::{Embeddings, HashingEmbedder};
    use crate::retrieval::index::VectorIndex;
    use crate::storage::local::LocalArtifactStore;

    const RESUME: &str = "Experience: Built data pipelines in Python and SQL at Acme. \
        Education: Bachelor's in Computer Science. \
        Skills: Python, SQL, Docker \
        Projects: churn prediction model.";
    const JOB: &str = "Looking for Python, SQL, Kubernetes, Docker";

    struct FailingNarrator;

    #[async_trait]
    impl NarrativeGenerator for FailingNarrator {
        async fn generate(&self, _input: &NarrativeInput<'_>) -> Result<Narrative, AppError> {
            Err(AppError::Llm("upstream timeout".to_string()))
        }

        fn backend(&self) -> &'static str {
            "failing"
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_id(&self) -> &str {
            "failing"
        }

        async fn dimension(&self) -> Result<usize, AppError> {
            Ok(8)
        }

        async fn embed(&self, _texts: &[String]) -> Result<Embeddings, AppError> {
            Err(AppError::Embedding("model offline".to_string()))
        }
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        artifacts: Arc<LocalArtifactStore>,
        results: Arc<InMemoryResultStore>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        Fixture {
            artifacts: Arc::new(LocalArtifactStore::new(dir.path())),
            results: Arc::new(InMemoryResultStore::new()),
            _dir: dir,
        }
    }

    fn pipeline(
        f: &Fixture,
        embedder: Arc<dyn Embedder>,
        narrator: Arc<dyn NarrativeGenerator>,
    ) -> AnalysisPipeline {
        AnalysisPipeline::new(f.artifacts.clone(), embedder, narrator, f.results.clone(), 5)
    }

    async fn index_document(f: &Fixture, embedder: &dyn Embedder, id: &str, text: &str) {
        storage::save_text(f.artifacts.as_ref(), id, text).await.unwrap();
        let chunks = chunk_text(text, &ChunkConfig::new(60, 10).unwrap());
        let embeddings = embedder.embed(&chunks).await.unwrap();
        let built = VectorIndex::build(chunks, embeddings).unwrap();
        index::persist(f.artifacts.as_ref(), &built, id).await.unwrap();
    }

    #[test]
    fn test_match_percentage_blend_and_clamp() {
        assert!((match_percentage(60.0, 0.5) - 55.0).abs() < 1e-9);
        assert_eq!(match_percentage(100.0, 1.0), 100.0);
        assert_eq!(match_percentage(0.0, 0.0), 0.0);
    }

    #[tokio::test]
    async fn test_end_to_end_with_index() {
        let f = fixture();
        let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::default());
        index_document(&f, embedder.as_ref(), "doc1", RESUME).await;
        let p = pipeline(&f, embedder, Arc::new(RuleBasedNarrator));

        let result = p.analyze("doc1", JOB).await.unwrap();

        for skill in ["python", "sql", "docker"] {
            assert!(result.skill_analysis.matched_skills.contains(&skill.to_string()));
        }
        assert!(result.skill_analysis.missing_skills.contains(&"kubernetes".to_string()));
        assert!(result
            .skill_analysis
            .education
            .contains(&"Bachelor's degree".to_string()));
        assert_eq!(result.ats.section_completeness_score, 100.0);
        assert_eq!(result.context_source, ContextSource::Retrieval);
        assert!(result.diagnostics.is_empty());
        assert!((0.0..=100.0).contains(&result.match_percentage));

        let stored = p.get_result("doc1").await.unwrap();
        assert_eq!(stored, result);
    }

    #[tokio::test]
    async fn test_missing_index_falls_back_to_full_text() {
        let f = fixture();
        storage::save_text(f.artifacts.as_ref(), "doc2", RESUME).await.unwrap();
        let p = pipeline(&f, Arc::new(HashingEmbedder::default()), Arc::new(RuleBasedNarrator));

        let result = p.analyze("doc2", JOB).await.unwrap();

        assert_eq!(result.context_source, ContextSource::FullText);
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics[0].starts_with("retrieval unavailable"));
        assert!(result.narrative.roadmap.raw_reasoning.is_some());
    }

    #[tokio::test]
    async fn test_unknown_document_is_not_found() {
        let f = fixture();
        let p = pipeline(&f, Arc::new(HashingEmbedder::default()), Arc::new(RuleBasedNarrator));
        assert!(matches!(p.analyze("nope", JOB).await, Err(AppError::NotFound(_))));
        assert!(matches!(p.get_result("nope").await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_blank_job_text_is_rejected() {
        let f = fixture();
        storage::save_text(f.artifacts.as_ref(), "doc3", RESUME).await.unwrap();
        let p = pipeline(&f, Arc::new(HashingEmbedder::default()), Arc::new(RuleBasedNarrator));
        assert!(matches!(p.analyze("doc3", "  \n ").await, Err(AppError::Validation(_))));
        assert!(f.results.get("doc3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_narrator_failure_degrades() {
        let f = fixture();
        storage::save_text(f.artifacts.as_ref(), "doc4", RESUME).await.unwrap();
        let p = pipeline(&f, Arc::new(HashingEmbedder::default()), Arc::new(FailingNarrator));

        let result = p.analyze("doc4", JOB).await.unwrap();

        assert!(result
            .narrative
            .skill_gap_summary
            .starts_with("Narrative analysis unavailable:"));
        assert!(result.narrative.skill_gap_summary.contains("upstream timeout"));
        assert!(result.diagnostics.iter().any(|d| d.starts_with("narrative unavailable")));
    }

    #[tokio::test]
    async fn test_embedder_failure_degrades_everything_but_lexical_signals() {
        let f = fixture();
        storage::save_text(f.artifacts.as_ref(), "doc5", RESUME).await.unwrap();
        let p = pipeline(&f, Arc::new(FailingEmbedder), Arc::new(RuleBasedNarrator));

        let result = p.analyze("doc5", JOB).await.unwrap();

        assert_eq!(result.context_source, ContextSource::FullText);
        assert_eq!(result.ats.semantic_similarity_score, 0.0);
        assert!(result.ats.diagnostic.is_some());
        assert_eq!(result.diagnostics.len(), 2);
        assert!((result.match_percentage - 0.5 * result.ats.score).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_reanalysis_overwrites_result() {
        let f = fixture();
        storage::save_text(f.artifacts.as_ref(), "doc6", RESUME).await.unwrap();
        let p = pipeline(&f, Arc::new(HashingEmbedder::default()), Arc::new(RuleBasedNarrator));

        p.analyze("doc6", "Kubernetes Terraform Go").await.unwrap();
        let second = p.analyze("doc6", JOB).await.unwrap();

        assert_eq!(p.get_result("doc6").await.unwrap(), second);
    }
}
