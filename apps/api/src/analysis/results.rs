//! Analysis result store: key → `AnalysisResult`.
//!
//! In-memory by default (process lifetime). `PgResultStore` keeps results in
//! Postgres when `DATABASE_URL` is configured; `db::create_pool` creates the
//! table. Both give read-your-writes: a `get` after a completed `put` under
//! the same key sees that value.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::errors::AppError;
use crate::models::analysis::AnalysisResult;

#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Stores `result` under `result.id`, replacing any earlier analysis.
    async fn put(&self, result: AnalysisResult) -> Result<(), AppError>;

    async fn get(&self, id: &str) -> Result<Option<AnalysisResult>, AppError>;

    fn backend(&self) -> &'static str;
}

#[derive(Default)]
pub struct InMemoryResultStore {
    results: RwLock<HashMap<String, AnalysisResult>>,
}

impl InMemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ResultStore for InMemoryResultStore {
    async fn put(&self, result: AnalysisResult) -> Result<(), AppError> {
        self.results.write().await.insert(result.id.clone(), result);
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<AnalysisResult>, AppError> {
        Ok(self.results.read().await.get(id).cloned())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

pub struct PgResultStore {
    pool: PgPool,
}

impl PgResultStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ResultStore for PgResultStore {
    async fn put(&self, result: AnalysisResult) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO analysis_results (id, payload, created_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
            SET payload = EXCLUDED.payload, created_at = EXCLUDED.created_at
            "#,
        )
        .bind(&result.id)
        .bind(Json(&result))
        .bind(result.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<AnalysisResult>, AppError> {
        let row: Option<(Json<AnalysisResult>,)> =
            sqlx::query_as("SELECT payload FROM analysis_results WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(Json(result),)| result))
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;

    use super::*;
    use crate::analysis::ats::{AtsResult, ATS_EXPLANATION};
    use crate::analysis::narrative::degraded_narrative;
    use crate::analysis::skills::extract_profile;
    use crate::models::analysis::ContextSource;

    fn result(id: &str, match_percentage: f64) -> AnalysisResult {
        AnalysisResult {
            id: id.to_string(),
            match_percentage,
            skill_analysis: extract_profile("python", "python sql"),
            ats: AtsResult {
                score: 10.0,
                keyword_match_score: 50.0,
                semantic_similarity_score: 0.0,
                section_completeness_score: 0.0,
                explanation: ATS_EXPLANATION.to_string(),
                matched_keywords: vec!["python".to_string()],
                missing_keywords: vec!["sql".to_string()],
                diagnostic: None,
            },
            narrative: degraded_narrative("test"),
            context_source: ContextSource::FullText,
            diagnostics: vec![],
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let store = InMemoryResultStore::new();
        store.put(result("a", 42.0)).await.unwrap();
        let stored = store.get("a").await.unwrap().unwrap();
        assert_eq!(stored.match_percentage, 42.0);
        assert!(store.get("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_overwrites_same_key() {
        let store = InMemoryResultStore::new();
        store.put(result("a", 1.0)).await.unwrap();
        store.put(result("a", 2.0)).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().unwrap().match_percentage, 2.0);
    }

    #[tokio::test]
    async fn test_concurrent_writes_under_different_keys() {
        let store = Arc::new(InMemoryResultStore::new());
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    let id = format!("doc-{i}");
                    store.put(result(&id, i as f64)).await.unwrap();
                    store.get(&id).await.unwrap().map(|r| r.match_percentage)
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), Some(i as f64));
        }
        for i in 0..32 {
            let stored = store.get(&format!("doc-{i}")).await.unwrap().unwrap();
            assert_eq!(stored.match_percentage, i as f64);
        }
    }
}
