use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

const MAX_CONNECTIONS: u32 = 5;
const ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// Connects to Postgres and makes sure the results table exists.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
        .connect(database_url)
        .await
        .context("Failed to connect to PostgreSQL")?;

    ensure_schema(&pool).await?;
    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Results are stored whole as JSONB, keyed by document id.
async fn ensure_schema(pool: &PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_results (
            id TEXT PRIMARY KEY,
            payload JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create analysis_results table")?;
    Ok(())
}
