use chrono::{DateTime, Utc};
use sqlx::FromRow;

use super::retry::with_retry;
use super::Database;
use crate::article::RunMetadata;
use crate::Result;

/// Summary row for one recorded ingestion run
#[derive(Debug, Clone, FromRow)]
pub struct RunRecord {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources_total: i64,
    pub sources_failed: i64,
    pub articles_collected: i64,
    pub articles_stored: i64,
    pub duplicates: i64,
}

/// Repository for run history
pub struct RunRepository<'a> {
    db: &'a Database,
}

impl<'a> RunRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Record a finished run; `collected` and `stored` count articles in the
    /// collection and rows newly written to `articles`
    pub async fn record(&self, metadata: &RunMetadata, collected: usize, stored: u32) -> Result<()> {
        let pool = self.db.pool();
        let run_id = metadata.run_id.to_string();
        let reports = serde_json::to_string(&metadata.sources)?;

        with_retry(|| {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO scrape_runs
                (run_id, started_at, finished_at, sources_total, sources_failed,
                 articles_collected, articles_stored, duplicates, source_reports)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&run_id)
            .bind(metadata.started_at)
            .bind(metadata.finished_at)
            .bind(metadata.sources.len() as i64)
            .bind(metadata.failed_sources() as i64)
            .bind(collected as i64)
            .bind(stored as i64)
            .bind(metadata.total_duplicates() as i64)
            .bind(&reports)
            .execute(pool)
        })
        .await?;

        Ok(())
    }

    /// Newest first
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<RunRecord>> {
        let pool = self.db.pool();
        let runs = with_retry(|| {
            sqlx::query_as::<_, RunRecord>(
                r#"
                SELECT run_id, started_at, finished_at, sources_total, sources_failed,
                       articles_collected, articles_stored, duplicates
                FROM scrape_runs
                ORDER BY started_at DESC
                LIMIT ?
                "#,
            )
            .bind(limit)
            .fetch_all(pool)
        })
        .await?;
        Ok(runs)
    }

    /// Per-source reports stored with a run
    pub async fn source_reports(&self, run_id: &str) -> Result<Vec<serde_json::Value>> {
        let pool = self.db.pool();
        let raw: Option<String> = with_retry(|| {
            sqlx::query_scalar("SELECT source_reports FROM scrape_runs WHERE run_id = ?")
                .bind(run_id)
                .fetch_optional(pool)
        })
        .await?;

        match raw {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }
}
