use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{ExportFormat, ExportReport, Exporter};
use crate::article::ArticleCollection;
use crate::storage::{ArticleRepository, Database, RunRepository};
use crate::Result;

/// Appends a collection to a SQLite database
///
/// Articles whose fingerprint is already stored are skipped, so reloading
/// the same stories across runs does not duplicate rows.
pub struct SqliteExporter {
    path: PathBuf,
}

impl SqliteExporter {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Store the collection in an already open database
    pub async fn store(db: &Database, collection: &ArticleCollection) -> Result<u32> {
        let metadata = collection.metadata();
        let stored = ArticleRepository::new(db)
            .insert_many(collection.articles(), metadata.run_id)
            .await?;
        RunRepository::new(db).record(metadata, collection.len(), stored).await?;

        tracing::debug!(
            run_id = %metadata.run_id,
            collected = collection.len(),
            stored,
            "Stored collection"
        );
        Ok(stored)
    }
}

#[async_trait]
impl Exporter for SqliteExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Sqlite
    }

    async fn export(&self, collection: &ArticleCollection) -> Result<ExportReport> {
        let db = Database::open(&self.path).await?;
        let stored = Self::store(&db, collection).await;
        db.close().await;

        Ok(ExportReport {
            format: ExportFormat::Sqlite,
            location: self.path.clone(),
            written: stored? as usize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::fixtures;

    #[tokio::test]
    async fn test_reexport_skips_stored_articles() {
        let db = Database::new_in_memory().await.unwrap();
        let collection = fixtures::collection();

        assert_eq!(SqliteExporter::store(&db, &collection).await.unwrap(), 2);
        assert_eq!(SqliteExporter::store(&db, &collection).await.unwrap(), 0);
        assert_eq!(ArticleRepository::new(&db).count().await.unwrap(), 2);

        let runs = RunRepository::new(&db).list_recent(5).await.unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].articles_collected, 2);
        assert_eq!(runs[0].articles_stored, 0);
    }

    #[tokio::test]
    async fn test_export_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("news.db");

        let report = SqliteExporter::new(&path)
            .export(&fixtures::collection())
            .await
            .unwrap();

        assert_eq!(report.location, path);
        assert_eq!(report.written, 2);
        assert!(path.exists());
    }
}
