use std::path::Path;

use crate::article::ArticleCollection;
use crate::config::AppConfig;
use crate::export::{export_all, ExportFormat, ExportReport};
use crate::ingest::Orchestrator;
use crate::source::SourceDescriptor;
use crate::storage::{ArticleRepository, Database};
use crate::Result;

/// Run one ingestion pass over `sources`
pub async fn ingest(orchestrator: &Orchestrator, sources: &[SourceDescriptor]) -> ArticleCollection {
    let collection = orchestrator.run(sources).await;
    let metadata = collection.metadata();

    for report in metadata.sources.iter().filter(|r| r.is_failed()) {
        tracing::warn!(
            source = %report.name,
            errors = report.error_count(),
            "Source produced no articles this run"
        );
    }

    collection
}

/// Write a finished collection to each requested sink
pub async fn export(
    config: &AppConfig,
    collection: &ArticleCollection,
    formats: &[ExportFormat],
    output_dir: Option<&Path>,
) -> Result<Vec<ExportReport>> {
    if formats.is_empty() {
        tracing::debug!("No export formats configured");
        return Ok(Vec::new());
    }
    export_all(collection, formats, config, output_dir).await
}

/// Delete stored articles older than the retention period
pub async fn cleanup_old_articles(db: &Database, retention_days: u32) -> Result<u32> {
    let deleted = ArticleRepository::new(db).cleanup_old_articles(retention_days).await?;

    if deleted > 0 {
        tracing::info!("Cleaned up {} old articles", deleted);
    }

    Ok(deleted)
}
