mod csv;
mod json;
mod sqlite;

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::article::ArticleCollection;
use crate::config::AppConfig;
use crate::{Error, Result};

pub use self::csv::CsvExporter;
pub use self::json::JsonExporter;
pub use self::sqlite::SqliteExporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Json,
    Csv,
    Sqlite,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 3] = [ExportFormat::Json, ExportFormat::Csv, ExportFormat::Sqlite];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Sqlite => "sqlite",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "sqlite" | "db" => Ok(ExportFormat::Sqlite),
            other => Err(Error::Export(format!("unknown export format: {}", other))),
        }
    }
}

/// Where an export went and how many articles it wrote
#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub format: ExportFormat,
    pub location: PathBuf,
    /// For SQLite, only rows that were not already stored
    pub written: usize,
}

/// A sink for a finished collection
///
/// Exporters only read the collection; it is never modified after a run.
#[async_trait]
pub trait Exporter: Send + Sync {
    fn format(&self) -> ExportFormat;

    async fn export(&self, collection: &ArticleCollection) -> Result<ExportReport>;
}

/// Build the exporter for `format`
///
/// File exports go to `output_dir`; the SQLite sink always writes the
/// configured database.
pub fn exporter_for(format: ExportFormat, config: &AppConfig, output_dir: &Path) -> Box<dyn Exporter> {
    match format {
        ExportFormat::Json => Box::new(JsonExporter::new(output_dir)),
        ExportFormat::Csv => Box::new(CsvExporter::new(output_dir)),
        ExportFormat::Sqlite => Box::new(SqliteExporter::new(config.database_path())),
    }
}

/// Export a collection in every requested format, in order
///
/// Stops at the first sink that fails.
pub async fn export_all(
    collection: &ArticleCollection,
    formats: &[ExportFormat],
    config: &AppConfig,
    output_dir: Option<&Path>,
) -> Result<Vec<ExportReport>> {
    let output_dir = output_dir.map(Path::to_path_buf).unwrap_or_else(|| config.output_dir());
    let mut reports = Vec::with_capacity(formats.len());

    for format in dedup_formats(formats) {
        let exporter = exporter_for(format, config, &output_dir);
        let report = exporter.export(collection).await?;
        tracing::info!(
            format = %report.format,
            location = %report.location.display(),
            written = report.written,
            "Export complete"
        );
        reports.push(report);
    }

    Ok(reports)
}

fn dedup_formats(formats: &[ExportFormat]) -> Vec<ExportFormat> {
    let mut unique = Vec::new();
    for format in formats {
        if !unique.contains(format) {
            unique.push(*format);
        }
    }
    unique
}

/// `news_export_<timestamp>.<ext>`, stamped with the run's finish time
pub(crate) fn export_file_name(collection: &ArticleCollection, extension: &str) -> String {
    format!(
        "news_export_{}.{}",
        collection.metadata().finished_at.format("%Y%m%d_%H%M%S"),
        extension
    )
}

pub(crate) async fn write_export_file(dir: &Path, file_name: &str, contents: &[u8]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let path = dir.join(file_name);
    tokio::fs::write(&path, contents).await?;
    Ok(path)
}
