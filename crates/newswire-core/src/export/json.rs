use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{export_file_name, write_export_file, ExportFormat, ExportReport, Exporter};
use crate::article::ArticleCollection;
use crate::Result;

/// Pretty-printed `{metadata, articles}` document
pub struct JsonExporter {
    output_dir: PathBuf,
}

impl JsonExporter {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Exporter for JsonExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Json
    }

    async fn export(&self, collection: &ArticleCollection) -> Result<ExportReport> {
        let body = serde_json::to_vec_pretty(collection)?;
        let location = write_export_file(&self.output_dir, &export_file_name(collection, "json"), &body).await?;

        Ok(ExportReport {
            format: ExportFormat::Json,
            location,
            written: collection.len(),
        })
    }
}
