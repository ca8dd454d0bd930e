use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{export_file_name, write_export_file, ExportFormat, ExportReport, Exporter};
use crate::article::{Article, ArticleCollection};
use crate::Result;

const HEADER: [&str; 10] = [
    "fingerprint",
    "title",
    "url",
    "summary",
    "author",
    "published_at",
    "source_name",
    "region",
    "categories",
    "image_url",
];

/// One row per article, RFC 4180 quoting, categories joined with `|`
pub struct CsvExporter {
    output_dir: PathBuf,
}

impl CsvExporter {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Exporter for CsvExporter {
    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }

    async fn export(&self, collection: &ArticleCollection) -> Result<ExportReport> {
        let body = render(collection.articles());
        let location = write_export_file(&self.output_dir, &export_file_name(collection, "csv"), body.as_bytes()).await?;

        Ok(ExportReport {
            format: ExportFormat::Csv,
            location,
            written: collection.len(),
        })
    }
}

fn render(articles: &[Article]) -> String {
    let mut out = String::new();
    push_record(&mut out, HEADER.iter().map(|h| h.to_string()));

    for article in articles {
        push_record(
            &mut out,
            [
                article.fingerprint().to_string(),
                article.title().to_string(),
                article.url().to_string(),
                article.summary().unwrap_or_default().to_string(),
                article.author().unwrap_or_default().to_string(),
                article.published_at().map(|d| d.to_rfc3339()).unwrap_or_default(),
                article.source_name().to_string(),
                article.region().to_string(),
                article.categories().join("|"),
                article.image_url().unwrap_or_default().to_string(),
            ],
        );
    }

    out
}

fn push_record(out: &mut String, fields: impl IntoIterator<Item = String>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape(&field));
    }
    out.push_str("\r\n");
}

fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::fixtures;

    #[test]
    fn test_escape_quotes_only_when_needed() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape("two\nlines"), "\"two\nlines\"");
    }

    #[tokio::test]
    async fn test_writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let collection = fixtures::collection();

        let report = CsvExporter::new(dir.path()).export(&collection).await.unwrap();
        assert_eq!(report.written, 2);
        assert!(report.location.to_string_lossy().ends_with(".csv"));

        let raw = std::fs::read_to_string(&report.location).unwrap();
        let mut rows = raw.split("\r\n");
        assert_eq!(
            rows.next().unwrap(),
            "fingerprint,title,url,summary,author,published_at,source_name,region,categories,image_url"
        );

        let first = rows.next().unwrap();
        assert!(first.contains("\"Budget passed, \"\"finally\"\"\""));
        assert!(first.contains("\"MPs voted.\nDebate ran late.\""));
        assert!(first.contains("2024-03-14T08:00:00+00:00"));
        assert!(first.contains(",Politics|Economy,"));

        let second = rows.next().unwrap();
        assert!(second.starts_with(collection.articles()[1].fingerprint()));
        assert!(second.ends_with(",Nation,kenya,General,"));
        assert_eq!(rows.next(), Some(""));
    }
}
