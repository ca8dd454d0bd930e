use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::dedup::fingerprint;
use crate::extract::text::is_article_url;
use crate::extract::ExtractionPath;
use crate::source::SourceDescriptor;

/// Unvalidated record produced by an extractor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleCandidate {
    pub title: Option<String>,
    pub url: Option<String>,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub categories: Vec<String>,
    pub image_url: Option<String>,
}

/// Why a candidate was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    MissingTitle,
    MissingUrl,
    NotAnArticle,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::MissingTitle => f.write_str("missing title"),
            Rejection::MissingUrl => f.write_str("missing url"),
            Rejection::NotAnArticle => f.write_str("url is not an article"),
        }
    }
}

/// A validated news article
///
/// Title and URL are always non-empty. Fields are read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    fingerprint: String,
    title: String,
    url: String,
    summary: Option<String>,
    author: Option<String>,
    published_at: Option<DateTime<Utc>>,
    source_name: String,
    region: String,
    categories: Vec<String>,
    image_url: Option<String>,
}

impl Article {
    /// Validate a candidate and attribute it to `source`
    pub fn from_candidate(candidate: ArticleCandidate, source: &SourceDescriptor) -> Result<Self, Rejection> {
        let title = candidate
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(Rejection::MissingTitle)?;
        let url = candidate
            .url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or(Rejection::MissingUrl)?;
        if !is_article_url(&url) {
            return Err(Rejection::NotAnArticle);
        }

        let mut categories: Vec<String> = Vec::new();
        for category in candidate.categories {
            let category = category.trim();
            if !category.is_empty() && !categories.iter().any(|c| c.eq_ignore_ascii_case(category)) {
                categories.push(category.to_string());
            }
        }
        if categories.is_empty() {
            categories = source.categories.clone();
        }

        Ok(Self {
            fingerprint: fingerprint(&url, &title),
            title,
            url,
            summary: candidate.summary.filter(|s| !s.trim().is_empty()),
            author: candidate.author.filter(|a| !a.trim().is_empty()),
            published_at: candidate.published_at,
            source_name: source.name.clone(),
            region: source.region.clone(),
            categories,
            image_url: candidate.image_url,
        })
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }

    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    pub fn source_name(&self) -> &str {
        &self.source_name
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceOutcome {
    Ingested,
    Failed,
}

/// Per-source counters for one run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceReport {
    pub name: String,
    pub region: String,
    pub outcome: SourceOutcome,
    /// Path the articles came from, if any succeeded
    pub path: Option<ExtractionPath>,
    /// Unique articles contributed to the collection
    pub articles: usize,
    pub duplicates: usize,
    /// Candidates dropped by validation
    pub dropped: usize,
    pub parse_misses: u32,
    pub transient_failures: u32,
    pub permanent_failures: u32,
    pub attempts: u32,
    pub errors: Vec<String>,
}

impl SourceReport {
    pub fn new(source: &SourceDescriptor) -> Self {
        Self {
            name: source.name.clone(),
            region: source.region.clone(),
            outcome: SourceOutcome::Ingested,
            path: None,
            articles: 0,
            duplicates: 0,
            dropped: 0,
            parse_misses: 0,
            transient_failures: 0,
            permanent_failures: 0,
            attempts: 0,
            errors: Vec::new(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.outcome == SourceOutcome::Failed
    }

    pub fn error_count(&self) -> u32 {
        self.transient_failures + self.permanent_failures
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetadata {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
}

impl RunMetadata {
    pub fn report(&self, name: &str) -> Option<&SourceReport> {
        self.sources.iter().find(|r| r.name.eq_ignore_ascii_case(name))
    }

    pub fn failed_sources(&self) -> usize {
        self.sources.iter().filter(|r| r.is_failed()).count()
    }

    pub fn total_duplicates(&self) -> usize {
        self.sources.iter().map(|r| r.duplicates).sum()
    }

    pub fn total_dropped(&self) -> usize {
        self.sources.iter().map(|r| r.dropped).sum()
    }

    pub fn total_errors(&self) -> u32 {
        self.sources.iter().map(|r| r.error_count()).sum()
    }
}

/// Frozen output of one ingestion run
///
/// Articles keep source order, then extraction order within a source, and
/// every fingerprint is unique.
#[derive(Debug, Clone, Serialize)]
pub struct ArticleCollection {
    metadata: RunMetadata,
    articles: Vec<Article>,
}

impl ArticleCollection {
    pub fn metadata(&self) -> &RunMetadata {
        &self.metadata
    }

    pub fn articles(&self) -> &[Article] {
        &self.articles
    }

    pub fn len(&self) -> usize {
        self.articles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.articles.is_empty()
    }

    pub fn by_region<'a>(&'a self, region: &'a str) -> impl Iterator<Item = &'a Article> {
        self.articles
            .iter()
            .filter(move |a| a.region.eq_ignore_ascii_case(region))
    }

    pub fn by_source<'a>(&'a self, source_name: &'a str) -> impl Iterator<Item = &'a Article> {
        self.articles
            .iter()
            .filter(move |a| a.source_name.eq_ignore_ascii_case(source_name))
    }

    pub fn into_articles(self) -> Vec<Article> {
        self.articles
    }
}

/// Assembles a collection source by source; only the orchestrator holds one
#[derive(Debug)]
pub(crate) struct CollectionBuilder {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    reports: Vec<SourceReport>,
    articles: Vec<Article>,
}

impl CollectionBuilder {
    pub(crate) fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at,
            reports: Vec::new(),
            articles: Vec::new(),
        }
    }

    pub(crate) fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub(crate) fn push_source(&mut self, report: SourceReport, articles: Vec<Article>) {
        self.reports.push(report);
        self.articles.extend(articles);
    }

    pub(crate) fn finish(self, finished_at: DateTime<Utc>) -> ArticleCollection {
        ArticleCollection {
            metadata: RunMetadata {
                run_id: self.run_id,
                started_at: self.started_at,
                finished_at,
                sources: self.reports,
            },
            articles: self.articles,
        }
    }
}
