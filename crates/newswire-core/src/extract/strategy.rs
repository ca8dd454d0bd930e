use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use serde::Serialize;
use url::Url;

use super::feed::parse_entries;
use super::html::{extract_candidates, CompiledSelectors};
use crate::article::{Article, ArticleCandidate};
use crate::fetch::{FetchFailure, FetchKind, FetchOutcome, FetchResult, Fetcher};
use crate::source::SourceDescriptor;
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionPath {
    Feed,
    Page,
}

impl From<FetchKind> for ExtractionPath {
    fn from(kind: FetchKind) -> Self {
        match kind {
            FetchKind::Feed => ExtractionPath::Feed,
            FetchKind::Page => ExtractionPath::Page,
        }
    }
}

impl fmt::Display for ExtractionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionPath::Feed => f.write_str("feed"),
            ExtractionPath::Page => f.write_str("page"),
        }
    }
}

/// How a source is read, decided from its descriptor when extraction starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionPlan<'a> {
    FeedFirst {
        feed_url: &'a str,
        fallback: Option<&'a str>,
    },
    PageOnly {
        page_url: &'a str,
    },
    Unconfigured,
}

impl<'a> ExtractionPlan<'a> {
    pub fn for_source(source: &'a SourceDescriptor) -> Self {
        match (source.feed_target(), source.page_target()) {
            (Some(feed_url), fallback) => ExtractionPlan::FeedFirst { feed_url, fallback },
            (None, Some(page_url)) => ExtractionPlan::PageOnly { page_url },
            (None, None) => ExtractionPlan::Unconfigured,
        }
    }
}

/// A path whose fetch ended in a failure
#[derive(Debug, Clone, PartialEq)]
pub struct PathFailure {
    pub path: ExtractionPath,
    pub target: String,
    pub attempts: u32,
    /// Retry budget exhausted on transient failures, as opposed to a permanent failure
    pub transient: bool,
    pub failure: FetchFailure,
}

impl fmt::Display for PathFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.transient {
            write!(f, "{}: {} after {} attempts", self.path, self.failure, self.attempts)
        } else {
            write!(f, "{}: {}", self.path, self.failure)
        }
    }
}

/// Everything one source's extraction produced
#[derive(Debug, Default)]
pub struct Extraction {
    /// Valid articles in extraction order, capped per source
    pub articles: Vec<Article>,
    pub path: Option<ExtractionPath>,
    pub failures: Vec<PathFailure>,
    pub parse_misses: u32,
    pub dropped: usize,
    pub attempts: u32,
    paths_attempted: u32,
}

impl Extraction {
    /// Every path tried ended in a network failure
    pub fn all_paths_failed(&self) -> bool {
        self.paths_attempted > 0 && self.failures.len() as u32 == self.paths_attempted
    }

    fn record_failure(&mut self, result: &FetchResult) {
        let (transient, failure) = match &result.outcome {
            FetchOutcome::TransientFailure(f) => (true, f.clone()),
            FetchOutcome::PermanentFailure(f) => (false, f.clone()),
            FetchOutcome::Success { .. } => return,
        };
        self.failures.push(PathFailure {
            path: result.kind.into(),
            target: result.target.clone(),
            attempts: result.attempts,
            transient,
            failure,
        });
    }
}

/// Feed-first, page-fallback extraction for one source at a time
pub struct Extractor {
    fetcher: Arc<Fetcher>,
    max_articles: usize,
}

impl Extractor {
    pub fn new(fetcher: Arc<Fetcher>, max_articles: usize) -> Self {
        Self {
            fetcher,
            max_articles: max_articles.max(1),
        }
    }

    /// Produce the source's valid articles
    ///
    /// A successful, non-empty feed suppresses the page fetch entirely. Network
    /// and parse problems are recorded on the [`Extraction`]; only a
    /// misconfigured descriptor is an error.
    pub async fn extract(&self, source: &SourceDescriptor) -> Result<Extraction> {
        let mut extraction = Extraction::default();
        let base = source.base_url();
        let plan = ExtractionPlan::for_source(source);

        // Selector errors surface before any request is made
        let selectors = match plan {
            ExtractionPlan::FeedFirst { fallback: Some(_), .. } | ExtractionPlan::PageOnly { .. } => {
                Some(CompiledSelectors::compile(source)?)
            }
            _ => None,
        };

        match (plan, selectors.as_ref()) {
            (ExtractionPlan::FeedFirst { feed_url, fallback }, selectors) => {
                if self.try_feed(source, feed_url, base.as_ref(), &mut extraction).await? {
                    return Ok(extraction);
                }
                if let (Some(page_url), Some(selectors)) = (fallback, selectors) {
                    tracing::info!(source = %source.name, "Feed unusable, falling back to page");
                    self.try_page(source, page_url, selectors, base.as_ref(), &mut extraction)
                        .await?;
                }
            }
            (ExtractionPlan::PageOnly { page_url }, Some(selectors)) => {
                self.try_page(source, page_url, selectors, base.as_ref(), &mut extraction)
                    .await?;
            }
            (ExtractionPlan::PageOnly { .. }, None) => {}
            (ExtractionPlan::Unconfigured, _) => {
                tracing::warn!(source = %source.name, "Source has neither feed nor page URL");
            }
        }

        Ok(extraction)
    }

    async fn fetch_body(&self, target: &str, kind: FetchKind, extraction: &mut Extraction) -> Result<Option<Bytes>> {
        extraction.paths_attempted += 1;
        let result = self.fetcher.fetch(target, kind).await?;
        extraction.attempts += result.attempts;

        match result.body() {
            Some(body) => Ok(Some(body.clone())),
            None => {
                extraction.record_failure(&result);
                Ok(None)
            }
        }
    }

    async fn try_feed(
        &self,
        source: &SourceDescriptor,
        feed_url: &str,
        base: Option<&Url>,
        extraction: &mut Extraction,
    ) -> Result<bool> {
        let Some(body) = self.fetch_body(feed_url, FetchKind::Feed, extraction).await? else {
            return Ok(false);
        };

        let candidates = match parse_entries(&body, base) {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(source = %source.name, error = %e, "Feed did not parse");
                extraction.parse_misses += 1;
                return Ok(false);
            }
        };

        Ok(self.accept(source, candidates, ExtractionPath::Feed, extraction))
    }

    async fn try_page(
        &self,
        source: &SourceDescriptor,
        page_url: &str,
        selectors: &CompiledSelectors,
        base: Option<&Url>,
        extraction: &mut Extraction,
    ) -> Result<bool> {
        let Some(body) = self.fetch_body(page_url, FetchKind::Page, extraction).await? else {
            return Ok(false);
        };

        let html = String::from_utf8_lossy(&body);
        let candidates = extract_candidates(&html, selectors, base, Utc::now());
        Ok(self.accept(source, candidates, ExtractionPath::Page, extraction))
    }

    /// Validate in order up to the cap; false when nothing usable came out
    fn accept(
        &self,
        source: &SourceDescriptor,
        candidates: Vec<ArticleCandidate>,
        path: ExtractionPath,
        extraction: &mut Extraction,
    ) -> bool {
        let mut articles = Vec::new();
        for candidate in candidates {
            if articles.len() >= self.max_articles {
                break;
            }
            match Article::from_candidate(candidate, source) {
                Ok(article) => articles.push(article),
                Err(reason) => {
                    extraction.dropped += 1;
                    tracing::debug!(source = %source.name, %path, %reason, "Dropping candidate");
                }
            }
        }

        if articles.is_empty() {
            tracing::info!(source = %source.name, %path, "No usable entries");
            extraction.parse_misses += 1;
            return false;
        }

        tracing::debug!(source = %source.name, %path, count = articles.len(), "Extracted articles");
        extraction.articles = articles;
        extraction.path = Some(path);
        true
    }
}
