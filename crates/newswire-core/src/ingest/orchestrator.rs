use std::sync::Arc;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio::time::Instant;

use crate::article::{Article, ArticleCollection, CollectionBuilder, Deduplicator, SourceOutcome, SourceReport};
use crate::config::FetchConfig;
use crate::extract::{Extraction, Extractor};
use crate::fetch::{Fetcher, HttpTransport, Throttler, Transport};
use crate::source::SourceDescriptor;
use crate::Result;

/// Lifecycle of one source within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Pending,
    Fetching,
    Extracted,
    Deduplicated,
    Failed,
    Done,
}

impl SourceState {
    pub fn can_transition_to(self, next: SourceState) -> bool {
        use SourceState::*;
        matches!(
            (self, next),
            (Pending, Fetching)
                | (Fetching, Extracted)
                | (Fetching, Failed)
                | (Extracted, Deduplicated)
                | (Deduplicated, Done)
                | (Failed, Done)
        )
    }
}

#[derive(Debug)]
struct SourceProgress<'a> {
    name: &'a str,
    state: SourceState,
}

impl<'a> SourceProgress<'a> {
    fn new(name: &'a str) -> Self {
        Self {
            name,
            state: SourceState::Pending,
        }
    }

    fn advance(&mut self, next: SourceState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::trace!(source = self.name, from = ?self.state, to = ?next, "Source state");
        self.state = next;
    }
}

enum Processed {
    Extracted(Extraction),
    Errored(String),
    Abandoned,
}

/// Per-run state: a fresh throttle clock and the fetch stack built on it
struct RunContext {
    extractor: Extractor,
    deadline: Option<Instant>,
}

impl RunContext {
    fn new(config: &FetchConfig, transport: Arc<dyn Transport>) -> Self {
        let throttler = Arc::new(Throttler::new(config.rate_limit_delay()));
        let fetcher = Arc::new(Fetcher::from_config(config, transport, throttler));
        Self {
            extractor: Extractor::new(fetcher, config.max_articles_per_source),
            deadline: config
                .run_timeout()
                .and_then(|timeout| Instant::now().checked_add(timeout)),
        }
    }

    async fn process<'a>(&self, source: &'a SourceDescriptor) -> (SourceProgress<'a>, Processed) {
        let mut progress = SourceProgress::new(&source.name);
        progress.advance(SourceState::Fetching);

        let work = self.extractor.extract(source);
        let result = match self.deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, work).await {
                Ok(result) => result,
                Err(_) => {
                    progress.advance(SourceState::Failed);
                    return (progress, Processed::Abandoned);
                }
            },
            None => work.await,
        };

        match result {
            Ok(extraction) if extraction.all_paths_failed() => {
                progress.advance(SourceState::Failed);
                (progress, Processed::Extracted(extraction))
            }
            Ok(extraction) => {
                progress.advance(SourceState::Extracted);
                (progress, Processed::Extracted(extraction))
            }
            Err(e) => {
                progress.advance(SourceState::Failed);
                (progress, Processed::Errored(e.to_string()))
            }
        }
    }
}

/// Runs every enabled source through fetch, extraction and deduplication
pub struct Orchestrator {
    config: FetchConfig,
    transport: Arc<dyn Transport>,
}

impl Orchestrator {
    pub fn new(config: FetchConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    /// Orchestrator backed by the real HTTP transport
    pub fn from_config(config: &FetchConfig) -> Result<Self> {
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(config.clone(), Arc::new(transport)))
    }

    /// Ingest `sources` and return the frozen collection
    ///
    /// Sources run concurrently up to the configured cap, but results are
    /// deduplicated and appended in descriptor order, so completion order
    /// never affects the output. A failing source never aborts the run.
    pub async fn run(&self, sources: &[SourceDescriptor]) -> ArticleCollection {
        let context = RunContext::new(&self.config, self.transport.clone());
        let mut builder = CollectionBuilder::new(Utc::now());
        let mut dedup = Deduplicator::new();

        let enabled: Vec<&SourceDescriptor> = sources.iter().filter(|s| s.enabled).collect();
        tracing::info!(
            run_id = %builder.run_id(),
            sources = enabled.len(),
            skipped = sources.len() - enabled.len(),
            concurrency = self.config.concurrency.max(1),
            "Starting ingestion run"
        );

        // Owned index items keep the run future Send
        let context = &context;
        let enabled = &enabled;
        let mut processed = stream::iter(0..enabled.len())
            .map(|i| async move {
                let source = enabled[i];
                let (progress, outcome) = context.process(source).await;
                (source, progress, outcome)
            })
            .buffered(self.config.concurrency.max(1));

        while let Some((source, mut progress, outcome)) = processed.next().await {
            let (report, articles) = Self::finish_source(source, &mut progress, outcome, &mut dedup);
            builder.push_source(report, articles);
        }

        let collection = builder.finish(Utc::now());
        let metadata = collection.metadata();
        tracing::info!(
            run_id = %metadata.run_id,
            articles = collection.len(),
            duplicates = metadata.total_duplicates(),
            failed_sources = metadata.failed_sources(),
            "Ingestion run finished"
        );
        collection
    }

    fn finish_source(
        source: &SourceDescriptor,
        progress: &mut SourceProgress<'_>,
        outcome: Processed,
        dedup: &mut Deduplicator,
    ) -> (SourceReport, Vec<Article>) {
        let mut report = SourceReport::new(source);

        let extraction = match outcome {
            Processed::Extracted(extraction) => extraction,
            Processed::Errored(message) => {
                tracing::error!(source = %source.name, error = %message, "Source failed");
                report.outcome = SourceOutcome::Failed;
                report.errors.push(message);
                progress.advance(SourceState::Done);
                return (report, Vec::new());
            }
            Processed::Abandoned => {
                tracing::warn!(source = %source.name, "Source abandoned at run deadline");
                report.outcome = SourceOutcome::Failed;
                report.errors.push("abandoned: run deadline reached".to_string());
                progress.advance(SourceState::Done);
                return (report, Vec::new());
            }
        };

        report.path = extraction.path;
        report.dropped = extraction.dropped;
        report.parse_misses = extraction.parse_misses;
        report.attempts = extraction.attempts;
        for failure in &extraction.failures {
            if failure.transient {
                report.transient_failures += 1;
            } else {
                report.permanent_failures += 1;
            }
            report.errors.push(failure.to_string());
        }

        if progress.state == SourceState::Failed {
            tracing::warn!(source = %source.name, errors = ?report.errors, "Source failed");
            report.outcome = SourceOutcome::Failed;
            progress.advance(SourceState::Done);
            return (report, Vec::new());
        }

        let mut admitted = Vec::with_capacity(extraction.articles.len());
        for article in extraction.articles {
            if dedup.admit(&article) {
                admitted.push(article);
            } else {
                report.duplicates += 1;
            }
        }
        progress.advance(SourceState::Deduplicated);

        report.articles = admitted.len();
        tracing::info!(
            source = %source.name,
            path = ?report.path,
            articles = report.articles,
            duplicates = report.duplicates,
            dropped = report.dropped,
            errors = report.error_count(),
            "Source ingested"
        );
        progress.advance(SourceState::Done);

        (report, admitted)
    }
}
