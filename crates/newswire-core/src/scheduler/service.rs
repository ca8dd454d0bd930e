use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::export::ExportFormat;
use crate::ingest::Orchestrator;
use crate::source::SourceDescriptor;
use crate::storage::Database;
use crate::Result;

use super::tasks::{cleanup_old_articles, export, ingest};

/// Events emitted after each scheduled task
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// An ingestion run finished
    RunCompleted {
        run_id: Uuid,
        articles: usize,
        failed_sources: usize,
    },
    /// A sink accepted the run's collection
    Exported {
        format: ExportFormat,
        location: PathBuf,
        written: usize,
    },
    /// Expired articles were removed from the database
    ArticlesCleaned { deleted: u32 },
    /// A task failed; the scheduler keeps going
    Error { task: String, message: String },
}

/// Repeats ingest and export on a fixed interval until shut down
///
/// The first cycle runs immediately. When the SQLite sink is among the
/// formats, each cycle also removes articles past the retention period.
pub struct SchedulerService {
    orchestrator: Arc<Orchestrator>,
    config: Arc<AppConfig>,
    sources: Arc<Vec<SourceDescriptor>>,
    formats: Vec<ExportFormat>,
    interval: Duration,
    event_tx: Option<mpsc::UnboundedSender<SchedulerEvent>>,
}

impl SchedulerService {
    pub fn new(orchestrator: Arc<Orchestrator>, config: Arc<AppConfig>, sources: Vec<SourceDescriptor>) -> Self {
        let interval = config.scheduler.interval();
        let formats = config.export.formats.clone();
        Self {
            orchestrator,
            config,
            sources: Arc::new(sources),
            formats,
            interval,
            event_tx: None,
        }
    }

    /// Override the configured interval
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Override the configured export formats
    pub fn with_formats(mut self, formats: Vec<ExportFormat>) -> Self {
        self.formats = formats;
        self
    }

    pub fn with_event_sender(mut self, tx: mpsc::UnboundedSender<SchedulerEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    fn send_event(&self, event: SchedulerEvent) {
        if let Some(ref tx) = self.event_tx {
            if tx.send(event).is_err() {
                warn!("Failed to send scheduler event: receiver dropped");
            }
        }
    }

    fn send_error(&self, task: &str, message: String) {
        error!("Scheduled {} failed: {}", task, message);
        self.send_event(SchedulerEvent::Error {
            task: task.to_string(),
            message,
        });
    }

    /// Run cycles until the shutdown signal flips to true
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Scheduler started: every {}s, {} sources, formats={:?}",
            self.interval.as_secs(),
            self.sources.len(),
            self.formats
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        info!("Scheduler received shutdown signal");
                        break;
                    }
                }

                // The first tick completes immediately
                _ = interval.tick() => {
                    debug!("Running scheduled ingestion");
                    self.run_cycle().await;
                }
            }
        }

        info!("Scheduler stopped");
    }

    /// One ingest, export and cleanup pass
    pub async fn run_cycle(&self) {
        let collection = ingest(&self.orchestrator, &self.sources).await;
        let metadata = collection.metadata();
        info!(
            "Scheduled run {}: {} articles, {} failed sources",
            metadata.run_id,
            collection.len(),
            metadata.failed_sources()
        );
        self.send_event(SchedulerEvent::RunCompleted {
            run_id: metadata.run_id,
            articles: collection.len(),
            failed_sources: metadata.failed_sources(),
        });

        match export(&self.config, &collection, &self.formats, None).await {
            Ok(reports) => {
                for report in reports {
                    self.send_event(SchedulerEvent::Exported {
                        format: report.format,
                        location: report.location,
                        written: report.written,
                    });
                }
            }
            Err(e) => self.send_error("export", e.to_string()),
        }

        if self.formats.contains(&ExportFormat::Sqlite) {
            match self.cleanup().await {
                Ok(deleted) => self.send_event(SchedulerEvent::ArticlesCleaned { deleted }),
                Err(e) => self.send_error("cleanup", e.to_string()),
            }
        }
    }

    async fn cleanup(&self) -> Result<u32> {
        let db = Database::open(&self.config.database_path()).await?;
        let deleted = cleanup_old_articles(&db, self.config.scheduler.retention_days).await;
        db.close().await;
        deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FetchConfig, MAX_INTERVAL_HOURS};
    use crate::fetch::testing::{MockTransport, Reply};
    use tokio::time::timeout;

    const FEED: &str = r#"<rss version="2.0"><channel><title>t</title>
        <item><title>Scheduled story</title><link>https://wire.example.com/news/1</link></item>
        </channel></rss>"#;

    fn service(data_dir: PathBuf, formats: Vec<ExportFormat>) -> (SchedulerService, Arc<MockTransport>) {
        let mock = Arc::new(MockTransport::new());
        mock.script("https://wire.example.com/rss", vec![Reply::ok(FEED)]);

        let fetch = FetchConfig {
            rate_limit_delay_secs: 0.0,
            ..FetchConfig::default()
        };
        let mut config = AppConfig::default();
        config.general.data_dir = data_dir;
        config.fetch = fetch.clone();

        let orchestrator = Arc::new(Orchestrator::new(fetch, mock.clone()));
        let sources = vec![SourceDescriptor::new("Wire", "usa").with_feed("https://wire.example.com/rss")];
        let service = SchedulerService::new(orchestrator, Arc::new(config), sources).with_formats(formats);
        (service, mock)
    }

    #[tokio::test]
    async fn test_first_cycle_runs_immediately_and_reports() {
        let dir = tempfile::tempdir().unwrap();
        let (service, mock) = service(dir.path().to_path_buf(), vec![ExportFormat::Sqlite]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(service.with_event_sender(tx).run(shutdown_rx));

        let first = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert!(matches!(first, SchedulerEvent::RunCompleted { articles: 1, failed_sources: 0, .. }));

        match timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap() {
            SchedulerEvent::Exported { format, written, location } => {
                assert_eq!(format, ExportFormat::Sqlite);
                assert_eq!(written, 1);
                assert_eq!(location, dir.path().join("news.db"));
            }
            other => panic!("unexpected event: {:?}", other),
        }

        let cleaned = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert!(matches!(cleaned, SchedulerEvent::ArticlesCleaned { deleted: 0 }));

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();
        assert_eq!(mock.calls_to("https://wire.example.com/rss"), 1);
    }

    #[test]
    fn test_huge_interval_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.general.data_dir = dir.path().to_path_buf();
        config.scheduler.interval_hours = u64::MAX;

        let orchestrator = Arc::new(Orchestrator::new(config.fetch.clone(), Arc::new(MockTransport::new())));
        let service = SchedulerService::new(orchestrator, Arc::new(config), Vec::new());
        assert_eq!(service.interval, Duration::from_secs(MAX_INTERVAL_HOURS * 3600));
    }

    #[tokio::test]
    async fn test_shutdown_stops_between_cycles() {
        let dir = tempfile::tempdir().unwrap();
        let (service, mock) = service(dir.path().to_path_buf(), Vec::new());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(
            service
                .with_interval(Duration::from_secs(3600))
                .with_event_sender(tx)
                .run(shutdown_rx),
        );

        let first = timeout(Duration::from_secs(5), rx.recv()).await.unwrap().unwrap();
        assert!(matches!(first, SchedulerEvent::RunCompleted { .. }));

        shutdown_tx.send(true).unwrap();
        timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

        // No export or cleanup events without sinks, and no second cycle
        assert!(rx.try_recv().is_err());
        assert_eq!(mock.calls_to("https://wire.example.com/rss"), 1);
    }
}
