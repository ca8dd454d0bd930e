use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::watch;
use tracing::info;

use newswire_core::{scheduler::SchedulerService, AppConfig, Orchestrator, SourceCatalog};

pub async fn run(mut config: AppConfig, sources_file: Option<&Path>, hours: Option<u64>) -> Result<()> {
    let catalog = SourceCatalog::resolve(&config, sources_file)?;
    if let Some(hours) = hours {
        config.scheduler.interval_hours = hours;
    }
    let interval = config.scheduler.interval();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        let _ = shutdown_tx.send(true);
    });

    let orchestrator = Arc::new(Orchestrator::from_config(&config.fetch)?);
    let config = Arc::new(config);
    let scheduler = SchedulerService::new(orchestrator, config.clone(), catalog.sources().to_vec());

    println!(
        "Scheduler started, running every {} hour(s). Press Ctrl+C to stop.",
        interval.as_secs() / 3600
    );
    println!("  Sources: {}", catalog.enabled().count());
    println!("  Formats: {:?}", config.export.formats);

    scheduler.run(shutdown_rx).await;

    println!("Scheduler stopped.");
    Ok(())
}
