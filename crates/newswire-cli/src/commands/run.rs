use std::path::Path;

use anyhow::Result;

use newswire_core::{
    scheduler::{export, ingest},
    ArticleCollection, AppConfig, ExportFormat, Orchestrator, SourceCatalog, SourceFilter, SourceOutcome,
};

use crate::RunArgs;

pub async fn run(config: &AppConfig, sources_file: Option<&Path>, args: &RunArgs, formats: &[ExportFormat]) -> Result<()> {
    let catalog = SourceCatalog::resolve(config, sources_file)?;
    let sources = catalog.select(&SourceFilter {
        region: args.region.clone(),
        name: args.source.clone(),
    })?;

    if sources.is_empty() {
        println!("No sources match the given filters.");
        return Ok(());
    }

    let enabled = sources.iter().filter(|s| s.enabled).count();
    println!("Ingesting {} sources...\n", enabled);

    let orchestrator = Orchestrator::from_config(&config.fetch)?;
    let collection = ingest(&orchestrator, &sources).await;

    print_summary(&collection);

    let reports = export(config, &collection, formats, args.output_dir.as_deref()).await?;
    if !reports.is_empty() {
        println!("\nExports:");
        for report in &reports {
            println!(
                "  {:<6} {} ({} written)",
                report.format.as_str(),
                report.location.display(),
                report.written
            );
        }
    }

    Ok(())
}

fn print_summary(collection: &ArticleCollection) {
    let metadata = collection.metadata();

    println!(
        "  {:<24} {:<7} {:>8} {:>6} {:>7} {:>9} {:>9}",
        "SOURCE", "REGION", "ARTICLES", "DUPES", "DROPPED", "TRANSIENT", "PERMANENT"
    );
    for report in &metadata.sources {
        let marker = match report.outcome {
            SourceOutcome::Ingested => "",
            SourceOutcome::Failed => "  [FAILED]",
        };
        println!(
            "  {:<24} {:<7} {:>8} {:>6} {:>7} {:>9} {:>9}{}",
            report.name,
            report.region,
            report.articles,
            report.duplicates,
            report.dropped,
            report.transient_failures,
            report.permanent_failures,
            marker
        );
        for error in &report.errors {
            println!("      {}", error);
        }
    }

    let elapsed = metadata.finished_at - metadata.started_at;
    println!(
        "\nRun {}: {} articles from {} sources ({} failed, {} duplicates) in {:.1}s",
        metadata.run_id,
        collection.len(),
        metadata.sources.len(),
        metadata.failed_sources(),
        metadata.total_duplicates(),
        elapsed.num_milliseconds() as f64 / 1000.0
    );
}
