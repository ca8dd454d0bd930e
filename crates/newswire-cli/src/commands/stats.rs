use anyhow::Result;

use newswire_core::{
    storage::{ArticleRepository, Database, RunRecord, RunRepository},
    AppConfig,
};

pub async fn run(config: &AppConfig, runs: u32) -> Result<()> {
    let db = Database::open(&config.database_path()).await?;
    let loaded = load(&db, runs).await;
    db.close().await;
    let (total, records, latest) = loaded?;

    println!("Stored articles: {}", total);

    if records.is_empty() {
        println!("No runs recorded yet.");
        return Ok(());
    }

    println!("\nRecent runs:");
    for run in &records {
        println!(
            "  {}  {}  {} sources ({} failed)  {} collected, {} stored, {} duplicates",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.run_id,
            run.sources_total,
            run.sources_failed,
            run.articles_collected,
            run.articles_stored,
            run.duplicates
        );
    }

    println!("\nLatest run by source:");
    for report in &latest {
        let field = |key: &str| report.get(key).and_then(|v| v.as_str()).unwrap_or("?").to_string();
        let articles = report.get("articles").and_then(|v| v.as_u64()).unwrap_or(0);
        println!(
            "  {:<24} {:<7} {:<8} {:>4} articles",
            field("name"),
            field("region"),
            field("outcome"),
            articles
        );
    }

    Ok(())
}

async fn load(
    db: &Database,
    runs: u32,
) -> newswire_core::Result<(i64, Vec<RunRecord>, Vec<serde_json::Value>)> {
    let total = ArticleRepository::new(db).count().await?;
    let run_repo = RunRepository::new(db);
    let records = run_repo.list_recent(runs.max(1)).await?;
    let latest = match records.first() {
        Some(run) => run_repo.source_reports(&run.run_id).await?,
        None => Vec::new(),
    };
    Ok((total, records, latest))
}
