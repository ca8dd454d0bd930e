use anyhow::Result;

use newswire_core::{scheduler::cleanup_old_articles, storage::Database, AppConfig};

pub async fn run(config: &AppConfig, days: Option<u32>) -> Result<()> {
    let retention_days = days.unwrap_or(config.scheduler.retention_days);
    println!("Cleaning up articles older than {} days...", retention_days);

    let db = Database::open(&config.database_path()).await?;
    let deleted = cleanup_old_articles(&db, retention_days).await;
    db.close().await;

    match deleted? {
        0 => println!("No articles to clean up."),
        deleted => println!("Deleted {} old articles.", deleted),
    }

    Ok(())
}
