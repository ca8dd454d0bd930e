use anyhow::Result;

use newswire_core::{
    storage::{ArticleQuery, ArticleRepository, Database, StoredArticle},
    AppConfig,
};

pub async fn run(config: &AppConfig, query: ArticleQuery) -> Result<()> {
    let db = Database::open(&config.database_path()).await?;
    let listed = load(&db, &query).await;
    db.close().await;
    let (total, articles) = listed?;

    if articles.is_empty() {
        println!("No stored articles match.");
        return Ok(());
    }

    println!("Showing {} of {} stored articles:\n", articles.len(), total);
    for article in &articles {
        let published = article
            .published_at
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("[{}] {} ({}, {})", published, article.title, article.source_name, article.region);
        println!("    {}", article.url);
    }

    Ok(())
}

async fn load(db: &Database, query: &ArticleQuery) -> newswire_core::Result<(i64, Vec<StoredArticle>)> {
    let repo = ArticleRepository::new(db);
    let total = repo.count().await?;
    let articles = repo.list_recent(query).await?;
    Ok((total, articles))
}
