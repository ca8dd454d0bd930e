use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::retry::with_retry;
use super::Database;
use crate::article::Article;
use crate::Result;

/// An article as persisted by the SQLite sink
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredArticle {
    pub id: i64,
    pub fingerprint: String,
    pub title: String,
    pub url: String,
    pub summary: Option<String>,
    pub author: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub source_name: String,
    pub region: String,
    pub categories: Vec<String>,
    pub image_url: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ArticleRow {
    id: i64,
    fingerprint: String,
    title: String,
    url: String,
    summary: Option<String>,
    author: Option<String>,
    published_at: Option<DateTime<Utc>>,
    source_name: String,
    region: String,
    categories: String,
    image_url: Option<String>,
    scraped_at: DateTime<Utc>,
}

impl From<ArticleRow> for StoredArticle {
    fn from(row: ArticleRow) -> Self {
        StoredArticle {
            id: row.id,
            fingerprint: row.fingerprint,
            title: row.title,
            url: row.url,
            summary: row.summary,
            author: row.author,
            published_at: row.published_at,
            source_name: row.source_name,
            region: row.region,
            categories: serde_json::from_str(&row.categories).unwrap_or_default(),
            image_url: row.image_url,
            scraped_at: row.scraped_at,
        }
    }
}

/// Optional narrowing for [`ArticleRepository::list_recent`]
#[derive(Debug, Clone, Default)]
pub struct ArticleQuery {
    pub region: Option<String>,
    pub source_name: Option<String>,
    pub limit: u32,
}

/// Repository for stored articles
pub struct ArticleRepository<'a> {
    db: &'a Database,
}

impl<'a> ArticleRepository<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Insert one article unless its fingerprint is already stored
    ///
    /// Returns true when a row was written.
    pub async fn insert(&self, article: &Article, run_id: Uuid) -> Result<bool> {
        let pool = self.db.pool();
        let categories = serde_json::to_string(article.categories())?;
        let run_id = run_id.to_string();
        let scraped_at = Utc::now();

        let result = with_retry(|| {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO articles
                (fingerprint, title, url, summary, author, published_at, source_name, region,
                 categories, image_url, run_id, scraped_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(article.fingerprint())
            .bind(article.title())
            .bind(article.url())
            .bind(article.summary())
            .bind(article.author())
            .bind(article.published_at())
            .bind(article.source_name())
            .bind(article.region())
            .bind(&categories)
            .bind(article.image_url())
            .bind(&run_id)
            .bind(scraped_at)
            .execute(pool)
        })
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Insert many articles, returning how many were new
    pub async fn insert_many(&self, articles: &[Article], run_id: Uuid) -> Result<u32> {
        let mut inserted = 0;

        for article in articles {
            if self.insert(article, run_id).await? {
                inserted += 1;
            }
        }

        Ok(inserted)
    }

    pub async fn count(&self) -> Result<i64> {
        let pool = self.db.pool();
        let count = with_retry(|| sqlx::query_scalar("SELECT COUNT(*) FROM articles").fetch_one(pool)).await?;
        Ok(count)
    }

    /// Most recently published first, optionally narrowed by region and source
    pub async fn list_recent(&self, query: &ArticleQuery) -> Result<Vec<StoredArticle>> {
        let pool = self.db.pool();
        let limit = if query.limit == 0 { 100 } else { query.limit };

        let rows: Vec<ArticleRow> = with_retry(|| {
            sqlx::query_as(
                r#"
                SELECT id, fingerprint, title, url, summary, author, published_at,
                       source_name, region, categories, image_url, scraped_at
                FROM articles
                WHERE (? IS NULL OR region = ? COLLATE NOCASE)
                  AND (? IS NULL OR source_name = ? COLLATE NOCASE)
                ORDER BY COALESCE(published_at, scraped_at) DESC, id DESC
                LIMIT ?
                "#,
            )
            .bind(query.region.as_deref())
            .bind(query.region.as_deref())
            .bind(query.source_name.as_deref())
            .bind(query.source_name.as_deref())
            .bind(limit)
            .fetch_all(pool)
        })
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Delete articles stored more than `retention_days` ago
    pub async fn cleanup_old_articles(&self, retention_days: u32) -> Result<u32> {
        let cutoff = Utc::now() - Duration::days(retention_days as i64);
        let pool = self.db.pool();

        let result = with_retry(|| {
            sqlx::query("DELETE FROM articles WHERE scraped_at < ?")
                .bind(cutoff)
                .execute(pool)
        })
        .await?;

        Ok(result.rows_affected() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::ArticleCandidate;
    use crate::source::SourceDescriptor;
    use chrono::TimeZone;

    fn article(source: &SourceDescriptor, title: &str, path: &str, day: u32) -> Article {
        Article::from_candidate(
            ArticleCandidate {
                title: Some(title.to_string()),
                url: Some(format!("https://news.example.com{}", path)),
                published_at: Some(Utc.with_ymd_and_hms(2024, 3, day, 9, 0, 0).unwrap()),
                categories: vec!["Politics".to_string()],
                ..Default::default()
            },
            source,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_ignores_known_fingerprints() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = ArticleRepository::new(&db);
        let source = SourceDescriptor::new("Nation", "kenya");
        let articles = vec![article(&source, "A", "/a", 1), article(&source, "B", "/b", 2)];

        assert_eq!(repo.insert_many(&articles, Uuid::new_v4()).await.unwrap(), 2);
        // A later run re-exporting the same stories adds nothing
        assert_eq!(repo.insert_many(&articles, Uuid::new_v4()).await.unwrap(), 0);
        assert_eq!(repo.count().await.unwrap(), 2);
        let stored = repo.list_recent(&ArticleQuery::default()).await.unwrap();
        assert!(stored.iter().any(|a| a.fingerprint == articles[0].fingerprint()));
    }

    #[tokio::test]
    async fn test_list_recent_filters_and_orders() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = ArticleRepository::new(&db);
        let nation = SourceDescriptor::new("Nation", "kenya");
        let npr = SourceDescriptor::new("NPR", "usa");

        let articles = vec![
            article(&nation, "Old", "/old", 1),
            article(&nation, "New", "/new", 5),
            article(&npr, "US", "/us", 3),
        ];
        repo.insert_many(&articles, Uuid::new_v4()).await.unwrap();

        let kenya = repo
            .list_recent(&ArticleQuery {
                region: Some("KENYA".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        let titles: Vec<&str> = kenya.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["New", "Old"]);
        assert_eq!(kenya[0].categories, vec!["Politics"]);

        let npr_only = repo
            .list_recent(&ArticleQuery {
                source_name: Some("npr".to_string()),
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(npr_only.len(), 1);
        assert_eq!(npr_only[0].region, "usa");
    }

    #[tokio::test]
    async fn test_cleanup_removes_only_expired_rows() {
        let db = Database::new_in_memory().await.unwrap();
        let repo = ArticleRepository::new(&db);
        let source = SourceDescriptor::new("Nation", "kenya");
        repo.insert_many(&[article(&source, "Fresh", "/fresh", 1)], Uuid::new_v4())
            .await
            .unwrap();

        sqlx::query("UPDATE articles SET scraped_at = ?")
            .bind(Utc::now() - Duration::days(40))
            .execute(db.pool())
            .await
            .unwrap();
        repo.insert_many(&[article(&source, "Recent", "/recent", 2)], Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(repo.cleanup_old_articles(30).await.unwrap(), 1);
        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
