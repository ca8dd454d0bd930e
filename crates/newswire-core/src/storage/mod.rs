mod article_repo;
mod database;
mod retry;
mod run_repo;

pub use article_repo::{ArticleQuery, ArticleRepository, StoredArticle};
pub use database::Database;
pub use retry::{is_transient_error, with_retry};
pub use run_repo::{RunRecord, RunRepository};
