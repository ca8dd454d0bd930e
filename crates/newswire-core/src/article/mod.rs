mod dedup;
mod models;

pub use dedup::{fingerprint, Deduplicator};
pub(crate) use models::CollectionBuilder;
pub use models::{Article, ArticleCandidate, ArticleCollection, Rejection, RunMetadata, SourceOutcome, SourceReport};
