pub mod article;
pub mod config;
pub mod error;
pub mod export;
pub mod extract;
pub mod fetch;
pub mod ingest;
pub mod scheduler;
pub mod source;
pub mod storage;

pub use article::{Article, ArticleCollection, RunMetadata, SourceOutcome, SourceReport};
pub use config::AppConfig;
pub use error::{Error, Result};
pub use export::{ExportFormat, ExportReport};
pub use ingest::Orchestrator;
pub use source::{SourceCatalog, SourceDescriptor, SourceFilter};
