mod catalog;
mod models;

pub use catalog::{SourceCatalog, SourceFilter};
pub use models::{Selectors, SourceDescriptor};
