mod feed;
mod html;
mod strategy;
pub mod text;

pub use feed::parse_entries;
pub use html::{extract_candidates, CompiledSelectors};
pub use strategy::{Extraction, ExtractionPath, ExtractionPlan, Extractor, PathFailure};
