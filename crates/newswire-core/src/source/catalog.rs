use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;

use super::models::SourceDescriptor;
use crate::config::AppConfig;
use crate::extract::CompiledSelectors;
use crate::{Error, Result};

const BUILTIN_SOURCES: &str = include_str!("../../sources.toml");

#[derive(Deserialize)]
struct CatalogFile {
    #[serde(default)]
    sources: Vec<SourceDescriptor>,
}

/// Narrows a catalog to one region and/or one source name
#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
    pub region: Option<String>,
    pub name: Option<String>,
}

impl SourceFilter {
    fn matches(&self, source: &SourceDescriptor) -> bool {
        let region_ok = self
            .region
            .as_deref()
            .map_or(true, |r| source.region.eq_ignore_ascii_case(r.trim()));
        let name_ok = self
            .name
            .as_deref()
            .map_or(true, |n| source.name.eq_ignore_ascii_case(n.trim()));
        region_ok && name_ok
    }
}

/// Validated, ordered set of source descriptors
#[derive(Debug, Clone)]
pub struct SourceCatalog {
    sources: Vec<SourceDescriptor>,
}

impl SourceCatalog {
    /// Normalize and validate descriptors; order is preserved
    pub fn new(sources: Vec<SourceDescriptor>) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut normalized = Vec::with_capacity(sources.len());

        for mut source in sources {
            source.name = source.name.trim().to_string();
            source.region = source.region.trim().to_lowercase();

            if source.name.is_empty() {
                return Err(Error::Config("source with empty name".to_string()));
            }
            if source.region.is_empty() {
                return Err(Error::Config(format!(
                    "source '{}' has an empty region",
                    source.name
                )));
            }
            if !seen.insert(source.name.to_lowercase()) {
                return Err(Error::DuplicateSource(source.name));
            }

            // Blank strings mean "not configured"
            if source.feed_target().is_none() {
                source.feed_url = None;
            }
            if source.page_target().is_none() {
                source.page_url = None;
            }

            CompiledSelectors::compile(&source)?;
            normalized.push(source);
        }

        Ok(Self { sources: normalized })
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogFile =
            toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        Self::new(file.sources)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Publisher catalog shipped with the binary
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_SOURCES)
    }

    /// Pick the catalog for a run: explicit file, then config, then built-in
    pub fn resolve(config: &AppConfig, sources_file: Option<&Path>) -> Result<Self> {
        if let Some(path) = sources_file {
            tracing::info!("Loading sources from {}", path.display());
            return Self::load(path);
        }
        if !config.sources.is_empty() {
            return Self::new(config.sources.clone());
        }
        Self::builtin()
    }

    pub fn sources(&self) -> &[SourceDescriptor] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn enabled(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.iter().filter(|s| s.enabled)
    }

    /// Regions in first-seen order
    pub fn regions(&self) -> Vec<&str> {
        let mut regions: Vec<&str> = Vec::new();
        for source in &self.sources {
            if !regions.contains(&source.region.as_str()) {
                regions.push(&source.region);
            }
        }
        regions
    }

    pub fn by_region<'a>(&'a self, region: &'a str) -> impl Iterator<Item = &'a SourceDescriptor> {
        self.sources
            .iter()
            .filter(move |s| s.region.eq_ignore_ascii_case(region))
    }

    pub fn find(&self, name: &str) -> Option<&SourceDescriptor> {
        self.sources
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name.trim()))
    }

    /// Descriptors matching the filter, in catalog order
    pub fn select(&self, filter: &SourceFilter) -> Result<Vec<SourceDescriptor>> {
        if let Some(name) = filter.name.as_deref() {
            if self.find(name).is_none() {
                return Err(Error::SourceNotFound(name.to_string()));
            }
        }

        Ok(self
            .sources
            .iter()
            .filter(|s| filter.matches(s))
            .cloned()
            .collect())
    }
}
