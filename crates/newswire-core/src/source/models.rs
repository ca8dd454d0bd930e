use serde::{Deserialize, Serialize};
use url::Url;

/// A publisher the ingestion run reads from. Immutable for the duration of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDescriptor {
    pub name: String,
    pub region: String,
    /// Structured feed (RSS/Atom/JSON Feed), tried first
    #[serde(default)]
    pub feed_url: Option<String>,
    /// Article-list page scraped when the feed is absent or unusable
    #[serde(default)]
    pub page_url: Option<String>,
    /// Categories assigned to articles that carry none of their own
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub selectors: Selectors,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// CSS selectors for the HTML fallback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selectors {
    /// Repeating container, one match per article
    #[serde(default = "default_article_list")]
    pub article_list: String,
    #[serde(default = "default_headline")]
    pub headline: String,
    #[serde(default = "default_summary")]
    pub summary: String,
    #[serde(default = "default_link")]
    pub link: String,
    #[serde(default = "default_author")]
    pub author: String,
    #[serde(default = "default_date")]
    pub date: String,
    #[serde(default = "default_image")]
    pub image: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            article_list: default_article_list(),
            headline: default_headline(),
            summary: default_summary(),
            link: default_link(),
            author: default_author(),
            date: default_date(),
            image: default_image(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_article_list() -> String {
    "article".to_string()
}

fn default_headline() -> String {
    "h2".to_string()
}

fn default_summary() -> String {
    "p".to_string()
}

fn default_link() -> String {
    "a".to_string()
}

fn default_author() -> String {
    ".author".to_string()
}

fn default_date() -> String {
    "time".to_string()
}

fn default_image() -> String {
    "img".to_string()
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl SourceDescriptor {
    pub fn new(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: region.into(),
            feed_url: None,
            page_url: None,
            categories: Vec::new(),
            selectors: Selectors::default(),
            enabled: true,
        }
    }

    pub fn with_feed(mut self, url: impl Into<String>) -> Self {
        self.feed_url = Some(url.into());
        self
    }

    pub fn with_page(mut self, url: impl Into<String>) -> Self {
        self.page_url = Some(url.into());
        self
    }

    pub fn with_categories(mut self, categories: Vec<String>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_selectors(mut self, selectors: Selectors) -> Self {
        self.selectors = selectors;
        self
    }

    pub fn feed_target(&self) -> Option<&str> {
        non_empty(&self.feed_url)
    }

    pub fn page_target(&self) -> Option<&str> {
        non_empty(&self.page_url)
    }

    /// Base for resolving relative links: the page URL, else the feed URL
    pub fn base_url(&self) -> Option<Url> {
        self.page_target()
            .or_else(|| self.feed_target())
            .and_then(|u| Url::parse(u).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_selectors_fall_back_to_defaults() {
        let source: SourceDescriptor = toml::from_str(
            r#"
            name = "Example"
            region = "usa"
            page_url = "https://example.com/news"
            [selectors]
            headline = ".title"
            "#,
        )
        .unwrap();

        assert_eq!(source.selectors.headline, ".title");
        assert_eq!(source.selectors.article_list, "article");
        assert_eq!(source.selectors.image, "img");
        assert!(source.enabled);
    }

    #[test]
    fn test_blank_urls_are_not_targets() {
        let source = SourceDescriptor::new("Example", "usa")
            .with_feed("   ")
            .with_page("https://example.com/");

        assert_eq!(source.feed_target(), None);
        assert_eq!(source.page_target(), Some("https://example.com/"));
    }

    #[test]
    fn test_base_url_prefers_page() {
        let source = SourceDescriptor::new("Example", "usa")
            .with_feed("https://feeds.example.com/rss")
            .with_page("https://www.example.com/news/");
        assert_eq!(
            source.base_url().unwrap().as_str(),
            "https://www.example.com/news/"
        );

        let feed_only = SourceDescriptor::new("Example", "usa").with_feed("https://feeds.example.com/rss");
        assert_eq!(feed_only.base_url().unwrap().host_str(), Some("feeds.example.com"));
    }
}
