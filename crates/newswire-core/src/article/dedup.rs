use std::collections::HashSet;

use sha2::{Digest, Sha256};

use super::models::Article;

fn normalize_url(url: &str) -> String {
    url.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .trim_end_matches('/')
        .to_string()
}

/// Stable digest of the normalized (URL, title) pair
///
/// The URL is lowercased, whitespace-collapsed and stripped of trailing
/// slashes; the title is lowercased. Two stories that differ only in title
/// casing share a fingerprint.
pub fn fingerprint(url: &str, title: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_url(url).as_bytes());
    hasher.update(b"|");
    hasher.update(title.trim().to_lowercase().as_bytes());
    hex::encode(hasher.finalize())
}

/// Run-scoped seen-set of fingerprints
#[derive(Debug, Default)]
pub struct Deduplicator {
    seen: HashSet<String>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the article and return true if its fingerprint is new this run
    pub fn admit(&mut self, article: &Article) -> bool {
        self.admit_fingerprint(article.fingerprint())
    }

    pub fn admit_fingerprint(&mut self, fingerprint: &str) -> bool {
        if self.seen.contains(fingerprint) {
            return false;
        }
        self.seen.insert(fingerprint.to_string())
    }

    pub fn contains(&self, fingerprint: &str) -> bool {
        self.seen.contains(fingerprint)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::article::ArticleCandidate;
    use crate::source::SourceDescriptor;

    fn article(url: &str, title: &str) -> Article {
        let source = SourceDescriptor::new("Daily", "usa");
        Article::from_candidate(
            ArticleCandidate {
                title: Some(title.to_string()),
                url: Some(url.to_string()),
                ..Default::default()
            },
            &source,
        )
        .unwrap()
    }

    #[test]
    fn test_fingerprint_is_stable_hex_sha256() {
        let fp = fingerprint("https://example.com/a", "Title");
        assert_eq!(fp.len(), 64);
        assert!(fp.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(fp, fingerprint("https://example.com/a", "Title"));
    }

    #[test]
    fn test_fingerprint_normalizes_url_and_title_case() {
        let base = fingerprint("https://example.com/story", "Markets Rally");
        assert_eq!(base, fingerprint("HTTPS://Example.com/story/", "markets rally"));
        assert_eq!(base, fingerprint("  https://example.com/story//", "MARKETS RALLY"));
        assert_ne!(base, fingerprint("https://example.com/story", "Markets Fall"));
        assert_ne!(base, fingerprint("https://example.com/other", "Markets Rally"));
    }

    #[test]
    fn test_admit_is_idempotent() {
        let mut dedup = Deduplicator::new();
        let a = article("https://example.com/a", "Story A");

        assert!(dedup.admit(&a));
        assert!(!dedup.admit(&a));
        assert!(!dedup.admit(&a));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_title_casing_variants_are_duplicates() {
        let mut dedup = Deduplicator::new();

        assert!(dedup.admit(&article("https://example.com/a", "Breaking News")));
        assert!(!dedup.admit(&article("https://example.com/a/", "breaking news")));
        assert!(dedup.admit(&article("https://example.com/b", "Breaking News")));
    }
}
