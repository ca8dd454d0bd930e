use feed_rs::model::Entry;
use feed_rs::parser::{self, ParseFeedError};
use scraper::{Html, Selector};
use url::Url;

use super::text::{
    clean_field, html_to_text, resolve_link, MAX_AUTHOR_CHARS, MAX_SUMMARY_CHARS, MAX_TITLE_CHARS,
};
use crate::article::ArticleCandidate;

/// Parse RSS/Atom/JSON Feed bytes into candidates, in feed order
pub fn parse_entries(content: &[u8], base: Option<&Url>) -> std::result::Result<Vec<ArticleCandidate>, ParseFeedError> {
    let feed = parser::parse(content)?;
    Ok(feed
        .entries
        .into_iter()
        .map(|entry| candidate_from(entry, base))
        .collect())
}

fn candidate_from(entry: Entry, base: Option<&Url>) -> ArticleCandidate {
    let url = entry
        .links
        .iter()
        .find(|l| l.rel.as_deref().map_or(true, |rel| rel == "alternate"))
        .or_else(|| entry.links.first())
        .and_then(|l| resolve_link(&l.href, base))
        // RSS guids are often permalinks
        .or_else(|| {
            entry
                .id
                .starts_with("http")
                .then(|| resolve_link(&entry.id, base))
                .flatten()
        });

    let title = entry
        .title
        .as_ref()
        .and_then(|t| clean_field(Some(&html_to_text(&t.content)), MAX_TITLE_CHARS));

    let body = entry
        .summary
        .as_ref()
        .map(|s| s.content.clone())
        .or_else(|| entry.content.as_ref().and_then(|c| c.body.clone()));

    let summary = body
        .as_deref()
        .and_then(|b| clean_field(Some(&html_to_text(b)), MAX_SUMMARY_CHARS));

    let author = entry
        .authors
        .first()
        .and_then(|a| clean_field(Some(&a.name), MAX_AUTHOR_CHARS));

    let categories = entry
        .categories
        .iter()
        .map(|c| c.label.clone().unwrap_or_else(|| c.term.clone()))
        .collect();

    let image_url = entry
        .media
        .iter()
        .flat_map(|m| m.thumbnails.iter())
        .map(|t| t.image.uri.clone())
        .next()
        .or_else(|| {
            entry
                .media
                .iter()
                .flat_map(|m| m.content.iter())
                .find_map(|c| c.url.as_ref().map(|u| u.to_string()))
        })
        .or_else(|| body.as_deref().and_then(first_image))
        .and_then(|src| resolve_link(&src, base));

    ArticleCandidate {
        title,
        url,
        summary,
        author,
        published_at: entry.published.or(entry.updated),
        categories,
        image_url,
    }
}

/// First non-tracking `<img>` in an HTML fragment
fn first_image(html: &str) -> Option<String> {
    if !html.contains("<img") {
        return None;
    }
    let selector = Selector::parse("img[src]").ok()?;
    let fragment = Html::parse_fragment(html);
    let src = fragment
        .select(&selector)
        .filter_map(|img| img.value().attr("src"))
        .find(|src| !src.contains("1x1") && !src.contains("pixel") && !src.contains("tracking"))?;
    Some(src.to_string())
}
