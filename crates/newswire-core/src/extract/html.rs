use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::text::{clean_field, parse_date, resolve_link, MAX_AUTHOR_CHARS, MAX_SUMMARY_CHARS, MAX_TITLE_CHARS};
use crate::article::ArticleCandidate;
use crate::source::SourceDescriptor;
use crate::{Error, Result};

const IMAGE_ATTRS: &[&str] = &["src", "data-src", "data-lazy-src"];

/// Parsed form of a source's [`Selectors`](crate::source::Selectors)
#[derive(Debug, Clone)]
pub struct CompiledSelectors {
    article_list: Selector,
    headline: Selector,
    summary: Selector,
    link: Selector,
    author: Selector,
    date: Selector,
    image: Selector,
}

impl CompiledSelectors {
    pub fn compile(source: &SourceDescriptor) -> Result<Self> {
        let parse = |css: &str| {
            Selector::parse(css).map_err(|e| Error::InvalidSelector {
                source_name: source.name.clone(),
                selector: css.to_string(),
                reason: e.to_string(),
            })
        };

        let selectors = &source.selectors;
        Ok(Self {
            article_list: parse(&selectors.article_list)?,
            headline: parse(&selectors.headline)?,
            summary: parse(&selectors.summary)?,
            link: parse(&selectors.link)?,
            author: parse(&selectors.author)?,
            date: parse(&selectors.date)?,
            image: parse(&selectors.image)?,
        })
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

fn first_text(element: ElementRef<'_>, selector: &Selector, max_chars: usize) -> Option<String> {
    element
        .select(selector)
        .next()
        .and_then(|found| clean_field(Some(&element_text(found)), max_chars))
}

/// Apply the selectors to an article-list page
///
/// One candidate per `article_list` match, in document order. A selector that
/// matches nothing inside a container leaves that field absent.
pub fn extract_candidates(
    html: &str,
    selectors: &CompiledSelectors,
    base: Option<&Url>,
    now: DateTime<Utc>,
) -> Vec<ArticleCandidate> {
    let document = Html::parse_document(html);
    document
        .select(&selectors.article_list)
        .map(|container| candidate_from(container, selectors, base, now))
        .collect()
}

fn candidate_from(
    container: ElementRef<'_>,
    selectors: &CompiledSelectors,
    base: Option<&Url>,
    now: DateTime<Utc>,
) -> ArticleCandidate {
    let headline = container.select(&selectors.headline).next();

    // The container or the headline is often the anchor itself
    let url = container
        .select(&selectors.link)
        .find_map(|a| a.value().attr("href"))
        .or_else(|| headline.and_then(|h| h.value().attr("href")))
        .or_else(|| container.value().attr("href"))
        .and_then(|href| resolve_link(href, base));

    let author = first_text(container, &selectors.author, MAX_AUTHOR_CHARS).map(|a| {
        a.strip_prefix("By ")
            .or_else(|| a.strip_prefix("by "))
            .unwrap_or(&a)
            .trim()
            .to_string()
    });

    let published_at = container.select(&selectors.date).next().and_then(|found| {
        found
            .value()
            .attr("datetime")
            .and_then(|dt| parse_date(dt, now))
            .or_else(|| parse_date(&element_text(found), now))
    });

    let image_url = container.select(&selectors.image).next().and_then(|img| {
        IMAGE_ATTRS
            .iter()
            .find_map(|attr| img.value().attr(attr).filter(|v| !v.trim().is_empty()))
            .and_then(|src| resolve_link(src, base))
    });

    ArticleCandidate {
        title: headline.and_then(|h| clean_field(Some(&element_text(h)), MAX_TITLE_CHARS)),
        url,
        summary: first_text(container, &selectors.summary, MAX_SUMMARY_CHARS),
        author: author.filter(|a| !a.is_empty()),
        published_at,
        categories: Vec::new(),
        image_url,
    }
}
