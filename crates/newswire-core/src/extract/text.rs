//! Text, date and link normalization shared by the feed and HTML extractors.

use std::sync::LazyLock;

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use url::Url;

pub const MAX_TITLE_CHARS: usize = 500;
pub const MAX_SUMMARY_CHARS: usize = 2000;
pub const MAX_AUTHOR_CHARS: usize = 200;

static BOILERPLATE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)\s*\[\s*(?:\.{2,3}|…)\s*\]",
        r"(?i)\s*\b(?:read more|continue reading|click here)\b\.?",
        r"(?i)\s*\bshare this\b:?\s*",
        r"(?i)^\s*advertisement\s*$",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

// Markup the plain-text renderer leaves behind: footnote links and emphasis
static RENDER_ARTIFACTS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?m)^\s*\[\d+\]:\s*\S*\s*$", ""),
        (r"\[([^\]\[]*)\]\[\d+\]", "$1"),
        (r"\*\*?([^*\n]+?)\*\*?", "$1"),
        (r"\[\s*\]", ""),
    ]
    .iter()
    .filter_map(|(p, r)| Regex::new(p).ok().map(|re| (re, *r)))
    .collect()
});

static RELATIVE_DATE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d+)\s*(minute|min|hour|hr|day|week)s?\s+ago").ok()
});

static NON_ARTICLE_PATH: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)/(?:tag|tags|category|author)/|/(?:search|login|register|subscribe|advertisement)(?:/|$)|\.(?:pdf|jpe?g|png|gif)$",
    )
    .ok()
});

const ENTITIES: &[(&str, &str)] = &[
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&#39;", "'"),
    ("&#039;", "'"),
    ("&apos;", "'"),
    ("&mdash;", "\u{2014}"),
    ("&ndash;", "\u{2013}"),
    // Must stay last so "&amp;lt;" decodes once
    ("&amp;", "&"),
];

const ZONED_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S%z",
    "%Y-%m-%d %H:%M:%S %z",
    "%a, %d %b %Y %H:%M:%S %z",
];

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%B %d, %Y %I:%M %p",
    "%b %d, %Y %I:%M %p",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d %B %Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %b %Y",
    "%A, %B %d, %Y",
    "%d/%m/%Y",
    "%m/%d/%Y",
    "%d-%m-%Y",
];

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse whitespace, strip teaser boilerplate and decode common entities
pub fn clean_text(text: &str) -> String {
    let mut cleaned = collapse_whitespace(text);

    for pattern in BOILERPLATE.iter() {
        cleaned = pattern.replace_all(&cleaned, "").into_owned();
    }

    for (entity, replacement) in ENTITIES {
        if cleaned.contains(entity) {
            cleaned = cleaned.replace(entity, replacement);
        }
    }

    collapse_whitespace(&cleaned)
}

/// Truncate to at most `max_chars` characters, ending with an ellipsis when cut
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let kept: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{}...", kept.trim_end())
}

/// Clean a field and drop it when nothing is left
pub fn clean_field(text: Option<&str>, max_chars: usize) -> Option<String> {
    text.map(clean_text)
        .filter(|t| !t.is_empty())
        .map(|t| truncate_chars(&t, max_chars))
}

/// Convert HTML content to plain text
pub fn html_to_text(html: &str) -> String {
    if !html.contains('<') {
        return html.to_string();
    }
    let mut text = html2text::from_read(html.as_bytes(), 10_000).unwrap_or_else(|_| html.to_string());
    for (pattern, replacement) in RENDER_ARTIFACTS.iter() {
        text = pattern.replace_all(&text, *replacement).into_owned();
    }
    text
}

/// Parse the many date shapes publishers emit; naive values are taken as UTC
pub fn parse_date(raw: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = collapse_whitespace(raw);
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(&text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(&text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ZONED_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(&text, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&text, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&text, fmt) {
            return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
        }
    }

    parse_relative_date(&text, now)
}

fn parse_relative_date(text: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let lower = text.to_lowercase();

    if let Some(caps) = RELATIVE_DATE.as_ref().and_then(|re| re.captures(&lower)) {
        let amount: i64 = caps.get(1)?.as_str().parse().ok()?;
        let delta = match caps.get(2)?.as_str() {
            "minute" | "min" => Duration::try_minutes(amount)?,
            "hour" | "hr" => Duration::try_hours(amount)?,
            "day" => Duration::try_days(amount)?,
            "week" => Duration::try_weeks(amount)?,
            _ => return None,
        };
        return now.checked_sub_signed(delta);
    }

    let midnight = |dt: DateTime<Utc>| dt.date_naive().and_hms_opt(0, 0, 0).map(|d| d.and_utc());

    if lower.contains("just now") {
        Some(now)
    } else if lower.contains("yesterday") {
        midnight(now - Duration::days(1))
    } else if lower.contains("today") {
        midnight(now)
    } else {
        None
    }
}

/// Resolve a possibly relative link against the source base; only http(s) survives
pub fn resolve_link(href: &str, base: Option<&Url>) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let resolved = match Url::parse(href) {
        Ok(url) => url,
        Err(url::ParseError::RelativeUrlWithoutBase) => base?.join(href).ok()?,
        Err(_) => return None,
    };

    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}

/// Reject links that point at listing pages or media rather than stories
pub fn is_article_url(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") || parsed.host_str().is_none() {
        return false;
    }

    NON_ARTICLE_PATH
        .as_ref()
        .map_or(true, |re| !re.is_match(parsed.path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 12, 30, 0).unwrap()
    }

    #[test]
    fn test_clean_text_collapses_and_strips_boilerplate() {
        assert_eq!(
            clean_text("  Markets   rally\n\tagain [...] Read more."),
            "Markets rally again"
        );
        assert_eq!(clean_text("Tom &amp; Jerry&nbsp;return"), "Tom & Jerry return");
        assert_eq!(clean_text("&amp;lt;b&amp;gt;"), "&lt;b&gt;");
        assert_eq!(clean_text("   "), "");
    }

    #[test]
    fn test_html_to_text_strips_markup() {
        let text = clean_text(&html_to_text("<p>The bank <b>held</b> rates.</p>"));
        assert_eq!(text, "The bank held rates.");
        assert_eq!(html_to_text("plain words"), "plain words");
    }

    #[test]
    fn test_truncate_chars_respects_char_boundaries() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("ééééééééééé", 6), "ééé...");
    }

    #[test]
    fn test_clean_field_drops_empty() {
        assert_eq!(clean_field(Some("  \n "), 100), None);
        assert_eq!(clean_field(None, 100), None);
        assert_eq!(clean_field(Some(" By  Jane Doe "), 100).as_deref(), Some("By Jane Doe"));
    }

    #[test]
    fn test_parse_date_standard_formats() {
        let now = fixed_now();
        let expected = Utc.with_ymd_and_hms(2024, 3, 14, 8, 0, 0).unwrap();

        assert_eq!(parse_date("2024-03-14T08:00:00Z", now), Some(expected));
        assert_eq!(parse_date("2024-03-14T11:00:00+03:00", now), Some(expected));
        assert_eq!(parse_date("Thu, 14 Mar 2024 08:00:00 +0000", now), Some(expected));
        assert_eq!(parse_date("2024-03-14 08:00:00", now), Some(expected));
        assert_eq!(
            parse_date("March 14, 2024", now),
            Some(Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_date_relative_forms() {
        let now = fixed_now();
        assert_eq!(
            parse_date("3 hours ago", now),
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 9, 30, 0).unwrap())
        );
        assert_eq!(
            parse_date("Updated 45 mins ago", now),
            Some(Utc.with_ymd_and_hms(2024, 3, 15, 11, 45, 0).unwrap())
        );
        assert_eq!(parse_date("Just now", now), Some(now));
        assert_eq!(
            parse_date("Yesterday", now),
            Some(Utc.with_ymd_and_hms(2024, 3, 14, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_date_garbage_is_absent() {
        assert_eq!(parse_date("sometime soon", fixed_now()), None);
        assert_eq!(parse_date("", fixed_now()), None);
    }

    #[test]
    fn test_resolve_link() {
        let base = Url::parse("https://news.example.com/kenya/").unwrap();

        assert_eq!(
            resolve_link("/story/1", Some(&base)).as_deref(),
            Some("https://news.example.com/story/1")
        );
        assert_eq!(
            resolve_link("politics/2", Some(&base)).as_deref(),
            Some("https://news.example.com/kenya/politics/2")
        );
        assert_eq!(
            resolve_link("https://other.example.org/a", Some(&base)).as_deref(),
            Some("https://other.example.org/a")
        );
        assert_eq!(resolve_link("/story/1", None), None);
        assert_eq!(resolve_link("#top", Some(&base)), None);
        assert_eq!(resolve_link("javascript:void(0)", Some(&base)), None);
        assert_eq!(resolve_link("mailto:desk@example.com", Some(&base)), None);
    }

    #[test]
    fn test_is_article_url() {
        assert!(is_article_url("https://example.com/2024/03/14/markets-rally"));
        assert!(is_article_url("http://example.com/news/subscribers-grow"));
        assert!(!is_article_url("https://example.com/tag/politics/"));
        assert!(!is_article_url("https://example.com/category/sport/"));
        assert!(!is_article_url("https://example.com/subscribe"));
        assert!(!is_article_url("https://example.com/files/report.pdf"));
        assert!(!is_article_url("ftp://example.com/story"));
        assert!(!is_article_url("not a url"));
    }
}
