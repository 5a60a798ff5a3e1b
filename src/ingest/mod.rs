// src/ingest/mod.rs
pub mod fetcher;
pub mod providers;
pub mod types;

use metrics::{describe_counter, describe_gauge};
use once_cell::sync::OnceCell;
use std::collections::HashSet;

pub use fetcher::NewsFetcher;
pub use types::{Category, NewsItem, PrimarySource, SourceProvider};

/// URL fragments that mark redirect, consent and login pages.
pub const INVALID_URL_PATTERNS: &[&str] = &[
    "consent.yahoo.com",
    "consent.google.com",
    "removed.com",
    "[Removed]",
    "login?",
    "signin?",
];

/// One-time metrics registration (so series show up on /metrics).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_items_total", "Eligible items returned per source.");
        describe_counter!(
            "ingest_provider_errors_total",
            "Source fetch/parse errors (isolated per source)."
        );
        describe_counter!(
            "ingest_used_filtered_total",
            "Items dropped because their URL is already in the used set."
        );
        describe_gauge!("used_set_size", "URLs currently in the used set.");
    });
}

/// Normalize feed text: decode entities, strip tags, ASCII quotes, collapse
/// whitespace, then cap at `max_chars` characters.
pub fn clean_text(s: &str, max_chars: usize) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize “ ” ‘ ’ « » to ASCII quotes
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    // 5) Length cap
    if out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect();
    }

    out
}

/// Absolute http(s) URL that is not on the deny-list.
pub fn is_valid_url(url: &str) -> bool {
    if INVALID_URL_PATTERNS.iter().any(|p| url.contains(p)) {
        return false;
    }
    match reqwest::Url::parse(url) {
        Ok(u) => matches!(u.scheme(), "http" | "https") && u.host_str().is_some(),
        Err(_) => false,
    }
}

/// Non-empty title and url, and a valid url.
pub fn is_eligible(item: &NewsItem) -> bool {
    !item.title.trim().is_empty() && !item.url.trim().is_empty() && is_valid_url(&item.url)
}

/// Keep the first occurrence of every URL.
pub fn dedup_by_url(items: Vec<NewsItem>) -> Vec<NewsItem> {
    let mut seen: HashSet<String> = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|it| seen.insert(it.url.clone()))
        .collect()
}

/// Primary items first (never evicted), then fallback items whose URL is not
/// already present, stopping at `cap`. The output never holds two items with
/// the same URL and never exceeds `cap`.
pub fn merge_without_duplicates(
    primary: Vec<NewsItem>,
    fallback: Vec<NewsItem>,
    cap: usize,
) -> Vec<NewsItem> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::with_capacity(cap.min(primary.len() + fallback.len()));
    for it in primary.into_iter().chain(fallback) {
        if out.len() >= cap {
            break;
        }
        if seen.insert(it.url.clone()) {
            out.push(it);
        }
    }
    out
}

/// How many fallback items of each category a digest top-up asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryQuota {
    pub gamefi: usize,
    pub crypto: usize,
}

impl CategoryQuota {
    pub const MIN_GAMEFI: usize = 3;

    /// GameFi gets at least 3 (or half the need, whichever is larger);
    /// crypto gets what is left.
    pub fn split(needed: usize) -> Self {
        let gamefi = Self::MIN_GAMEFI.max(needed / 2);
        Self {
            gamefi,
            crypto: needed.saturating_sub(gamefi),
        }
    }

    pub fn total(&self) -> usize {
        self.gamefi + self.crypto
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn item(url: &str) -> NewsItem {
        NewsItem {
            title: format!("t {url}"),
            description: String::new(),
            url: url.to_string(),
            published_at: Utc::now(),
            source: "test".into(),
            category: Category::Gamefi,
        }
    }

    #[test]
    fn clean_text_strips_tags_and_collapses_ws() {
        let s = "  <p>Axie&nbsp;&nbsp;Infinity <b>hits</b>\n 2M</p>  ";
        assert_eq!(clean_text(s, 200), "Axie Infinity hits 2M");
    }

    #[test]
    fn clean_text_caps_length_by_chars() {
        let s = "é".repeat(300);
        assert_eq!(clean_text(&s, 200).chars().count(), 200);
    }

    #[test]
    fn deny_list_and_scheme_are_enforced() {
        assert!(is_valid_url("https://decrypt.co/123/axie"));
        assert!(!is_valid_url("https://consent.yahoo.com/v2/collectConsent?x=1"));
        assert!(!is_valid_url("https://example.com/login?next=/a"));
        assert!(!is_valid_url("ftp://example.com/file"));
        assert!(!is_valid_url("not a url"));
    }

    #[test]
    fn quota_split_matches_rule() {
        assert_eq!(CategoryQuota::split(10), CategoryQuota { gamefi: 5, crypto: 5 });
        assert_eq!(CategoryQuota::split(7), CategoryQuota { gamefi: 3, crypto: 4 });
        assert_eq!(CategoryQuota::split(3), CategoryQuota { gamefi: 3, crypto: 0 });
        assert_eq!(CategoryQuota::split(2), CategoryQuota { gamefi: 3, crypto: 0 });
    }

    #[test]
    fn merge_keeps_primary_first_and_respects_cap() {
        let primary = vec![item("https://a"), item("https://b")];
        let fallback = vec![item("https://b"), item("https://c"), item("https://d")];
        let out = merge_without_duplicates(primary, fallback, 3);
        let urls: Vec<_> = out.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a", "https://b", "https://c"]);
    }

    #[test]
    fn dedup_keeps_first_occurrence() {
        let mut second = item("https://a");
        second.source = "other".into();
        let out = dedup_by_url(vec![item("https://a"), second, item("https://b")]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].source, "test");
    }
}
