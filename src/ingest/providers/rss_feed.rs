use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::ingest::clean_text;
use crate::ingest::types::{Category, NewsItem, SourceProvider};

/// Feed descriptions are cut to this many characters.
pub const DESCRIPTION_MAX_CHARS: usize = 200;
const TITLE_MAX_CHARS: usize = 300;

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/// Parse a feed date (RFC 2822, or RFC 3339 as some feeds emit).
pub fn parse_feed_date(ts: &str) -> Option<DateTime<Utc>> {
    let ts = ts.trim();
    OffsetDateTime::parse(ts, &Rfc2822)
        .ok()
        .and_then(|dt| DateTime::from_timestamp(dt.unix_timestamp(), 0))
        .or_else(|| {
            DateTime::parse_from_rfc2822(ts)
                .ok()
                .map(|d| d.with_timezone(&Utc))
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(ts)
                .ok()
                .map(|d| d.with_timezone(&Utc))
        })
}

/// "beincrypto_gaming" -> "Beincrypto_Gaming"
pub fn title_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = true;
    for ch in name.chars() {
        if upper_next && ch.is_alphabetic() {
            out.extend(ch.to_uppercase());
        } else {
            out.extend(ch.to_lowercase());
        }
        upper_next = !ch.is_alphabetic();
    }
    out
}

/// Parse RSS XML into items. Entries without a title or link are skipped;
/// an unparseable date falls back to "now".
pub fn parse_feed(
    xml: &str,
    source: &str,
    category: Category,
    scan_limit: usize,
    terms: &[String],
) -> Result<Vec<NewsItem>> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    let rss: Rss = from_str(&xml_clean).with_context(|| format!("parsing {source} rss xml"))?;

    let now = Utc::now();
    let mut out = Vec::with_capacity(rss.channel.item.len().min(scan_limit));
    for it in rss.channel.item.into_iter().take(scan_limit) {
        let title = clean_text(it.title.as_deref().unwrap_or_default(), TITLE_MAX_CHARS);
        let url = it.link.as_deref().unwrap_or_default().trim().to_string();
        if title.is_empty() || url.is_empty() {
            continue;
        }

        let full_desc = clean_text(it.description.as_deref().unwrap_or_default(), 1500);
        if !terms.is_empty() {
            let t = title.to_lowercase();
            let d = full_desc.to_lowercase();
            if !terms.iter().any(|term| t.contains(term.as_str()) || d.contains(term.as_str())) {
                continue;
            }
        }

        out.push(NewsItem {
            title,
            description: full_desc.chars().take(DESCRIPTION_MAX_CHARS).collect(),
            url,
            published_at: it
                .pub_date
                .as_deref()
                .and_then(parse_feed_date)
                .unwrap_or(now),
            source: source.to_string(),
            category,
        });
    }

    Ok(out)
}

enum Mode {
    // Own copy so tests don't need 'static fixtures.
    Fixture(String),
    Http { url: String, client: reqwest::Client },
}

/// A category-tagged RSS feed.
pub struct RssFeedProvider {
    name: String,
    label: String,
    category: Category,
    scan_limit: usize,
    terms: Vec<String>,
    mode: Mode,
}

impl RssFeedProvider {
    pub fn from_url(name: &str, url: &str, category: Category, client: reqwest::Client) -> Self {
        Self::with_mode(
            name,
            category,
            Mode::Http {
                url: url.to_string(),
                client,
            },
        )
    }

    pub fn from_fixture(name: &str, category: Category, xml: &str) -> Self {
        Self::with_mode(name, category, Mode::Fixture(xml.to_string()))
    }

    fn with_mode(name: &str, category: Category, mode: Mode) -> Self {
        Self {
            name: name.to_string(),
            label: title_case(name),
            category,
            scan_limit: 50,
            terms: Vec::new(),
            mode,
        }
    }

    /// Only the first `n` entries of the feed are considered.
    pub fn with_scan_limit(mut self, n: usize) -> Self {
        self.scan_limit = n;
        self
    }

    /// Keep only entries whose title or summary mentions one of `terms`
    /// (case-insensitive).
    pub fn with_terms<I, S>(mut self, terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.terms = terms
            .into_iter()
            .map(|t| t.as_ref().to_lowercase())
            .collect();
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

#[async_trait]
impl SourceProvider for RssFeedProvider {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        let items = match &self.mode {
            Mode::Fixture(s) => parse_feed(s, &self.label, self.category, self.scan_limit, &self.terms)?,
            Mode::Http { url, client } => {
                let body = match client.get(url).send().await {
                    Ok(resp) => resp
                        .error_for_status()
                        .with_context(|| format!("{} http status", self.name))?
                        .text()
                        .await
                        .with_context(|| format!("{} http .text()", self.name))?,
                    Err(e) => return Err(e).with_context(|| format!("{} http get()", self.name)),
                };
                parse_feed(&body, &self.label, self.category, self.scan_limit, &self.terms)?
            }
        };
        tracing::debug!(provider = %self.name, entries = items.len(), "feed parsed");
        Ok(items)
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Category {
        self.category
    }
}

fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&hellip;", "...")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}
