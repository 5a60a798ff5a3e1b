use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::ingest::providers::rss_feed::parse_feed;
use crate::ingest::types::{Category, NewsItem};

pub const DEFAULT_BASE_URL: &str = "https://news.google.com";

pub const DEFAULT_KEYWORDS: &[&str] = &[
    "GameFi",
    "Web3 gaming",
    "blockchain games",
    "crypto gaming",
    "NFT games",
    "play-to-earn",
];

/// Keyword search over the Google News RSS endpoint. Each keyword is an
/// independent request; a failing keyword never affects the others.
pub struct KeywordSearchProvider {
    http: reqwest::Client,
    base_url: String,
    keywords: Vec<String>,
    per_keyword: usize,
}

impl KeywordSearchProvider {
    pub fn new(http: reqwest::Client) -> Self {
        Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            keywords: DEFAULT_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            per_keyword: 5,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    async fn fetch_keyword(&self, keyword: &str) -> Result<Vec<NewsItem>> {
        let body = self
            .http
            .get(format!("{}/rss/search", self.base_url))
            .query(&[
                ("q", keyword),
                ("hl", "en-US"),
                ("gl", "US"),
                ("ceid", "US:en"),
            ])
            .send()
            .await
            .with_context(|| format!("keyword search '{keyword}' request"))?
            .error_for_status()
            .with_context(|| format!("keyword search '{keyword}' status"))?
            .text()
            .await?;
        parse_feed(&body, "Google News", Category::Gamefi, self.per_keyword, &[])
    }

    /// Up to `per_keyword` entries per keyword, published within `window`.
    pub async fn search(&self, window: Duration) -> Vec<NewsItem> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(window).unwrap_or_else(|_| chrono::Duration::days(1));
        let mut out = Vec::new();
        for kw in &self.keywords {
            match self.fetch_keyword(kw).await {
                Ok(items) => out.extend(items.into_iter().filter(|i| i.published_at >= cutoff)),
                Err(e) => tracing::debug!(keyword = %kw, error = %e, "keyword search failed"),
            }
        }
        out
    }
}
