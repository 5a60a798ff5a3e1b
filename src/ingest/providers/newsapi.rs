use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::ingest::clean_text;
use crate::ingest::types::{Category, NewsItem, PrimarySource};

pub const DEFAULT_BASE_URL: &str = "https://newsapi.org";

/// GameFi topics only; broad crypto coverage comes from the fallback feeds.
pub const DEFAULT_QUERY: &str = "(\"GameFi\" OR \"Web3 gaming\" OR \"blockchain games\" OR \
\"crypto gaming\" OR \"play-to-earn\" OR \"NFT games\" OR \"gaming token\")";

#[derive(Debug, Deserialize)]
struct Resp {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Debug, Deserialize)]
struct Article {
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    #[serde(rename = "publishedAt")]
    published_at: Option<String>,
    source: Option<SourceRef>,
}

#[derive(Debug, Deserialize)]
struct SourceRef {
    name: Option<String>,
}

/// NewsAPI `/v2/everything` client.
pub struct NewsApiProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    query: String,
    language: String,
}

impl NewsApiProvider {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("gamefi-radar/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()
            .context("building newsapi http client")?;
        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            query: DEFAULT_QUERY.to_string(),
            language: "en".to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    fn to_item(a: Article, now: DateTime<Utc>) -> Option<NewsItem> {
        let title = a.title.map(|t| t.trim().to_string()).unwrap_or_default();
        let url = a.url.map(|u| u.trim().to_string()).unwrap_or_default();
        if title.is_empty() || url.is_empty() {
            return None;
        }
        Some(NewsItem {
            title,
            description: clean_text(a.description.as_deref().unwrap_or_default(), 1500),
            url,
            published_at: a
                .published_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or(now),
            source: a
                .source
                .and_then(|s| s.name)
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| "Unknown".to_string()),
            category: Category::Gamefi,
        })
    }
}

#[async_trait]
impl PrimarySource for NewsApiProvider {
    async fn search(&self, from: DateTime<Utc>, page_size: usize) -> Result<Vec<NewsItem>> {
        if self.api_key.trim().is_empty() {
            bail!("newsapi key is not configured");
        }

        let from_param = from.format("%Y-%m-%dT%H:%M:%S").to_string();
        let page_size = page_size.to_string();
        let resp = self
            .http
            .get(format!("{}/v2/everything", self.base_url))
            .query(&[
                ("q", self.query.as_str()),
                ("from", from_param.as_str()),
                ("sortBy", "publishedAt"),
                ("language", self.language.as_str()),
                ("pageSize", page_size.as_str()),
                ("apiKey", self.api_key.as_str()),
            ])
            .send()
            .await
            .context("newsapi request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("newsapi HTTP {status}: {}", body.chars().take(200).collect::<String>());
        }

        let body: Resp = resp.json().await.context("decoding newsapi response")?;
        if body.status != "ok" {
            return Err(anyhow!(
                "newsapi status {}: {}",
                body.status,
                body.message.unwrap_or_default()
            ));
        }

        let now = Utc::now();
        Ok(body
            .articles
            .into_iter()
            .filter_map(|a| Self::to_item(a, now))
            .collect())
    }

    fn name(&self) -> &str {
        "newsapi"
    }
}
