// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Topic bucket of a news item. Unknown or missing tags default to `Gamefi`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    #[default]
    Gamefi,
    Crypto,
}

impl Category {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "crypto" => Category::Crypto,
            _ => Category::Gamefi,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Gamefi => "gamefi",
            Category::Crypto => "crypto",
        }
    }
}

/// One candidate article. Transient: only `url` is ever persisted (in the used set).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub description: String,
    pub url: String,
    pub published_at: DateTime<Utc>,
    pub source: String,
    #[serde(default)]
    pub category: Category,
}

/// A fallback feed: returns parsed entries, already tagged with its category.
#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>>;
    fn name(&self) -> &str;
    fn category(&self) -> Category;
}

/// The authoritative news API.
#[async_trait::async_trait]
pub trait PrimarySource: Send + Sync {
    /// Items published since `from`, at most `page_size` raw results.
    /// Non-success responses are errors; the fetcher turns them into an empty list.
    async fn search(&self, from: DateTime<Utc>, page_size: usize) -> Result<Vec<NewsItem>>;
    fn name(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_category_defaults_to_gamefi() {
        assert_eq!(Category::from_tag("CRYPTO"), Category::Crypto);
        assert_eq!(Category::from_tag("sports"), Category::Gamefi);
        assert_eq!(Category::from_tag(""), Category::Gamefi);
    }
}
