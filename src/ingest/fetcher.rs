//! Multi-source fetcher: primary API first, category-tagged feeds and keyword
//! search as fallback. Every per-source failure stops at this boundary.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use metrics::counter;

use crate::ingest::providers::KeywordSearchProvider;
use crate::ingest::types::{Category, NewsItem, PrimarySource, SourceProvider};
use crate::ingest::{dedup_by_url, ensure_metrics_described, is_eligible, CategoryQuota};
use crate::store::UsedSet;

/// Feed entries older than this are ignored.
pub const FEED_WINDOW_DAYS: i64 = 7;
/// Highlight fallback takes at most this many feed items.
pub const GAMEFI_FEED_CAP: usize = 10;

pub struct NewsFetcher {
    primary: Arc<dyn PrimarySource>,
    gamefi_feeds: Vec<Arc<dyn SourceProvider>>,
    crypto_feeds: Vec<Arc<dyn SourceProvider>>,
    keyword_search: Option<KeywordSearchProvider>,
    used: Arc<UsedSet>,
}

impl NewsFetcher {
    pub fn new(primary: Arc<dyn PrimarySource>, used: Arc<UsedSet>) -> Self {
        ensure_metrics_described();
        Self {
            primary,
            gamefi_feeds: Vec::new(),
            crypto_feeds: Vec::new(),
            keyword_search: None,
            used,
        }
    }

    /// Register a fallback feed under the category it reports.
    pub fn with_feed(mut self, feed: Arc<dyn SourceProvider>) -> Self {
        match feed.category() {
            Category::Gamefi => self.gamefi_feeds.push(feed),
            Category::Crypto => self.crypto_feeds.push(feed),
        }
        self
    }

    pub fn with_keyword_search(mut self, search: KeywordSearchProvider) -> Self {
        self.keyword_search = Some(search);
        self
    }

    pub fn used(&self) -> &Arc<UsedSet> {
        &self.used
    }

    fn keep(&self, item: &NewsItem, filter_used: bool) -> bool {
        if !is_eligible(item) {
            tracing::debug!(url = %item.url, "invalid item skipped");
            return false;
        }
        if filter_used && self.used.is_used(&item.url) {
            counter!("ingest_used_filtered_total").increment(1);
            return false;
        }
        true
    }

    /// Items from the primary API published within `window`. Any failure
    /// yields an empty list. The used set's periodic reset runs first.
    pub async fn fetch_primary(
        &self,
        window: Duration,
        max_results: usize,
        filter_used: bool,
    ) -> Vec<NewsItem> {
        if let Err(e) = self.used.cleanup_if_due() {
            tracing::warn!(error = %e, "used-set cleanup could not be persisted");
        }

        let from = Utc::now() - window;
        let raw = match self.primary.search(from, max_results).await {
            Ok(v) => v,
            Err(e) => {
                counter!("ingest_provider_errors_total", "source" => self.primary.name().to_string())
                    .increment(1);
                tracing::error!(provider = %self.primary.name(), error = %e, "primary fetch failed");
                return Vec::new();
            }
        };

        let fetched = raw.len();
        let items: Vec<NewsItem> = dedup_by_url(raw)
            .into_iter()
            .filter(|it| self.keep(it, filter_used))
            .collect();

        counter!("ingest_items_total", "source" => self.primary.name().to_string())
            .increment(items.len() as u64);
        tracing::info!(
            provider = %self.primary.name(),
            fetched,
            fresh = items.len(),
            "primary fetch done"
        );
        items
    }

    /// Pull `feeds` in order until `limit` kept items are collected. Feeds that
    /// fail are logged and skipped.
    async fn collect_feeds(
        &self,
        feeds: &[Arc<dyn SourceProvider>],
        limit: usize,
        filter_used: bool,
        cutoff: DateTime<Utc>,
    ) -> Vec<NewsItem> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        for feed in feeds {
            if out.len() >= limit {
                break;
            }
            let entries = match feed.fetch_latest().await {
                Ok(v) => v,
                Err(e) => {
                    counter!("ingest_provider_errors_total", "source" => feed.name().to_string())
                        .increment(1);
                    tracing::debug!(provider = %feed.name(), error = %e, "feed fetch failed");
                    continue;
                }
            };

            let before = out.len();
            for it in entries {
                if out.len() >= limit {
                    break;
                }
                if it.published_at < cutoff || !self.keep(&it, filter_used) {
                    continue;
                }
                if seen.insert(it.url.clone()) {
                    out.push(it);
                }
            }
            counter!("ingest_items_total", "source" => feed.name().to_string())
                .increment((out.len() - before) as u64);
        }
        out
    }

    /// Digest top-up: up to `quota.gamefi` GameFi feed items followed by up to
    /// `quota.crypto` crypto feed items, all from the last seven days.
    pub async fn fetch_fallback(&self, quota: CategoryQuota, filter_used: bool) -> Vec<NewsItem> {
        let cutoff = Utc::now() - Duration::days(FEED_WINDOW_DAYS);
        let gamefi = self
            .collect_feeds(&self.gamefi_feeds, quota.gamefi, filter_used, cutoff)
            .await;
        let crypto = self
            .collect_feeds(&self.crypto_feeds, quota.crypto, filter_used, cutoff)
            .await;

        tracing::info!(
            gamefi = gamefi.len(),
            crypto = crypto.len(),
            wanted_gamefi = quota.gamefi,
            wanted_crypto = quota.crypto,
            "fallback feeds fetched"
        );
        dedup_by_url(gamefi.into_iter().chain(crypto).collect())
    }

    /// Highlight top-up: keyword search within `window`, then GameFi feeds
    /// (at most ten items), deduplicated with keyword results first.
    pub async fn fetch_fallback_gamefi(&self, window: Duration, filter_used: bool) -> Vec<NewsItem> {
        let mut all = Vec::new();
        if let Some(search) = &self.keyword_search {
            let std_window = window.to_std().unwrap_or(StdDuration::from_secs(72 * 3600));
            let found = search.search(std_window).await;
            counter!("ingest_items_total", "source" => "keyword_search").increment(found.len() as u64);
            all.extend(found.into_iter().filter(|it| self.keep(it, filter_used)));
        }

        let cutoff = Utc::now() - Duration::days(FEED_WINDOW_DAYS);
        all.extend(
            self.collect_feeds(&self.gamefi_feeds, GAMEFI_FEED_CAP, filter_used, cutoff)
                .await,
        );

        let unique = dedup_by_url(all);
        tracing::info!(count = unique.len(), "gamefi fallback fetched");
        unique
    }
}
