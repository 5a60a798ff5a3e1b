// tests/common/mod.rs
//
// Shared fakes for integration tests: a scripted primary source, static
// feeds, a recording delivery channel and a ready-made pipeline.
#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};

use gamefi_radar::ai::MockGenerator;
use gamefi_radar::compose::Composer;
use gamefi_radar::config::Mode;
use gamefi_radar::ingest::{Category, NewsFetcher, NewsItem, PrimarySource, SourceProvider};
use gamefi_radar::notify::DeliveryChannel;
use gamefi_radar::scheduler::Pipeline;
use gamefi_radar::store::{PostHistory, UsedSet};
use gamefi_radar::PublishGate;

pub fn item(url: &str, category: Category) -> NewsItem {
    NewsItem {
        title: format!("Story at {url}"),
        description: "Short summary".to_string(),
        url: url.to_string(),
        published_at: Utc::now() - Duration::hours(2),
        source: "Test".to_string(),
        category,
    }
}

/// `n` distinct items under `prefix`, e.g. `https://primary.io/0..n`.
pub fn items(prefix: &str, n: usize, category: Category) -> Vec<NewsItem> {
    (0..n)
        .map(|i| item(&format!("{prefix}/{i}"), category))
        .collect()
}

pub fn used_set(dir: &Path) -> Arc<UsedSet> {
    Arc::new(UsedSet::open(dir.join("news_cache.json")))
}

/// Primary source returning a fixed list (or failing).
pub struct StaticPrimary {
    items: Vec<NewsItem>,
    fail: bool,
    pub calls: AtomicUsize,
}

impl StaticPrimary {
    pub fn new(items: Vec<NewsItem>) -> Arc<Self> {
        Arc::new(Self {
            items,
            fail: false,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            items: Vec::new(),
            fail: true,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl PrimarySource for StaticPrimary {
    async fn search(&self, _from: DateTime<Utc>, page_size: usize) -> Result<Vec<NewsItem>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(anyhow!("apiKeyInvalid"));
        }
        Ok(self.items.iter().take(page_size).cloned().collect())
    }

    fn name(&self) -> &str {
        "static-primary"
    }
}

/// Fallback feed returning a fixed list (or failing).
pub struct StaticFeed {
    name: String,
    category: Category,
    items: Vec<NewsItem>,
    fail: bool,
}

impl StaticFeed {
    pub fn new(name: &str, category: Category, items: Vec<NewsItem>) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            category,
            items,
            fail: false,
        })
    }

    pub fn failing(name: &str, category: Category) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            category,
            items: Vec::new(),
            fail: true,
        })
    }
}

#[async_trait]
impl SourceProvider for StaticFeed {
    async fn fetch_latest(&self) -> Result<Vec<NewsItem>> {
        if self.fail {
            return Err(anyhow!("{} unreachable", self.name));
        }
        Ok(self.items.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn category(&self) -> Category {
        self.category
    }
}

/// Delivery channel that records what it was given.
#[derive(Default)]
pub struct RecordingChannel {
    pub sent: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingChannel {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        })
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeliveryChannel for RecordingChannel {
    async fn send(&self, html: &str) -> Result<()> {
        if self.fail {
            return Err(anyhow!("channel down"));
        }
        self.sent.lock().unwrap().push(html.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Handles a test keeps after moving the pipeline into a worker.
pub struct Harness {
    pub used: Arc<UsedSet>,
    pub history: Arc<PostHistory>,
    pub channel: Arc<RecordingChannel>,
}

/// Full pipeline over `n` primary items, a generator that always answers
/// `reply`, and a recording channel.
pub fn pipeline(dir: &Path, n: usize, reply: &str, mode: Mode) -> (Pipeline, Harness) {
    let used = used_set(dir);
    let history = Arc::new(PostHistory::open(dir.join("posted_news.json")));
    let channel = RecordingChannel::ok();

    let fetcher = NewsFetcher::new(
        StaticPrimary::new(items("https://primary.io", n, Category::Gamefi)),
        used.clone(),
    );
    let tz = FixedOffset::west_opt(3 * 3600).unwrap();
    let composer = Composer::new(Arc::new(fetcher), Arc::new(MockGenerator::replying(reply)), tz);
    let gate = PublishGate::new(history.clone(), channel.clone(), mode);

    (
        Pipeline::new(composer, gate, used.clone()),
        Harness {
            used,
            history,
            channel,
        },
    )
}
