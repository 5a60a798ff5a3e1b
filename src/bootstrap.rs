// src/bootstrap.rs
//! Wiring shared by the service binary and the one-shot tool:
//! config → storage → fetcher → generator → channel → gate → composer.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::ai::build_generator;
use crate::compose::Composer;
use crate::config::BotConfig;
use crate::ingest::providers::{KeywordSearchProvider, NewsApiProvider, RssFeedProvider};
use crate::ingest::{Category, NewsFetcher};
use crate::notify::TelegramChannel;
use crate::publish::PublishGate;
use crate::scheduler::cadence::offset_hours;
use crate::scheduler::Pipeline;
use crate::store::{PostHistory, UsedSet};

/// Install the global subscriber. `LOG_FORMAT=json` selects JSON lines; a
/// subscriber installed by the host runtime wins.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gamefi_radar=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };
    if res.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

pub fn build_fetcher(cfg: &BotConfig, used: Arc<UsedSet>) -> Result<NewsFetcher> {
    let primary = NewsApiProvider::new(
        cfg.newsapi.api_key.clone(),
        Duration::from_secs(cfg.newsapi.timeout_secs),
    )?
    .with_base_url(cfg.newsapi.base_url.clone())
    .with_language(cfg.newsapi.language.clone());

    let http = reqwest::Client::builder()
        .user_agent(concat!("gamefi-radar/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(cfg.feeds.timeout_secs))
        .build()?;

    let mut fetcher = NewsFetcher::new(Arc::new(primary), used);
    for f in &cfg.feeds.gamefi {
        let feed = RssFeedProvider::from_url(&f.name, &f.url, Category::Gamefi, http.clone())
            .with_scan_limit(cfg.feeds.gamefi_scan_limit);
        fetcher = fetcher.with_feed(Arc::new(feed));
    }
    for f in &cfg.feeds.crypto {
        let feed = RssFeedProvider::from_url(&f.name, &f.url, Category::Crypto, http.clone())
            .with_scan_limit(cfg.feeds.crypto_scan_limit)
            .with_terms(&cfg.feeds.crypto_terms);
        fetcher = fetcher.with_feed(Arc::new(feed));
    }
    let search = KeywordSearchProvider::new(http)
        .with_base_url(cfg.feeds.keyword_search_base_url.clone())
        .with_keywords(cfg.feeds.keywords.iter().cloned());
    Ok(fetcher.with_keyword_search(search))
}

/// Every long-lived component, built from one config.
pub struct Services {
    pub used: Arc<UsedSet>,
    pub history: Arc<PostHistory>,
    pub composer: Composer,
    pub gate: PublishGate,
}

impl Services {
    pub fn from_config(cfg: &BotConfig) -> Result<Self> {
        let used = Arc::new(UsedSet::open(cfg.storage.used_set_path()));
        let history = Arc::new(PostHistory::open(cfg.storage.history_path()));

        let fetcher = Arc::new(build_fetcher(cfg, used.clone())?);
        let generator = build_generator(&cfg.ai);
        // Safe diagnostics: only provider + mode + key length
        info!(
            mode = cfg.mode.as_str(),
            generator = generator.provider_name(),
            ai_key_len = cfg.ai.api_key.len(),
            "services configured"
        );

        let tz = offset_hours(cfg.schedule.utc_offset_hours);
        let composer = Composer::new(fetcher, generator, tz);
        let channel = TelegramChannel::from_config(&cfg.telegram)?;
        let gate = PublishGate::new(history.clone(), Arc::new(channel), cfg.mode)
            .with_duplicate_window(chrono::Duration::days(cfg.storage.duplicate_window_days));

        Ok(Self {
            used,
            history,
            composer,
            gate,
        })
    }

    pub fn into_pipeline(self) -> Pipeline {
        Pipeline::new(self.composer, self.gate, self.used)
    }
}
