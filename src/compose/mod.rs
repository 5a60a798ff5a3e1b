//! Selection & composition: gather fresh items, hand them to the generator,
//! commit what was used.

pub mod prompts;

use std::fmt::Write as _;
use std::sync::Arc;

use chrono::{Duration, FixedOffset, Utc};
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::ai::DynGenerator;
use crate::error::PipelineError;
use crate::ingest::{merge_without_duplicates, Category, CategoryQuota, NewsFetcher, NewsItem};
use crate::store::UsedSet;

use prompts::PtDate;

pub const PRIMARY_WINDOW_HOURS: i64 = 72;
/// Hard ceiling on candidates handed to the generator.
pub const MAX_ITEMS: usize = 10;
pub const DIGEST_TOPUP_BELOW: usize = 8;
pub const HIGHLIGHT_TOPUP_BELOW: usize = 5;
pub const DIGEST_HEALTHY: usize = 5;
pub const HIGHLIGHT_HEALTHY: usize = 3;

pub struct Composer {
    fetcher: Arc<NewsFetcher>,
    generator: DynGenerator,
    tz: FixedOffset,
}

impl Composer {
    pub fn new(fetcher: Arc<NewsFetcher>, generator: DynGenerator, tz: FixedOffset) -> Self {
        Self {
            fetcher,
            generator,
            tz,
        }
    }

    fn used(&self) -> &Arc<UsedSet> {
        self.fetcher.used()
    }

    fn today(&self) -> PtDate {
        PtDate::from_local(Utc::now().with_timezone(&self.tz))
    }

    /// Multi-item daily digest. Every candidate is marked used before the
    /// generator is called, so a failed generation still consumes them.
    pub async fn produce_digest(&self) -> Result<String, PipelineError> {
        tracing::info!("producing daily digest");
        let mut items = self
            .fetcher
            .fetch_primary(Duration::hours(PRIMARY_WINDOW_HOURS), MAX_ITEMS, true)
            .await;

        if items.len() < DIGEST_TOPUP_BELOW {
            tracing::warn!(primary = items.len(), "few primary items; topping up from feeds");
            let quota = CategoryQuota::split(MAX_ITEMS - items.len());
            let fallback = self.fetcher.fetch_fallback(quota, true).await;
            items = merge_without_duplicates(items, fallback, MAX_ITEMS);
            tracing::info!(
                total = items.len(),
                gamefi = count(&items, Category::Gamefi),
                crypto = count(&items, Category::Crypto),
                "digest candidates after top-up"
            );
        }

        if items.is_empty() {
            tracing::error!("no fresh news for the digest; every candidate was already used");
            return Err(PipelineError::NoFreshContent);
        }
        if items.len() < DIGEST_HEALTHY {
            tracing::warn!(available = items.len(), "low availability for the digest");
        }

        let marked = self.used().mark_many(items.iter().map(|i| i.url.as_str()))?;
        tracing::info!(candidates = items.len(), marked, "digest candidates marked as used");

        let prompt = format!(
            "{}\n\n{}\n\n{}",
            prompts::digest_prompt(&self.today()),
            format_news_for_ai(&items, None),
            prompts::DIGEST_CLOSING
        );

        match self.generator.generate(&prompt, prompts::DIGEST_SYSTEM).await {
            Some(text) => {
                tracing::info!(chars = text.chars().count(), "digest generated");
                Ok(text)
            }
            None => {
                tracing::error!(provider = self.generator.provider_name(), "digest generation failed");
                Err(PipelineError::GenerationFailed)
            }
        }
    }

    /// Single-story highlight. Only the URL the generator cites is marked used.
    pub async fn produce_highlight(&self) -> Result<String, PipelineError> {
        tracing::info!("producing highlight");
        let window = Duration::hours(PRIMARY_WINDOW_HOURS);
        let mut items = self.fetcher.fetch_primary(window, MAX_ITEMS, true).await;

        if items.len() < HIGHLIGHT_TOPUP_BELOW {
            tracing::warn!(primary = items.len(), "few primary items; topping up from search and feeds");
            let fallback = self.fetcher.fetch_fallback_gamefi(window, true).await;
            items = merge_without_duplicates(items, fallback, MAX_ITEMS);
            tracing::info!(total = items.len(), "highlight candidates after top-up");
        }

        if items.is_empty() {
            tracing::error!("no fresh news for the highlight; every candidate was already used");
            return Err(PipelineError::NoFreshContent);
        }
        if items.len() < HIGHLIGHT_HEALTHY {
            tracing::warn!(available = items.len(), "low availability for the highlight");
        }

        let prompt = format!(
            "{}\n\n{}\n\n{}",
            prompts::highlight_prompt(&self.today()),
            format_news_for_ai(&items, Some(self.used().len())),
            prompts::HIGHLIGHT_CLOSING
        );

        let Some(text) = self
            .generator
            .generate(&prompt, prompts::HIGHLIGHT_SYSTEM)
            .await
        else {
            tracing::error!(provider = self.generator.provider_name(), "highlight generation failed");
            return Err(PipelineError::GenerationFailed);
        };

        match extract_first_url(&text) {
            Some(url) => match self.used().mark_used(&url) {
                Ok(()) => tracing::info!(%url, "highlight source marked as used"),
                Err(e) => tracing::error!(%url, error = %e, "could not persist highlight source"),
            },
            None => tracing::warn!("no URL in the highlight; nothing marked as used"),
        }
        Ok(text)
    }
}

fn count(items: &[NewsItem], category: Category) -> usize {
    items.iter().filter(|i| i.category == category).count()
}

/// Render candidates as the generator's context block. `used_count` adds a
/// note about how many stories the channel already covered.
pub fn format_news_for_ai(items: &[NewsItem], used_count: Option<usize>) -> String {
    if items.is_empty() {
        return "Nenhuma notícia encontrada.".to_string();
    }

    let mut out = String::from("NOTÍCIAS DISPONÍVEIS (TODAS INÉDITAS NO CANAL):\n\n");
    if let Some(n) = used_count {
        let _ = write!(
            out,
            "ℹ️ O canal já usou {n} notícias recentemente. As notícias abaixo são todas novas.\n\n"
        );
    }
    for (i, it) in items.iter().enumerate() {
        let _ = write!(
            out,
            "{n}. **{title}**\n   Categoria: {cat}\n   Fonte: {source}\n   Data: {date}\n   Descrição: {desc}\n   URL: {url}\n\n",
            n = i + 1,
            title = it.title,
            cat = it.category.as_str().to_uppercase(),
            source = it.source,
            date = it.published_at.format("%Y-%m-%d %H:%M UTC"),
            desc = it.description,
            url = it.url,
        );
    }
    out
}

/// First `http(s)://` URL in `text`, without trailing punctuation.
pub fn extract_first_url(text: &str) -> Option<String> {
    static RE_URL: OnceCell<Regex> = OnceCell::new();
    let re = RE_URL.get_or_init(|| Regex::new(r"https?://[^\s)]+").expect("url regex"));
    re.find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ')']).to_string())
        .filter(|u| !u.is_empty())
}
