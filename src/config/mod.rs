// src/config/mod.rs
//! Bot configuration: `config/bot.toml` (or `$BOT_CONFIG_PATH`), then env
//! overrides, then built-in defaults for anything left unset.

pub mod ai;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};

pub use ai::AiConfig;

use crate::scheduler::cadence::{offset_hours, DailyCadence};

const ENV_PATH: &str = "BOT_CONFIG_PATH";
const DEFAULT_PATH: &str = "config/bot.toml";
const ENV_MARKER: &str = "ENV";
const UTC_OFFSET_RANGE: std::ops::RangeInclusive<i32> = -12..=14;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Dry run: posts are logged, never delivered.
    #[default]
    Test,
    Production,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Test => "test",
            Mode::Production => "production",
        }
    }
}

impl FromStr for Mode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "test" => Ok(Mode::Test),
            "production" | "prod" => Ok(Mode::Production),
            other => Err(anyhow!("unknown mode '{other}' (expected test|production)")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub used_set_file: String,
    pub history_file: String,
    /// A link posted within this many days is not posted again.
    pub duplicate_window_days: i64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            used_set_file: "news_cache.json".to_string(),
            history_file: "posted_news.json".to_string(),
            duplicate_window_days: 7,
        }
    }
}

impl StorageConfig {
    pub fn used_set_path(&self) -> PathBuf {
        self.data_dir.join(&self.used_set_file)
    }

    pub fn history_path(&self) -> PathBuf {
        self.data_dir.join(&self.history_file)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub digest: String,
    pub highlights: Vec<String>,
    pub maintenance: String,
    /// Hours east of UTC; São Paulo is -3.
    pub utc_offset_hours: i32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            digest: "09:00".to_string(),
            highlights: vec!["13:00".to_string(), "18:00".to_string()],
            maintenance: "00:00".to_string(),
            utc_offset_hours: -3,
        }
    }
}

impl ScheduleConfig {
    pub fn digest_cadence(&self) -> Result<DailyCadence> {
        DailyCadence::parse(offset_hours(self.utc_offset_hours), &self.digest)
    }

    pub fn highlight_cadences(&self) -> Result<Vec<DailyCadence>> {
        self.highlights
            .iter()
            .map(|t| DailyCadence::parse(offset_hours(self.utc_offset_hours), t))
            .collect()
    }

    pub fn maintenance_cadence(&self) -> Result<DailyCadence> {
        DailyCadence::parse(offset_hours(self.utc_offset_hours), &self.maintenance)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsApiConfig {
    /// "ENV" means: read from NEWSAPI_KEY
    pub api_key: String,
    pub base_url: String,
    pub language: String,
    pub timeout_secs: u64,
}

impl Default for NewsApiConfig {
    fn default() -> Self {
        Self {
            api_key: ENV_MARKER.to_string(),
            base_url: crate::ingest::providers::newsapi::DEFAULT_BASE_URL.to_string(),
            language: "en".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

fn feed(name: &str, url: &str) -> FeedSource {
    FeedSource {
        name: name.to_string(),
        url: url.to_string(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedsConfig {
    pub gamefi: Vec<FeedSource>,
    pub crypto: Vec<FeedSource>,
    pub gamefi_scan_limit: usize,
    pub crypto_scan_limit: usize,
    pub crypto_terms: Vec<String>,
    pub keywords: Vec<String>,
    pub keyword_search_base_url: String,
    pub timeout_secs: u64,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            gamefi: vec![
                feed("dappradar", "https://dappradar.com/blog/feed"),
                feed("nftplazas", "https://nftplazas.com/feed/"),
                feed("beincrypto_gaming", "https://beincrypto.com/gaming/feed/"),
            ],
            crypto: vec![
                feed("coindesk", "https://www.coindesk.com/arc/outboundfeeds/rss/"),
                feed("cointelegraph", "https://cointelegraph.com/rss"),
                feed("decrypt", "https://decrypt.co/feed"),
                feed("theblock", "https://www.theblock.co/rss.xml"),
                feed("cryptoslate", "https://cryptoslate.com/feed/"),
            ],
            gamefi_scan_limit: 50,
            crypto_scan_limit: 100,
            crypto_terms: [
                "bitcoin", "btc", "ethereum", "eth", "price", "market", "trading", "defi",
                "altcoin", "regulation", "sec", "etf", "investment", "blockchain", "crypto",
                "cryptocurrency",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            keywords: crate::ingest::providers::keyword_search::DEFAULT_KEYWORDS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            keyword_search_base_url: crate::ingest::providers::keyword_search::DEFAULT_BASE_URL
                .to_string(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// "ENV" means: read from TELEGRAM_BOT_TOKEN
    pub bot_token: String,
    /// "ENV" means: read from TELEGRAM_CHANNEL_ID
    pub channel_id: String,
    pub api_base: String,
    pub retries: u8,
    pub retry_backoff_secs: u64,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: ENV_MARKER.to_string(),
            channel_id: ENV_MARKER.to_string(),
            api_base: "https://api.telegram.org".to_string(),
            retries: 3,
            retry_backoff_secs: 2,
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    pub enabled: bool,
    /// Bearer token the admin routes require. `"ENV"` reads `ADMIN_TOKEN`.
    pub token: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            token: ENV_MARKER.to_string(),
        }
    }
}

/// How the admin routes are exposed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminAccess {
    /// Only `/health` and `/metrics` are served.
    Disabled,
    /// No token configured; test mode only.
    Open,
    Token(String),
}

impl AdminAccess {
    pub fn bearer(&self) -> Option<std::sync::Arc<str>> {
        match self {
            AdminAccess::Token(t) => Some(t.as_str().into()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    pub mode: Mode,
    pub storage: StorageConfig,
    pub schedule: ScheduleConfig,
    pub newsapi: NewsApiConfig,
    pub feeds: FeedsConfig,
    pub ai: AiConfig,
    pub telegram: TelegramConfig,
    pub admin: AdminConfig,
}

impl BotConfig {
    /// Parse a TOML file and apply env overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading bot config from {}", path.display()))?;
        let cfg: BotConfig = toml::from_str(&content)
            .with_context(|| format!("parsing bot config {}", path.display()))?;
        tracing::info!(path = %path.display(), "bot config loaded");
        cfg.finish()
    }

    /// Load config using env var + fallbacks:
    /// 1) $BOT_CONFIG_PATH
    /// 2) config/bot.toml
    /// 3) built-in defaults
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = env::var(ENV_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from(&pb);
            }
            bail!("{ENV_PATH} points to non-existent path {}", pb.display());
        }
        let default_p = PathBuf::from(DEFAULT_PATH);
        if default_p.exists() {
            return Self::load_from(&default_p);
        }
        tracing::info!("no bot config file found; using defaults");
        BotConfig::default().finish()
    }

    fn finish(mut self) -> Result<Self> {
        self.ai.resolve()?;
        override_from_env("CLAUDE_API_KEY", &mut self.ai.api_key);
        override_from_env("NEWSAPI_KEY", &mut self.newsapi.api_key);
        override_from_env("TELEGRAM_BOT_TOKEN", &mut self.telegram.bot_token);
        override_from_env("TELEGRAM_CHANNEL_ID", &mut self.telegram.channel_id);
        override_from_env("ADMIN_TOKEN", &mut self.admin.token);

        // An unresolved marker means "not configured".
        for secret in [
            &mut self.newsapi.api_key,
            &mut self.telegram.bot_token,
            &mut self.telegram.channel_id,
            &mut self.admin.token,
        ] {
            if secret.trim().eq_ignore_ascii_case(ENV_MARKER) {
                secret.clear();
            }
        }

        if let Ok(m) = env::var("MODE") {
            if !m.trim().is_empty() {
                self.mode = m.parse()?;
            }
        }
        if let Ok(d) = env::var("DATA_DIR") {
            if !d.trim().is_empty() {
                self.storage.data_dir = PathBuf::from(d.trim());
            }
        }

        self.validate()?;
        Ok(self)
    }

    /// Names of the secrets delivery and generation need but do not have.
    pub fn missing_secrets(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.ai.enabled && self.ai.provider == "claude" && self.ai.api_key.is_empty() {
            missing.push("CLAUDE_API_KEY");
        }
        if self.telegram.bot_token.is_empty() {
            missing.push("TELEGRAM_BOT_TOKEN");
        }
        if self.telegram.channel_id.is_empty() {
            missing.push("TELEGRAM_CHANNEL_ID");
        }
        missing
    }

    /// Admin exposure for this mode. Production never serves the admin routes
    /// without a token.
    pub fn admin_access(&self) -> AdminAccess {
        if !self.admin.enabled {
            return AdminAccess::Disabled;
        }
        let token = self.admin.token.trim();
        if !token.is_empty() {
            return AdminAccess::Token(token.to_string());
        }
        match self.mode {
            Mode::Production => {
                tracing::error!("ADMIN_TOKEN not set; admin routes are not mounted");
                AdminAccess::Disabled
            }
            Mode::Test => {
                tracing::warn!("ADMIN_TOKEN not set; admin routes are open (test mode)");
                AdminAccess::Open
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !UTC_OFFSET_RANGE.contains(&self.schedule.utc_offset_hours) {
            return Err(anyhow!(
                "{} is outside {}..={}",
                self.schedule.utc_offset_hours,
                UTC_OFFSET_RANGE.start(),
                UTC_OFFSET_RANGE.end()
            ))
            .context("schedule.utc_offset_hours");
        }
        if self.storage.duplicate_window_days < 1 {
            return Err(anyhow!("must be at least 1, got {}", self.storage.duplicate_window_days))
                .context("storage.duplicate_window_days");
        }
        self.schedule
            .digest_cadence()
            .context("schedule.digest")?;
        self.schedule
            .highlight_cadences()
            .context("schedule.highlights")?;
        self.schedule
            .maintenance_cadence()
            .context("schedule.maintenance")?;

        if self.newsapi.api_key.is_empty() {
            tracing::warn!("NEWSAPI_KEY not set; the primary source will return nothing");
        }

        let missing = self.missing_secrets();
        if missing.is_empty() {
            return Ok(());
        }
        match self.mode {
            Mode::Production => bail!("missing configuration for production: {}", missing.join(", ")),
            Mode::Test => {
                tracing::warn!(missing = %missing.join(", "), "test mode: posts will not be delivered");
                Ok(())
            }
        }
    }
}

fn override_from_env(var: &str, field: &mut String) {
    if let Ok(v) = env::var(var) {
        if !v.trim().is_empty() {
            *field = v.trim().to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_parses_loosely() {
        assert_eq!("PRODUCTION".parse::<Mode>().unwrap(), Mode::Production);
        assert_eq!(" test ".parse::<Mode>().unwrap(), Mode::Test);
        assert!("staging".parse::<Mode>().is_err());
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: BotConfig = toml::from_str(
            r#"
            mode = "production"
            [schedule]
            digest = "08:30"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.mode, Mode::Production);
        assert_eq!(cfg.schedule.digest, "08:30");
        assert_eq!(cfg.schedule.highlights, vec!["13:00", "18:00"]);
        assert_eq!(cfg.feeds.gamefi.len(), 3);
        assert_eq!(cfg.feeds.crypto.len(), 5);
        assert_eq!(cfg.telegram.retries, 3);
        assert_eq!(cfg.storage.used_set_path(), PathBuf::from("data/news_cache.json"));
        assert_eq!(cfg.storage.duplicate_window_days, 7);
        assert_eq!(cfg.admin.token, "ENV");
    }
}
