use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::DeliveryChannel;
use crate::config::TelegramConfig;

/// Posts to a Telegram channel through the Bot API `sendMessage` method.
#[derive(Clone)]
pub struct TelegramChannel {
    api_base: String,
    token: String,
    chat_id: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
    backoff: Duration,
}

impl TelegramChannel {
    pub fn new(token: String, chat_id: String) -> Result<Self> {
        Self::from_config(&TelegramConfig {
            bot_token: token,
            channel_id: chat_id,
            ..TelegramConfig::default()
        })
    }

    pub fn from_config(cfg: &TelegramConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .build()?;
        Ok(Self {
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            token: cfg.bot_token.clone(),
            chat_id: cfg.channel_id.clone(),
            client,
            timeout: Duration::from_secs(cfg.read_timeout_secs),
            max_retries: cfg.retries.max(1),
            backoff: Duration::from_secs(cfg.retry_backoff_secs),
        })
    }

    pub fn with_api_base(mut self, base: &str) -> Self {
        self.api_base = base.trim_end_matches('/').to_string();
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    /// Base unit of the linear backoff (attempt `n` waits `n * backoff`).
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    async fn send_once(&self, payload: &SendMessage<'_>) -> Result<()> {
        let rsp = self
            .client
            .post(format!("{}/bot{}/sendMessage", self.api_base, self.token))
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| anyhow!("Telegram request failed: {}", e.without_url()))?;

        let status = rsp.status();
        let body: ApiReply = rsp.json().await.unwrap_or_default();
        if !status.is_success() || !body.ok {
            return Err(anyhow!(
                "Telegram API error {status}: {}",
                body.description.unwrap_or_default()
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    async fn send(&self, html: &str) -> Result<()> {
        let payload = SendMessage {
            chat_id: &self.chat_id,
            text: html,
            parse_mode: "HTML",
            disable_web_page_preview: false,
        };

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.send_once(&payload).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt < self.max_retries => {
                    tracing::warn!(attempt, error = %e, "telegram send failed; retrying");
                    tokio::time::sleep(self.backoff * u32::from(attempt)).await;
                }
                Err(e) => {
                    tracing::error!(attempts = attempt, error = %e, "telegram send gave up");
                    return Err(e);
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Default, Deserialize)]
struct ApiReply {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}
