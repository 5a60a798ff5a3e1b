//! Generative collaborator: provider abstraction, the Claude provider and
//! response cleaning.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ai::AiConfig;

/// System instruction used when the caller passes none.
pub const DEFAULT_SYSTEM: &str = "Você é um especialista em GameFi e Web3 Gaming.";

const INTERNAL_TAGS: &[&str] = &[
    "search",
    "searchqualitycheck",
    "searchqualityscore",
    "thinking",
    "analysis",
];

/// Trait object used by the composer.
pub trait TextGenerator: Send + Sync {
    /// Compose text for `prompt` under `system`. `None` on any failure or an
    /// empty (post-cleaning) response.
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        system: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>>;
    /// Provider name for diagnostics.
    fn provider_name(&self) -> &'static str;
}

pub type DynGenerator = Arc<dyn TextGenerator>;

/// Drop internal reasoning/search blocks, squeeze blank-line runs, trim.
pub fn clean_response(raw: &str) -> String {
    static RE_TAGS: OnceCell<Vec<Regex>> = OnceCell::new();
    static RE_BLANK: OnceCell<Regex> = OnceCell::new();

    let tags = RE_TAGS.get_or_init(|| {
        INTERNAL_TAGS
            .iter()
            .filter_map(|t| Regex::new(&format!(r"(?s)<{t}>.*?</{t}>")).ok())
            .collect()
    });
    let mut out = raw.to_string();
    for re in tags {
        out = re.replace_all(&out, "").into_owned();
    }

    let blank = RE_BLANK.get_or_init(|| Regex::new(r"\n{3,}").expect("blank-line regex"));
    blank.replace_all(&out, "\n\n").trim().to_string()
}

/// Factory: build a generator according to config and environment variables.
///
/// * If `AI_TEST_MODE=mock` (or provider `mock`), returns a deterministic mock.
/// * Else if `enabled == false`, returns a disabled generator.
/// * Else builds the Claude provider.
pub fn build_generator(config: &AiConfig) -> DynGenerator {
    let mock_env = std::env::var("AI_TEST_MODE")
        .map(|v| v == "mock")
        .unwrap_or(false);
    if mock_env || config.provider == "mock" {
        return Arc::new(MockGenerator::replying(
            "**Resumo de teste**\n\nConteúdo gerado localmente.",
        ));
    }

    if !config.enabled {
        return Arc::new(DisabledGenerator);
    }

    match config.provider.as_str() {
        "claude" => match ClaudeProvider::from_config(config) {
            Ok(p) => Arc::new(p),
            Err(e) => {
                tracing::error!(error = %e, "claude provider unavailable; generation disabled");
                Arc::new(DisabledGenerator)
            }
        },
        other => {
            tracing::warn!(provider = %other, "unknown ai provider; generation disabled");
            Arc::new(DisabledGenerator)
        }
    }
}

/// Anthropic Messages API.
pub struct ClaudeProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl ClaudeProvider {
    pub fn from_config(cfg: &AiConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("gamefi-radar/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: cfg.api_key.clone(),
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
        })
    }

    async fn call(&self, prompt: &str, system: &str) -> Option<String> {
        if self.api_key.is_empty() {
            tracing::error!("claude api key missing");
            return None;
        }

        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }
        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            max_tokens: u32,
            temperature: f32,
            system: &'a str,
            messages: Vec<Msg<'a>>,
        }
        #[derive(Deserialize)]
        struct Resp {
            #[serde(default)]
            content: Vec<Block>,
        }
        #[derive(Deserialize)]
        struct Block {
            #[serde(rename = "type")]
            kind: String,
            #[serde(default)]
            text: String,
        }

        let req = Req {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: if system.is_empty() { DEFAULT_SYSTEM } else { system },
            messages: vec![Msg {
                role: "user",
                content: prompt,
            }],
        };

        tracing::info!(model = %self.model, "calling claude");
        let resp = match self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&req)
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::error!(error = %e, "claude request failed");
                return None;
            }
        };

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            tracing::error!(%status, body = %body.chars().take(300).collect::<String>(), "claude api error");
            return None;
        }

        let body: Resp = match resp.json().await {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(error = %e, "claude response not understood");
                return None;
            }
        };
        let text: String = body
            .content
            .iter()
            .filter(|b| b.kind == "text")
            .map(|b| b.text.as_str())
            .collect();

        let cleaned = clean_response(&text);
        if cleaned.is_empty() {
            tracing::warn!("claude returned empty text");
            None
        } else {
            tracing::info!(chars = cleaned.chars().count(), "claude responded");
            Some(cleaned)
        }
    }
}

impl TextGenerator for ClaudeProvider {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        system: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(self.call(prompt, system))
    }
    fn provider_name(&self) -> &'static str {
        "claude"
    }
}

/// Returns `None` always; used when generation is disabled.
pub struct DisabledGenerator;

impl TextGenerator for DisabledGenerator {
    fn generate<'a>(
        &'a self,
        _prompt: &'a str,
        _system: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        Box::pin(async { None })
    }
    fn provider_name(&self) -> &'static str {
        "disabled"
    }
}

/// Deterministic generator for tests and local runs. Records every prompt.
#[derive(Default)]
pub struct MockGenerator {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    pub fn replying(text: impl Into<String>) -> Self {
        Self {
            reply: Some(text.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A generator whose every call fails.
    pub fn failing() -> Self {
        Self::default()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TextGenerator for MockGenerator {
    fn generate<'a>(
        &'a self,
        prompt: &'a str,
        _system: &'a str,
    ) -> Pin<Box<dyn Future<Output = Option<String>> + Send + 'a>> {
        self.prompts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(prompt.to_string());
        let out = self.reply.as_deref().map(clean_response).filter(|s| !s.is_empty());
        Box::pin(async move { out })
    }
    fn provider_name(&self) -> &'static str {
        "mock"
    }
}
