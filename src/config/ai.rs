// src/config/ai.rs
use serde::{Deserialize, Serialize};
use std::env;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

fn default_max_tokens() -> u32 {
    4096
}
fn default_temperature() -> f32 {
    0.7
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    /// "claude" | "mock" (case-insensitive)
    pub provider: String,
    pub model: String,
    /// "ENV" means: read from CLAUDE_API_KEY
    pub api_key: String,
    pub base_url: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: "claude".to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: "ENV".to_string(),
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: 120,
        }
    }
}

impl AiConfig {
    /// Normalize provider, resolve `"ENV"` keys and clamp sampling settings.
    /// A missing key resolves to empty; mode-dependent validation decides
    /// whether that is fatal.
    pub fn resolve(&mut self) -> anyhow::Result<()> {
        self.provider = self.provider.trim().to_lowercase();

        if self.api_key.trim().eq_ignore_ascii_case("env") {
            self.api_key = match self.provider.as_str() {
                "claude" | "mock" => env::var("CLAUDE_API_KEY").unwrap_or_default(),
                other => anyhow::bail!("Unsupported provider in config: {other}"),
            };
        }
        if let Ok(model) = env::var("CLAUDE_MODEL") {
            if !model.trim().is_empty() {
                self.model = model.trim().to_string();
            }
        }

        if !(0.0..=1.0).contains(&self.temperature) {
            self.temperature = default_temperature();
        }
        if self.max_tokens == 0 {
            self.max_tokens = default_max_tokens();
        }
        if self.timeout_secs == 0 {
            self.timeout_secs = 120;
        }
        Ok(())
    }
}
