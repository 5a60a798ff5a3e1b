//! Publish gate: content-level duplicate check, delivery, history commit.

use std::sync::Arc;

use chrono::{Duration, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::Serialize;

use crate::config::Mode;
use crate::error::StorageError;
use crate::notify::{markdown_to_html, DeliveryChannel};
use crate::store::post_history::{content_fingerprint, DEFAULT_DUPLICATE_WINDOW_DAYS};
use crate::store::{PostHistory, PostKind};

pub const DIGEST_TITLE: &str = "Resumo Diário";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Same text was published within the duplicate window.
    Duplicate,
    Empty,
}

impl SkipReason {
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::Duplicate => "duplicate",
            SkipReason::Empty => "empty",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum PublishOutcome {
    Published,
    Skipped(SkipReason),
    /// Test mode: passed the duplicate check, logged, not delivered.
    Simulated,
    /// The channel exhausted its retries. Nothing was recorded.
    Failed(String),
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("posts_published_total", "Posts delivered and recorded.");
        describe_counter!("posts_skipped_total", "Publish attempts skipped (duplicate/empty).");
        describe_counter!("posts_failed_total", "Deliveries that failed after retries.");
    });
}

/// Title stored with a history record.
pub fn derive_title(kind: PostKind, text: &str) -> String {
    match kind {
        PostKind::Digest => DIGEST_TITLE.to_string(),
        PostKind::Highlight => text
            .lines()
            .map(|l| l.replace("**", "").trim().to_string())
            .find(|l| !l.is_empty())
            .unwrap_or_default(),
    }
}

pub struct PublishGate {
    history: Arc<PostHistory>,
    channel: Arc<dyn DeliveryChannel>,
    mode: Mode,
    duplicate_window: Duration,
}

impl PublishGate {
    pub fn new(history: Arc<PostHistory>, channel: Arc<dyn DeliveryChannel>, mode: Mode) -> Self {
        ensure_metrics_described();
        Self {
            history,
            channel,
            mode,
            duplicate_window: Duration::days(DEFAULT_DUPLICATE_WINDOW_DAYS),
        }
    }

    pub fn with_duplicate_window(mut self, window: Duration) -> Self {
        self.duplicate_window = window;
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn history(&self) -> &Arc<PostHistory> {
        &self.history
    }

    fn skipped(kind: PostKind, reason: SkipReason) -> PublishOutcome {
        counter!("posts_skipped_total", "kind" => kind.as_str(), "reason" => reason.as_str())
            .increment(1);
        PublishOutcome::Skipped(reason)
    }

    /// Deliver `text` unless the same text went out within the duplicate
    /// window. A history record is written only after a successful delivery;
    /// `Err` means delivery succeeded but that record could not be persisted.
    pub async fn publish(&self, kind: PostKind, text: &str) -> Result<PublishOutcome, StorageError> {
        if text.trim().is_empty() {
            tracing::warn!(%kind, "empty content; nothing to publish");
            return Ok(Self::skipped(kind, SkipReason::Empty));
        }

        let fingerprint = content_fingerprint(text);
        if self.history.is_duplicate(&fingerprint, self.duplicate_window) {
            tracing::warn!(%kind, "duplicate content; skipping publication");
            return Ok(Self::skipped(kind, SkipReason::Duplicate));
        }

        if self.mode == Mode::Test {
            tracing::info!(%kind, chars = text.chars().count(), "test mode: post not delivered");
            tracing::info!("would publish:\n{text}");
            return Ok(PublishOutcome::Simulated);
        }

        let html = markdown_to_html(text);
        if let Err(e) = self.channel.send(&html).await {
            counter!("posts_failed_total", "kind" => kind.as_str()).increment(1);
            tracing::error!(%kind, channel = self.channel.name(), error = %e, "delivery failed");
            return Ok(PublishOutcome::Failed(e.to_string()));
        }

        let title = derive_title(kind, text);
        self.history.record_at(kind, &title, &fingerprint, Utc::now())?;
        counter!("posts_published_total", "kind" => kind.as_str()).increment(1);
        tracing::info!(%kind, %title, channel = self.channel.name(), "post published");
        Ok(PublishOutcome::Published)
    }

    /// Drop history records older than `retention_days`. Never shorter than the
    /// duplicate window.
    pub fn prune_history(&self, retention_days: i64) -> Result<usize, StorageError> {
        let retention = Duration::days(retention_days).max(self.duplicate_window);
        self.history.prune(retention)
    }
}
