//! Durable log of published posts, keyed by content fingerprint.

use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::StorageError;
use crate::store::{de_timestamp, load_json_or_default, write_json_atomic};

pub const DEFAULT_DUPLICATE_WINDOW_DAYS: i64 = 7;
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PostKind {
    #[serde(rename = "resumo_diario")]
    Digest,
    #[serde(rename = "noticia_relevante")]
    Highlight,
}

impl PostKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PostKind::Digest => "digest",
            PostKind::Highlight => "highlight",
        }
    }
}

impl std::fmt::Display for PostKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostRecord {
    #[serde(rename = "type")]
    pub kind: PostKind,
    #[serde(default)]
    pub title: String,
    pub content_hash: String,
    #[serde(deserialize_with = "de_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// `YYYY-MM-DD` of `timestamp`, kept for human readers of the file.
    #[serde(default)]
    pub date: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct HistoryFile {
    #[serde(default)]
    posted_news: Vec<PostRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryStats {
    pub total_posts: usize,
    pub digests: usize,
    pub highlights: usize,
    pub first_post: Option<DateTime<Utc>>,
    pub last_post: Option<DateTime<Utc>>,
}

/// Deterministic fingerprint of the exact published text (SHA-256, hex).
pub fn content_fingerprint(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug)]
pub struct PostHistory {
    path: PathBuf,
    inner: Mutex<HistoryFile>,
}

impl PostHistory {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file: HistoryFile = load_json_or_default(&path, "post-history");
        tracing::info!(
            path = %path.display(),
            records = file.posted_news.len(),
            "post history loaded"
        );
        Self {
            path,
            inner: Mutex::new(file),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HistoryFile> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// True if a record with the same fingerprint exists within `window` of `now`.
    pub fn is_duplicate_at(&self, fingerprint: &str, window: Duration, now: DateTime<Utc>) -> bool {
        let cutoff = now - window;
        let v = self.lock();
        match v
            .posted_news
            .iter()
            .find(|p| p.timestamp >= cutoff && p.content_hash == fingerprint)
        {
            Some(hit) => {
                tracing::warn!(posted_on = %hit.date, "duplicate content detected");
                true
            }
            None => false,
        }
    }

    pub fn is_duplicate(&self, fingerprint: &str, window: Duration) -> bool {
        self.is_duplicate_at(fingerprint, window, Utc::now())
    }

    /// Append a record and flush. The record stays in memory if the flush fails.
    pub fn record_at(
        &self,
        kind: PostKind,
        title: &str,
        fingerprint: &str,
        now: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        let entry = PostRecord {
            kind,
            title: title.to_string(),
            content_hash: fingerprint.to_string(),
            timestamp: now,
            date: now.format("%Y-%m-%d").to_string(),
        };

        let mut v = self.lock();
        v.posted_news.push(entry);
        tracing::debug!(%kind, "post recorded in history");
        write_json_atomic(&self.path, &*v)
    }

    pub fn record(&self, kind: PostKind, title: &str, fingerprint: &str) -> Result<(), StorageError> {
        self.record_at(kind, title, fingerprint, Utc::now())
    }

    /// Remove every record older than `retention` relative to `now`.
    /// Returns how many were removed; writes only when something changed.
    pub fn prune_at(&self, retention: Duration, now: DateTime<Utc>) -> Result<usize, StorageError> {
        let cutoff = now - retention;
        let mut v = self.lock();
        let before = v.posted_news.len();
        v.posted_news.retain(|p| p.timestamp >= cutoff);
        let removed = before - v.posted_news.len();
        if removed > 0 {
            tracing::info!(removed, "old posts pruned from history");
            write_json_atomic(&self.path, &*v)?;
        }
        Ok(removed)
    }

    pub fn prune(&self, retention: Duration) -> Result<usize, StorageError> {
        self.prune_at(retention, Utc::now())
    }

    pub fn recent_at(&self, window: Duration, now: DateTime<Utc>) -> Vec<PostRecord> {
        let cutoff = now - window;
        self.lock()
            .posted_news
            .iter()
            .filter(|p| p.timestamp >= cutoff)
            .cloned()
            .collect()
    }

    pub fn clear(&self) -> Result<usize, StorageError> {
        let mut v = self.lock();
        let removed = v.posted_news.len();
        v.posted_news.clear();
        tracing::warn!(removed, "post history cleared by operator");
        write_json_atomic(&self.path, &*v)?;
        Ok(removed)
    }

    pub fn len(&self) -> usize {
        self.lock().posted_news.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> HistoryStats {
        let v = self.lock();
        let count = |k: PostKind| v.posted_news.iter().filter(|p| p.kind == k).count();
        HistoryStats {
            total_posts: v.posted_news.len(),
            digests: count(PostKind::Digest),
            highlights: count(PostKind::Highlight),
            first_post: v.posted_news.iter().map(|p| p.timestamp).min(),
            last_post: v.posted_news.iter().map(|p| p.timestamp).max(),
        }
    }
}
