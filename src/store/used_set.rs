//! Durable set of article URLs already consumed by a publication.
//!
//! Backed by `{ "used_urls": [...], "last_cleanup": ISO8601|null }`. Every
//! mutation is flushed immediately; there is no write buffering.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use metrics::gauge;
use serde::{Deserialize, Serialize};

use crate::error::StorageError;
use crate::store::{de_opt_timestamp, load_json_or_default, write_json_atomic};

/// Full reset period for the used set.
pub const CLEANUP_PERIOD_DAYS: i64 = 30;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UsedFile {
    #[serde(default)]
    used_urls: Vec<String>,
    #[serde(default, deserialize_with = "de_opt_timestamp")]
    last_cleanup: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct Inner {
    file: UsedFile,
    index: HashSet<String>,
}

impl Inner {
    fn from_file(mut file: UsedFile) -> Self {
        // Older files may carry repeats; keep first occurrence.
        let mut index = HashSet::with_capacity(file.used_urls.len());
        file.used_urls.retain(|u| index.insert(u.clone()));
        Self { file, index }
    }

    fn insert(&mut self, url: &str) -> bool {
        if self.index.insert(url.to_string()) {
            self.file.used_urls.push(url.to_string());
            true
        } else {
            false
        }
    }
}

/// Read-only snapshot for status surfaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UsedStats {
    pub total_used: usize,
    pub last_cleanup: Option<DateTime<Utc>>,
}

/// What `cleanup_if_due` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleanupAction {
    /// First run: the timestamp was unset and has been initialized.
    Initialized,
    /// The period elapsed: the whole set was cleared.
    Cleared { removed: usize },
    NotDue,
}

#[derive(Debug)]
pub struct UsedSet {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl UsedSet {
    /// Load from `path`. A missing or corrupted file yields an empty set with
    /// `last_cleanup = None`.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let file: UsedFile = load_json_or_default(&path, "used-set");
        let inner = Inner::from_file(file);
        tracing::info!(
            path = %path.display(),
            total_used = inner.file.used_urls.len(),
            "used-set loaded"
        );
        gauge!("used_set_size").set(inner.file.used_urls.len() as f64);
        Self {
            path,
            inner: Mutex::new(inner),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flush(&self, inner: &Inner) -> Result<(), StorageError> {
        gauge!("used_set_size").set(inner.file.used_urls.len() as f64);
        write_json_atomic(&self.path, &inner.file)
    }

    pub fn is_used(&self, url: &str) -> bool {
        self.lock().index.contains(url)
    }

    /// Idempotent insert. An already-present URL is a successful no-op.
    /// On a failed flush the in-memory set keeps the URL.
    pub fn mark_used(&self, url: &str) -> Result<(), StorageError> {
        let mut inner = self.lock();
        if !inner.insert(url) {
            return Ok(());
        }
        tracing::debug!(url = %truncate(url, 60), "marked as used");
        self.flush(&inner)
    }

    /// Insert every absent URL, then flush once. Returns how many were new.
    pub fn mark_many<'a, I>(&self, urls: I) -> Result<usize, StorageError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut inner = self.lock();
        let added = urls.into_iter().filter(|u| inner.insert(u)).count();
        if added == 0 {
            return Ok(0);
        }
        self.flush(&inner)?;
        Ok(added)
    }

    pub fn cleanup_if_due(&self) -> Result<CleanupAction, StorageError> {
        self.cleanup_if_due_at(Utc::now())
    }

    /// Apply the periodic full-reset policy relative to `now`.
    pub fn cleanup_if_due_at(&self, now: DateTime<Utc>) -> Result<CleanupAction, StorageError> {
        let mut inner = self.lock();
        let last_cleanup = inner.file.last_cleanup;
        let action = match last_cleanup {
            None => {
                inner.file.last_cleanup = Some(now);
                CleanupAction::Initialized
            }
            Some(last) if now.signed_duration_since(last) >= Duration::days(CLEANUP_PERIOD_DAYS) => {
                let removed = inner.file.used_urls.len();
                inner.file.used_urls.clear();
                inner.index.clear();
                inner.file.last_cleanup = Some(now);
                CleanupAction::Cleared { removed }
            }
            Some(_) => CleanupAction::NotDue,
        };

        match action {
            CleanupAction::NotDue => {}
            CleanupAction::Initialized => {
                tracing::debug!("used-set cleanup timestamp initialized");
                self.flush(&inner)?;
            }
            CleanupAction::Cleared { removed } => {
                tracing::info!(removed, "used-set cleared ({CLEANUP_PERIOD_DAYS} days elapsed)");
                self.flush(&inner)?;
            }
        }
        Ok(action)
    }

    /// Operator reset: drop every URL, keep the cleanup timestamp.
    pub fn clear(&self) -> Result<usize, StorageError> {
        let mut inner = self.lock();
        let removed = inner.file.used_urls.len();
        inner.file.used_urls.clear();
        inner.index.clear();
        tracing::warn!(removed, "used-set cleared by operator");
        self.flush(&inner)?;
        Ok(removed)
    }

    pub fn stats(&self) -> UsedStats {
        let inner = self.lock();
        UsedStats {
            total_used: inner.file.used_urls.len(),
            last_cleanup: inner.file.last_cleanup,
        }
    }

    /// Snapshot of the stored URLs in insertion order.
    pub fn urls(&self) -> Vec<String> {
        self.lock().file.used_urls.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().file.used_urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((i, _)) => &s[..i],
        None => s,
    }
}
