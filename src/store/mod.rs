//! Durable JSON state: the used-URL set and the post history.
//!
//! Every mutation rewrites the whole file through [`write_json_atomic`]
//! (temp file + rename), so a crash mid-write never leaves a truncated file.

pub mod post_history;
pub mod used_set;

use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::StorageError;

pub use post_history::{HistoryStats, PostHistory, PostKind, PostRecord};
pub use used_set::{UsedSet, UsedStats};

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let json = serde_json::to_vec_pretty(value)?;
    let io_err = |source| StorageError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(io_err)?;
    }

    let tmp = path.with_extension("json.tmp");
    let mut f = fs::File::create(&tmp).map_err(io_err)?;
    f.write_all(&json).map_err(io_err)?;
    f.sync_all().map_err(io_err)?;
    drop(f);
    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

/// Load a JSON state file. Missing or unreadable/corrupt files fall back to
/// `T::default()` with a warning; startup must never abort on bad state.
pub fn load_json_or_default<T>(path: &Path, what: &str) -> T
where
    T: Default + for<'de> Deserialize<'de>,
{
    let raw = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "{what} file not found, starting empty");
            return T::default();
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "{what} file unreadable, starting empty");
            return T::default();
        }
    };

    match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "{what} file corrupted, starting empty");
            T::default()
        }
    }
}

/// Parse a persisted timestamp: RFC 3339, or a naive ISO-8601 value
/// (as written by older installs) interpreted as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|n| n.and_utc())
        })
}

pub(crate) fn de_timestamp<'de, D>(d: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(d)?;
    parse_timestamp(&s).ok_or_else(|| serde::de::Error::custom(format!("bad timestamp: {s}")))
}

pub(crate) fn de_opt_timestamp<'de, D>(d: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(d)? {
        None => Ok(None),
        Some(s) => parse_timestamp(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("bad timestamp: {s}"))),
    }
}
