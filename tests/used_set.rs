// tests/used_set.rs
//
// Durable used-URL set: idempotence, persistence, periodic reset and
// behavior on bad backing files.

use chrono::{Duration, Utc};
use gamefi_radar::store::used_set::CleanupAction;
use gamefi_radar::store::UsedSet;
use gamefi_radar::StorageError;

fn write_state(path: &std::path::Path, urls: &[&str], last_cleanup: Option<chrono::DateTime<Utc>>) {
    let v = serde_json::json!({
        "used_urls": urls,
        "last_cleanup": last_cleanup.map(|t| t.to_rfc3339()),
    });
    std::fs::write(path, v.to_string()).unwrap();
}

#[test]
fn mark_used_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let set = UsedSet::open(dir.path().join("used.json"));

    set.mark_used("https://decrypt.co/a").unwrap();
    assert!(set.is_used("https://decrypt.co/a"));
    assert_eq!(set.len(), 1);

    set.mark_used("https://decrypt.co/a").unwrap();
    assert_eq!(set.len(), 1, "second insert must not grow the set");
    assert!(!set.is_used("https://decrypt.co/b"));
}

#[test]
fn state_survives_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("used.json");
    let before = {
        let set = UsedSet::open(&path);
        set.cleanup_if_due().unwrap();
        set.mark_many(["https://a.io/1", "https://a.io/2", "https://a.io/1"])
            .unwrap();
        set.stats()
    };

    let reloaded = UsedSet::open(&path);
    assert_eq!(reloaded.urls(), vec!["https://a.io/1", "https://a.io/2"]);
    assert_eq!(reloaded.stats(), before);
}

#[test]
fn first_cleanup_only_initializes_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let set = UsedSet::open(dir.path().join("used.json"));
    set.mark_used("https://a.io/1").unwrap();

    let now = Utc::now();
    assert_eq!(set.cleanup_if_due_at(now).unwrap(), CleanupAction::Initialized);
    assert_eq!(set.stats().last_cleanup, Some(now));
    assert_eq!(set.len(), 1);
}

#[test]
fn cleanup_clears_after_thirty_days() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("used.json");
    let now = Utc::now();
    write_state(&path, &["https://a.io/1", "https://a.io/2"], Some(now - Duration::days(31)));

    let set = UsedSet::open(&path);
    assert_eq!(
        set.cleanup_if_due_at(now).unwrap(),
        CleanupAction::Cleared { removed: 2 }
    );
    assert!(set.is_empty());
    assert_eq!(set.stats().last_cleanup, Some(now));

    // persisted too
    let reloaded = UsedSet::open(&path);
    assert!(reloaded.is_empty());
}

#[test]
fn cleanup_is_a_noop_before_thirty_days() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("used.json");
    let now = Utc::now();
    let last = now - Duration::days(10);
    write_state(&path, &["https://a.io/1"], Some(last));

    let set = UsedSet::open(&path);
    assert_eq!(set.cleanup_if_due_at(now).unwrap(), CleanupAction::NotDue);
    assert_eq!(set.len(), 1);
    assert_eq!(
        set.stats().last_cleanup.map(|t| t.timestamp()),
        Some(last.timestamp())
    );
}

#[test]
fn corrupted_or_missing_file_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let missing = UsedSet::open(dir.path().join("nope.json"));
    assert!(missing.is_empty());
    assert_eq!(missing.stats().last_cleanup, None);

    let bad = dir.path().join("bad.json");
    std::fs::write(&bad, "{ not json").unwrap();
    let set = UsedSet::open(&bad);
    assert!(set.is_empty());
    assert_eq!(set.stats().last_cleanup, None);
}

#[test]
fn naive_timestamps_from_older_files_are_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("used.json");
    std::fs::write(
        &path,
        r#"{"used_urls":["https://a.io/1"],"last_cleanup":"2025-09-01T12:30:00.123456"}"#,
    )
    .unwrap();

    let set = UsedSet::open(&path);
    assert_eq!(set.len(), 1);
    assert!(set.stats().last_cleanup.is_some());
}

#[test]
fn clear_keeps_cleanup_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let set = UsedSet::open(dir.path().join("used.json"));
    set.cleanup_if_due().unwrap();
    let stamp = set.stats().last_cleanup;
    set.mark_many(["https://a.io/1", "https://a.io/2"]).unwrap();

    assert_eq!(set.clear().unwrap(), 2);
    assert!(set.is_empty());
    assert_eq!(set.stats().last_cleanup, stamp);
}

#[test]
fn failed_flush_keeps_url_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the parent directory should be.
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "x").unwrap();
    let set = UsedSet::open(blocker.join("used.json"));

    let err = set.mark_used("https://a.io/1").unwrap_err();
    assert!(matches!(err, StorageError::Write { .. }));
    assert!(set.is_used("https://a.io/1"));
}
