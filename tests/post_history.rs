// tests/post_history.rs
//
// Post history: duplicate window, retention pruning, stats and legacy files.

use chrono::{Duration, Utc};
use gamefi_radar::store::post_history::content_fingerprint;
use gamefi_radar::store::{PostHistory, PostKind};

#[test]
fn duplicate_only_within_window() {
    let dir = tempfile::tempdir().unwrap();
    let h = PostHistory::open(dir.path().join("posted.json"));
    let now = Utc::now();
    let fp = content_fingerprint("Bom dia! Resumo de hoje");

    h.record_at(PostKind::Digest, "Resumo Diário", &fp, now - Duration::days(8))
        .unwrap();
    assert!(!h.is_duplicate_at(&fp, Duration::days(7), now));

    h.record_at(PostKind::Digest, "Resumo Diário", &fp, now - Duration::days(2))
        .unwrap();
    assert!(h.is_duplicate_at(&fp, Duration::days(7), now));
    assert!(!h.is_duplicate_at(&content_fingerprint("outro texto"), Duration::days(7), now));
}

#[test]
fn prune_removes_only_old_records() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("posted.json");
    let h = PostHistory::open(&path);
    let now = Utc::now();
    h.record_at(PostKind::Highlight, "old", "aa", now - Duration::days(45)).unwrap();
    h.record_at(PostKind::Highlight, "new", "bb", now - Duration::days(3)).unwrap();

    assert_eq!(h.prune_at(Duration::days(30), now).unwrap(), 1);
    assert_eq!(h.len(), 1);
    assert_eq!(h.prune_at(Duration::days(30), now).unwrap(), 0);

    let reloaded = PostHistory::open(&path);
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded.recent_at(Duration::days(7), now)[0].title, "new");
}

#[test]
fn stats_count_kinds_and_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let h = PostHistory::open(dir.path().join("posted.json"));
    let now = Utc::now();
    let first = now - Duration::days(5);
    h.record_at(PostKind::Digest, "Resumo Diário", "a", first).unwrap();
    h.record_at(PostKind::Highlight, "x", "b", now - Duration::days(1)).unwrap();
    h.record_at(PostKind::Highlight, "y", "c", now).unwrap();

    let s = h.stats();
    assert_eq!(s.total_posts, 3);
    assert_eq!(s.digests, 1);
    assert_eq!(s.highlights, 2);
    assert_eq!(s.first_post, Some(first));
    assert_eq!(s.last_post, Some(now));
}

#[test]
fn file_shape_uses_legacy_labels_and_date() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("posted.json");
    let h = PostHistory::open(&path);
    h.record(PostKind::Highlight, "🎮 Manchete", "abc123").unwrap();

    let v: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let rec = &v["posted_news"][0];
    assert_eq!(rec["type"], "noticia_relevante");
    assert_eq!(rec["content_hash"], "abc123");
    assert_eq!(rec["date"].as_str().unwrap().len(), 10);
}

#[test]
fn loads_records_written_by_older_installs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("posted.json");
    std::fs::write(
        &path,
        r#"{"posted_news":[{"type":"resumo_diario","title":"Resumo Diário",
            "content_hash":"d41d8cd98f00b204e9800998ecf8427e",
            "timestamp":"2025-10-01T09:00:03.512345","date":"2025-10-01"}]}"#,
    )
    .unwrap();
    let h = PostHistory::open(&path);
    assert_eq!(h.len(), 1);
    assert_eq!(h.stats().digests, 1);
}

#[test]
fn clear_empties_history() {
    let dir = tempfile::tempdir().unwrap();
    let h = PostHistory::open(dir.path().join("posted.json"));
    h.record(PostKind::Digest, "Resumo Diário", "a").unwrap();
    assert_eq!(h.clear().unwrap(), 1);
    assert!(h.is_empty());
}
