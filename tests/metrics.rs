// tests/metrics.rs
// One test per process: the Prometheus recorder is global.

mod common;

use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use gamefi_radar::config::Mode;
use gamefi_radar::metrics::Metrics;
use gamefi_radar::scheduler::Job;

#[tokio::test]
async fn metrics_endpoint_exposes_pipeline_series() {
    let metrics = Metrics::init(0).expect("install recorder");

    let dir = tempfile::tempdir().unwrap();
    let (pipeline, _h) = common::pipeline(dir.path(), 3, "Resumo https://primary.io/0", Mode::Production);
    let published = pipeline.run(Job::Digest).await;
    assert!(!published.is_failure());
    // candidates are spent, so this one fails
    let failed = pipeline.run(Job::Highlight).await;
    assert!(failed.is_failure());

    let resp = metrics
        .router()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "posts_published_total",
        "pipeline_failures_total",
        "jobs_run_total",
        "ingest_items_total",
        "used_set_size 3",
    ] {
        assert!(text.contains(needle), "missing {needle} in:\n{text}");
    }
}
