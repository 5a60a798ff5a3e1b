//! Admin HTTP surface. Every action that touches persisted state goes through
//! the job queue so it serializes with scheduled runs.
//!
//! Everything except `/health` requires `Authorization: Bearer <token>` when a
//! token is configured.

use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Duration, FixedOffset, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tower_http::trace::TraceLayer;

use crate::config::Mode;
use crate::scheduler::{Control, Job, JobQueue, NextRun, Schedule};
use crate::store::{HistoryStats, PostHistory, UsedSet, UsedStats};

#[derive(Clone)]
pub struct AdminState {
    pub queue: JobQueue,
    pub control: Control,
    pub used: Arc<UsedSet>,
    pub history: Arc<PostHistory>,
    pub schedule: Arc<Schedule>,
    pub mode: Mode,
    pub tz: FixedOffset,
    /// `None` leaves the admin routes open.
    pub token: Option<Arc<str>>,
}

pub fn router(state: AdminState) -> Router {
    let admin = Router::new()
        .route("/status", get(status))
        .route("/stats", get(stats))
        .route("/pause", post(pause))
        .route("/resume", post(resume))
        .route("/run/{kind}", post(run_now))
        .route("/preview/{kind}", post(preview))
        .route("/admin/clear-used", post(clear_used))
        .route("/admin/clear-history", post(clear_history))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_token));

    Router::new()
        .route("/health", get(|| async { "ok" }))
        .merge(admin)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn require_token(State(state): State<AdminState>, req: Request, next: Next) -> Response {
    let Some(expected) = state.token.as_deref() else {
        return next.run(req).await;
    };
    // compared as digests
    let authorized = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|t| Sha256::digest(t.trim().as_bytes()) == Sha256::digest(expected.as_bytes()));
    if authorized {
        return next.run(req).await;
    }
    tracing::warn!(path = %req.uri().path(), "admin request rejected");
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        "unauthorized",
    )
        .into_response()
}

#[derive(Serialize)]
struct StatusOut {
    paused: bool,
    mode: &'static str,
    local_time: String,
    schedule: Vec<NextRun>,
    last_job: Option<crate::scheduler::JobReport>,
}

async fn status(State(state): State<AdminState>) -> Json<StatusOut> {
    let now = Utc::now();
    Json(StatusOut {
        paused: state.control.is_paused(),
        mode: state.mode.as_str(),
        local_time: now.with_timezone(&state.tz).format("%Y-%m-%d %H:%M:%S %:z").to_string(),
        schedule: state.schedule.next_runs(now),
        last_job: state.control.last_report(),
    })
}

#[derive(Serialize)]
struct StatsOut {
    posts: HistoryStats,
    posts_last_7_days: usize,
    used: UsedStats,
}

async fn stats(State(state): State<AdminState>) -> Json<StatsOut> {
    Json(StatsOut {
        posts: state.history.stats(),
        posts_last_7_days: state.history.recent_at(Duration::days(7), Utc::now()).len(),
        used: state.used.stats(),
    })
}

#[derive(Serialize)]
struct PausedOut {
    paused: bool,
}

async fn pause(State(state): State<AdminState>) -> Json<PausedOut> {
    state.control.pause();
    Json(PausedOut { paused: true })
}

async fn resume(State(state): State<AdminState>) -> Json<PausedOut> {
    state.control.resume();
    Json(PausedOut { paused: false })
}

fn post_job(kind: &str, preview: bool) -> Option<Job> {
    match (kind, preview) {
        ("digest", false) => Some(Job::Digest),
        ("highlight", false) => Some(Job::Highlight),
        ("digest", true) => Some(Job::PreviewDigest),
        ("highlight", true) => Some(Job::PreviewHighlight),
        _ => None,
    }
}

async fn submit(state: &AdminState, job: Job) -> Response {
    match state.queue.submit(job).await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            tracing::error!(%job, error = %e, "admin job could not run");
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

async fn run_now(State(state): State<AdminState>, Path(kind): Path<String>) -> Response {
    match post_job(&kind, false) {
        Some(job) => submit(&state, job).await,
        None => (StatusCode::NOT_FOUND, format!("unknown post kind '{kind}'")).into_response(),
    }
}

async fn preview(State(state): State<AdminState>, Path(kind): Path<String>) -> Response {
    match post_job(&kind, true) {
        Some(job) => submit(&state, job).await,
        None => (StatusCode::NOT_FOUND, format!("unknown post kind '{kind}'")).into_response(),
    }
}

async fn clear_used(State(state): State<AdminState>) -> Response {
    submit(&state, Job::ClearUsed).await
}

async fn clear_history(State(state): State<AdminState>) -> Response {
    submit(&state, Job::ClearHistory).await
}
