//! GameFi Radar: binary entrypoint.
//! Boots the job worker, the daily triggers and the admin HTTP surface.

use std::sync::Arc;

use axum::{routing::get, Router};
use shuttle_axum::ShuttleAxum;
use tokio::signal;

use gamefi_radar::api::{self, AdminState};
use gamefi_radar::bootstrap::{init_tracing, Services};
use gamefi_radar::config::{AdminAccess, BotConfig};
use gamefi_radar::metrics::Metrics;
use gamefi_radar::scheduler::cadence::offset_hours;
use gamefi_radar::scheduler::{self, spawn_worker, Control, Schedule};

const QUEUE_CAPACITY: usize = 16;

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = BotConfig::load_default()?;
    let schedule = Arc::new(Schedule::from_config(&cfg.schedule)?);
    let tz = offset_hours(cfg.schedule.utc_offset_hours);
    let access = cfg.admin_access();

    let services = Services::from_config(&cfg)?;
    let used = services.used.clone();
    let history = services.history.clone();
    let metrics = Metrics::init(used.len())?;

    let control = Control::new();
    let (queue, worker) = spawn_worker(services.into_pipeline(), control.clone(), QUEUE_CAPACITY);
    let mut tasks = schedule.spawn(&queue, &control);
    tasks.push(worker);
    for run in schedule.next_runs(chrono::Utc::now()) {
        tracing::info!(job = %run.job, at = %run.at_local, next_run_utc = %run.next_run_utc, "scheduled");
    }
    tokio::spawn(scheduler::stop_on(shutdown_signal(), control.clone(), tasks));

    let router = if access == AdminAccess::Disabled {
        Router::new().route("/health", get(|| async { "ok" }))
    } else {
        api::router(AdminState {
            queue,
            control,
            used,
            history,
            schedule,
            mode: cfg.mode,
            tz,
            token: access.bearer(),
        })
    };

    Ok(router.merge(metrics.router()).into())
}

/// Wait for SIGTERM or SIGINT (Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received SIGINT, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
