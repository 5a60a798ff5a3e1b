//! Daily triggers feeding the job queue, plus the pause/stop control shared
//! with the admin surface.

pub mod cadence;
pub mod jobs;

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::ScheduleConfig;

pub use cadence::DailyCadence;
pub use jobs::{spawn_worker, Job, JobOutcome, JobQueue, JobReport, Pipeline};

struct ControlInner {
    paused: AtomicBool,
    stop_tx: watch::Sender<bool>,
    last_report: Mutex<Option<JobReport>>,
}

/// Pause flag, cooperative stop signal and the last job report.
#[derive(Clone)]
pub struct Control {
    inner: Arc<ControlInner>,
}

impl Default for Control {
    fn default() -> Self {
        Self::new()
    }
}

impl Control {
    pub fn new() -> Self {
        let (stop_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(ControlInner {
                paused: AtomicBool::new(false),
                stop_tx,
                last_report: Mutex::new(None),
            }),
        }
    }

    /// Scheduled triggers skip while paused; manual runs still execute.
    pub fn pause(&self) {
        self.inner.paused.store(true, Ordering::SeqCst);
        tracing::info!("scheduling paused");
    }

    pub fn resume(&self) {
        self.inner.paused.store(false, Ordering::SeqCst);
        tracing::info!("scheduling resumed");
    }

    pub fn is_paused(&self) -> bool {
        self.inner.paused.load(Ordering::SeqCst)
    }

    /// Ask triggers and the worker to exit. A running job finishes first.
    pub fn stop(&self) {
        self.inner.stop_tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.inner.stop_tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.inner.stop_tx.subscribe()
    }

    pub(crate) fn record(&self, report: JobReport) {
        *self
            .inner
            .last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(report);
    }

    pub fn last_report(&self) -> Option<JobReport> {
        self.inner
            .last_report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// One scheduled job at a daily time.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleEntry {
    pub job: Job,
    pub cadence: DailyCadence,
}

#[derive(Debug, Clone, Serialize)]
pub struct NextRun {
    pub job: Job,
    pub at_local: String,
    pub next_run_utc: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Schedule {
    entries: Vec<ScheduleEntry>,
}

impl Schedule {
    pub fn from_config(cfg: &ScheduleConfig) -> anyhow::Result<Self> {
        let mut entries = vec![ScheduleEntry {
            job: Job::Digest,
            cadence: cfg.digest_cadence()?,
        }];
        entries.extend(
            cfg.highlight_cadences()?
                .into_iter()
                .map(|cadence| ScheduleEntry {
                    job: Job::Highlight,
                    cadence,
                }),
        );
        entries.push(ScheduleEntry {
            job: Job::Maintenance,
            cadence: cfg.maintenance_cadence()?,
        });
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[ScheduleEntry] {
        &self.entries
    }

    /// Upcoming runs, soonest first.
    pub fn next_runs(&self, now: DateTime<Utc>) -> Vec<NextRun> {
        let mut runs: Vec<NextRun> = self
            .entries
            .iter()
            .map(|e| NextRun {
                job: e.job,
                at_local: e.cadence.to_string(),
                next_run_utc: e.cadence.next_run_from(now),
            })
            .collect();
        runs.sort_by_key(|r| r.next_run_utc);
        runs
    }

    pub fn spawn(&self, queue: &JobQueue, control: &Control) -> Vec<JoinHandle<()>> {
        self.entries
            .iter()
            .map(|e| spawn_daily_trigger(e.cadence, e.job, queue.clone(), control.clone()))
            .collect()
    }
}

/// Wait for `shutdown`, stop everything sharing `control`, then join `tasks`
/// so an in-flight job finishes its writes.
pub async fn stop_on<F>(shutdown: F, control: Control, tasks: Vec<JoinHandle<()>>)
where
    F: Future<Output = ()>,
{
    shutdown.await;
    control.stop();
    for task in tasks {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "background task ended abnormally");
        }
    }
    tracing::info!("scheduler stopped");
}

/// Sleep until each occurrence of `cadence`, then enqueue `job` unless paused.
pub fn spawn_daily_trigger(
    cadence: DailyCadence,
    job: Job,
    queue: JobQueue,
    control: Control,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut stop = control.subscribe();
        let mut last_fired: Option<DateTime<Utc>> = None;
        loop {
            let now = Utc::now();
            // Never re-fire the occurrence we just handled, even on early wakeups.
            let next = cadence.next_run_from(last_fired.map_or(now, |t| t.max(now)));
            let wait = cadence::duration_until(next, now);
            tracing::info!(
                %job,
                at = %cadence,
                next_run_utc = %next.to_rfc3339(),
                wait_seconds = wait.as_secs(),
                "trigger armed"
            );

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = stop.changed() => {}
            }
            if control.is_stopped() {
                break;
            }
            last_fired = Some(next);
            if control.is_paused() {
                tracing::info!(%job, "paused; scheduled run skipped");
                continue;
            }
            if let Err(e) = queue.enqueue(job).await {
                tracing::error!(%job, error = %e, "could not enqueue scheduled job");
                break;
            }
        }
        tracing::debug!(%job, "trigger stopped");
    })
}
