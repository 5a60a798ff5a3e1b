//! Serialized job execution. Scheduled triggers and admin requests both go
//! through one queue drained by a single worker, so no two jobs ever touch the
//! persisted state at the same time.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::compose::Composer;
use crate::error::PipelineError;
use crate::publish::{PublishGate, PublishOutcome};
use crate::store::post_history::DEFAULT_RETENTION_DAYS;
use crate::store::used_set::CleanupAction;
use crate::store::{PostKind, UsedSet};

use super::Control;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Job {
    Digest,
    Highlight,
    /// Generate without publishing. Used-set effects still apply.
    PreviewDigest,
    PreviewHighlight,
    /// History prune + used-set periodic reset.
    Maintenance,
    ClearUsed,
    ClearHistory,
}

impl Job {
    pub fn as_str(self) -> &'static str {
        match self {
            Job::Digest => "digest",
            Job::Highlight => "highlight",
            Job::PreviewDigest => "preview_digest",
            Job::PreviewHighlight => "preview_highlight",
            Job::Maintenance => "maintenance",
            Job::ClearUsed => "clear_used",
            Job::ClearHistory => "clear_history",
        }
    }

    pub fn post_kind(self) -> Option<PostKind> {
        match self {
            Job::Digest | Job::PreviewDigest => Some(PostKind::Digest),
            Job::Highlight | Job::PreviewHighlight => Some(PostKind::Highlight),
            _ => None,
        }
    }
}

impl std::fmt::Display for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum JobOutcome {
    Publish(PublishOutcome),
    Preview { text: String },
    Failed { reason: String, message: String },
    Maintenance { pruned_posts: usize, used_set: String },
    Cleared { removed: usize },
}

#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub job: Job,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: JobOutcome,
}

impl JobReport {
    pub fn is_failure(&self) -> bool {
        matches!(
            self.outcome,
            JobOutcome::Failed { .. } | JobOutcome::Publish(PublishOutcome::Failed(_))
        )
    }
}

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("jobs_run_total", "Jobs executed by the worker.");
        describe_counter!("pipeline_failures_total", "Pipeline runs that ended without text.");
    });
}

/// Everything a job needs. Owned by the worker.
pub struct Pipeline {
    composer: Composer,
    gate: PublishGate,
    used: Arc<UsedSet>,
}

impl Pipeline {
    pub fn new(composer: Composer, gate: PublishGate, used: Arc<UsedSet>) -> Self {
        ensure_metrics_described();
        Self {
            composer,
            gate,
            used,
        }
    }

    async fn produce(&self, kind: PostKind) -> Result<String, PipelineError> {
        match kind {
            PostKind::Digest => self.composer.produce_digest().await,
            PostKind::Highlight => self.composer.produce_highlight().await,
        }
    }

    fn failed(kind: &str, e: impl std::fmt::Display, reason: &'static str) -> JobOutcome {
        counter!("pipeline_failures_total", "kind" => kind.to_string(), "reason" => reason)
            .increment(1);
        JobOutcome::Failed {
            reason: reason.to_string(),
            message: e.to_string(),
        }
    }

    async fn execute(&self, job: Job) -> JobOutcome {
        match job {
            Job::Digest | Job::Highlight => {
                let Some(kind) = job.post_kind() else {
                    return Self::failed(job.as_str(), "not a post job", "invalid");
                };
                match self.produce(kind).await {
                    Ok(text) => match self.gate.publish(kind, &text).await {
                        Ok(outcome) => JobOutcome::Publish(outcome),
                        Err(e) => Self::failed(job.as_str(), e, "storage"),
                    },
                    Err(e) => Self::failed(job.as_str(), &e, e.reason()),
                }
            }
            Job::PreviewDigest | Job::PreviewHighlight => {
                let Some(kind) = job.post_kind() else {
                    return Self::failed(job.as_str(), "not a post job", "invalid");
                };
                match self.produce(kind).await {
                    Ok(text) => JobOutcome::Preview { text },
                    Err(e) => Self::failed(job.as_str(), &e, e.reason()),
                }
            }
            Job::Maintenance => {
                let pruned_posts = match self.gate.prune_history(DEFAULT_RETENTION_DAYS) {
                    Ok(n) => n,
                    Err(e) => return Self::failed(job.as_str(), e, "storage"),
                };
                let used_set = match self.used.cleanup_if_due() {
                    Ok(CleanupAction::Cleared { removed }) => format!("cleared {removed}"),
                    Ok(CleanupAction::Initialized) => "initialized".to_string(),
                    Ok(CleanupAction::NotDue) => "not_due".to_string(),
                    Err(e) => return Self::failed(job.as_str(), e, "storage"),
                };
                JobOutcome::Maintenance {
                    pruned_posts,
                    used_set,
                }
            }
            Job::ClearUsed => match self.used.clear() {
                Ok(removed) => JobOutcome::Cleared { removed },
                Err(e) => Self::failed(job.as_str(), e, "storage"),
            },
            Job::ClearHistory => match self.gate.history().clear() {
                Ok(removed) => JobOutcome::Cleared { removed },
                Err(e) => Self::failed(job.as_str(), e, "storage"),
            },
        }
    }

    pub async fn run(&self, job: Job) -> JobReport {
        let started_at = Utc::now();
        tracing::info!(%job, "job started");
        let outcome = self.execute(job).await;
        counter!("jobs_run_total", "job" => job.as_str()).increment(1);

        let report = JobReport {
            job,
            started_at,
            finished_at: Utc::now(),
            outcome,
        };
        if report.is_failure() {
            tracing::warn!(%job, outcome = ?report.outcome, "job finished without publishing");
        } else {
            tracing::info!(%job, "job finished");
        }
        report
    }
}

struct Envelope {
    job: Job,
    reply: Option<oneshot::Sender<JobReport>>,
}

/// Handle for submitting jobs to the single worker.
#[derive(Clone)]
pub struct JobQueue {
    tx: mpsc::Sender<Envelope>,
}

impl JobQueue {
    /// Queue `job` without waiting for it.
    pub async fn enqueue(&self, job: Job) -> Result<()> {
        self.tx
            .send(Envelope { job, reply: None })
            .await
            .map_err(|_| anyhow!("job queue closed"))
    }

    /// Queue `job` and wait for its report.
    pub async fn submit(&self, job: Job) -> Result<JobReport> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Envelope {
                job,
                reply: Some(reply),
            })
            .await
            .map_err(|_| anyhow!("job queue closed"))?;
        rx.await.map_err(|_| anyhow!("worker stopped before finishing {job}"))
    }
}

/// Start the worker. It drains the queue one job at a time and exits when
/// `control` is stopped (after the current job) or every queue handle is gone.
pub fn spawn_worker(pipeline: Pipeline, control: Control, capacity: usize) -> (JobQueue, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<Envelope>(capacity.max(1));
    let mut stop = control.subscribe();

    let handle = tokio::spawn(async move {
        loop {
            if *stop.borrow() {
                break;
            }
            let env = tokio::select! {
                next = rx.recv() => match next {
                    Some(env) => env,
                    None => break,
                },
                _ = stop.changed() => continue,
            };

            let report = pipeline.run(env.job).await;
            control.record(report.clone());
            if let Some(reply) = env.reply {
                let _ = reply.send(report);
            }
        }
        tracing::info!("job worker stopped");
    });

    (JobQueue { tx }, handle)
}
