// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod ai;
pub mod api;
pub mod bootstrap;
pub mod compose;
pub mod config;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod notify;
pub mod publish;
pub mod scheduler;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::error::{PipelineError, StorageError};
pub use crate::publish::{PublishGate, PublishOutcome, SkipReason};
