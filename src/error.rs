//! Typed error kinds shared by the storage, composition and publishing layers.

use std::path::PathBuf;

use thiserror::Error;

/// A durable state file could not be written.
///
/// The in-memory state has already been updated when this is returned; the
/// caller may retry the flush.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Pipeline-level failures. All of them are recoverable: the caller logs and
/// skips the current cycle.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// No eligible items after primary fetch and fallback top-up.
    #[error("no fresh content available")]
    NoFreshContent,

    /// The generative collaborator returned nothing usable.
    #[error("text generation failed")]
    GenerationFailed,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PipelineError {
    /// Short label used for metrics and job reports.
    pub fn reason(&self) -> &'static str {
        match self {
            PipelineError::NoFreshContent => "no_fresh_content",
            PipelineError::GenerationFailed => "generation_failed",
            PipelineError::Storage(_) => "storage",
        }
    }
}
