//! Task-boundary error taxonomy.
//!
//! Errors fall into two groups: fatal errors that terminate a task
//! (recorded verbatim on the task record), and non-fatal signals
//! (`CapabilityUnavailable`, `OffsetOutOfRange`) that are absorbed by the
//! estimator's fallback chain and never leave the pipeline.

use thiserror::Error;

use crate::capability::EmbedError;
use crate::media::MediaError;
use crate::models::TaskStatus;

/// Errors surfaced at the task boundary or by orchestrator queries.
#[derive(Error, Debug)]
pub enum SyncError {
    /// An input file does not exist or is not a regular file.
    #[error("Input file not found: {path}")]
    InputNotFound { path: String },

    /// An input file failed validation (extension or size).
    #[error("Input rejected: {reason}")]
    InputNotAllowed { reason: String },

    /// Audio extraction from a container failed.
    #[error("Audio extraction failed: {source}")]
    Extraction {
        #[source]
        source: MediaError,
    },

    /// Applying the computed offset to the dubbed track failed.
    #[error("Offset application failed: {source}")]
    SyncApplication {
        #[source]
        source: MediaError,
    },

    /// Final remux failed or produced an implausible container.
    #[error("Remux failed: {source}")]
    Remux {
        #[source]
        source: MediaError,
    },

    /// A heavy inference capability is unavailable. Non-fatal: the stage
    /// that sees this takes its fallback branch.
    #[error("Capability unavailable ({capability}): {reason}")]
    CapabilityUnavailable { capability: String, reason: String },

    /// A candidate offset exceeded the sanity ceiling. Non-fatal: the
    /// estimator falls back to the statistical method.
    #[error("Offset {offset:.3}s outside the plausible range (±{limit:.0}s)")]
    OffsetOutOfRange { offset: f64, limit: f64 },

    /// No task registered under the given id.
    #[error("Task not found: {id}")]
    TaskNotFound { id: String },

    /// The task has not completed, so no result path exists.
    #[error("Result not ready for task {id} (status: {status})")]
    ResultNotReady { id: String, status: TaskStatus },

    /// Catch-all for unexpected failures.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Create an input-not-found error.
    pub fn input_not_found(path: impl Into<String>) -> Self {
        Self::InputNotFound { path: path.into() }
    }

    /// Create an input-rejected error.
    pub fn input_not_allowed(reason: impl Into<String>) -> Self {
        Self::InputNotAllowed {
            reason: reason.into(),
        }
    }

    /// Wrap a media error from the extraction stage.
    pub fn extraction(source: MediaError) -> Self {
        Self::Extraction { source }
    }

    /// Wrap a media error from the offset-application stage.
    pub fn sync_application(source: MediaError) -> Self {
        Self::SyncApplication { source }
    }

    /// Wrap a media error from the remux stage.
    pub fn remux(source: MediaError) -> Self {
        Self::Remux { source }
    }

    /// Create a capability-unavailable signal.
    pub fn capability_unavailable(
        capability: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::CapabilityUnavailable {
            capability: capability.into(),
            reason: reason.into(),
        }
    }

    /// Create an offset-out-of-range signal.
    pub fn offset_out_of_range(offset: f64, limit: f64) -> Self {
        Self::OffsetOutOfRange { offset, limit }
    }

    /// Create a task-not-found error.
    pub fn task_not_found(id: impl Into<String>) -> Self {
        Self::TaskNotFound { id: id.into() }
    }

    /// Create a result-not-ready error.
    pub fn result_not_ready(id: impl Into<String>, status: TaskStatus) -> Self {
        Self::ResultNotReady {
            id: id.into(),
            status,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// True for signals that trigger a fallback instead of failing the task.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::CapabilityUnavailable { .. } | Self::OffsetOutOfRange { .. }
        )
    }
}

impl From<EmbedError> for SyncError {
    fn from(err: EmbedError) -> Self {
        Self::capability_unavailable("embedding", err.to_string())
    }
}

/// Result type for engine operations.
pub type SyncResult<T> = Result<T, SyncError>;
