//! Core enums used throughout the engine.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
///
/// Every task starts in `Processing` and reaches exactly one of the two
/// terminal states. There are no retries: `Error` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Processing,
    Completed,
    Error,
}

impl TaskStatus {
    /// True once the task can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Error)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::Processing => write!(f, "processing"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Error => write!(f, "error"),
        }
    }
}

/// Which path of the estimator produced an offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OffsetMethod {
    /// Best cosine-similarity pair of transcribed segments.
    Semantic,
    /// Median of position-matched start-time deltas.
    Statistical,
    /// Half the difference of total track durations.
    Duration,
}

impl std::fmt::Display for OffsetMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OffsetMethod::Semantic => write!(f, "semantic"),
            OffsetMethod::Statistical => write!(f, "statistical"),
            OffsetMethod::Duration => write!(f, "duration"),
        }
    }
}
