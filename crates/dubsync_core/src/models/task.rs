//! Task records owned by the orchestrator.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::TaskStatus;

/// One synchronization job.
///
/// Exclusively owned and mutated by the orchestrator's task table; all
/// other components see detached copies. Tasks live in memory only:
/// a process restart forgets them, and a retention sweep evicts
/// terminal tasks after a configured window.
#[derive(Debug, Clone)]
pub struct Task {
    /// Unique id (UUID v4).
    pub id: String,
    /// Lifecycle state.
    pub status: TaskStatus,
    /// Completion percentage, 0-100. Never decreases while processing.
    pub progress: u8,
    /// Human-readable description of the current stage.
    pub message: String,
    /// Reference video path.
    pub original_path: PathBuf,
    /// Dubbed media path.
    pub dubbed_path: PathBuf,
    /// Optional output file name requested by the caller.
    pub custom_output_name: Option<String>,
    /// Submission time (UTC).
    pub created_at: DateTime<Utc>,
    /// Offset chosen by the estimator, once known.
    pub computed_offset: Option<f64>,
    /// Final container path, set on completion.
    pub result_path: Option<PathBuf>,
    /// Error text for failed tasks, stored verbatim.
    pub error: Option<String>,
    /// Intermediate files to delete during cleanup.
    pub transient_artifacts: Vec<PathBuf>,
}

impl Task {
    /// Create a freshly submitted task.
    pub fn new(
        id: impl Into<String>,
        original_path: impl Into<PathBuf>,
        dubbed_path: impl Into<PathBuf>,
        custom_output_name: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Processing,
            progress: 0,
            message: "Queued".to_string(),
            original_path: original_path.into(),
            dubbed_path: dubbed_path.into(),
            custom_output_name,
            created_at: Utc::now(),
            computed_offset: None,
            result_path: None,
            error: None,
            transient_artifacts: Vec::new(),
        }
    }

    /// Detached view for listings.
    pub fn snapshot(&self) -> TaskSnapshot {
        TaskSnapshot {
            id: self.id.clone(),
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            created_at: self.created_at,
            computed_offset: self.computed_offset,
            result_path: self.result_path.clone(),
            error: self.error.clone(),
        }
    }

    /// Detached view for status polling.
    pub fn status_report(&self) -> StatusReport {
        StatusReport {
            status: self.status,
            progress: self.progress,
            message: self.message.clone(),
            error: self.error.clone(),
        }
    }
}

/// Point-in-time copy of a task for `list_tasks`.
///
/// Eventually consistent with concurrent mutation: a snapshot taken
/// while a task advances may lag by a checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub id: String,
    pub status: TaskStatus,
    pub progress: u8,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub computed_offset: Option<f64>,
    pub result_path: Option<PathBuf>,
    pub error: Option<String>,
}

/// Answer to a `get_status` query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: TaskStatus,
    pub progress: u8,
    pub message: String,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_task_starts_processing_at_zero() {
        let task = Task::new("t1", "/a.mkv", "/b.mkv", None);
        assert_eq!(task.status, TaskStatus::Processing);
        assert_eq!(task.progress, 0);
        assert!(task.error.is_none());
        assert!(task.result_path.is_none());
        assert!(task.transient_artifacts.is_empty());
    }

    #[test]
    fn snapshot_detaches_fields() {
        let mut task = Task::new("t2", "/a.mkv", "/b.mkv", Some("out".into()));
        task.progress = 45;
        task.message = "Transcribing".into();

        let snap = task.snapshot();
        assert_eq!(snap.id, "t2");
        assert_eq!(snap.progress, 45);
        assert_eq!(snap.message, "Transcribing");
    }
}
