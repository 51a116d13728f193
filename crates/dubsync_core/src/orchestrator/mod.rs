//! Task orchestration.
//!
//! Each submitted job runs the synchronization pipeline on its own
//! `tokio` worker:
//!
//! ```text
//! submit ──► worker
//!              ├── verify inputs
//!              ├── extract original / dubbed audio
//!              ├── transcribe both tracks   (capability-gated)
//!              ├── estimate offset          (semantic → statistical → duration)
//!              ├── apply offset
//!              ├── remux final container
//!              └── cleanup                  (always, success or failure)
//! ```
//!
//! Pollers follow a task through `get_status`; the result file is
//! handed out by `get_result_path` once the task completes. Terminal
//! tasks age out of the table via `evict_expired`.

mod pipeline;
mod table;

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::capability::ResourceManager;
use crate::config::Settings;
use crate::error::{SyncError, SyncResult};
use crate::estimator::OffsetEstimator;
use crate::logging::TaskLogger;
use crate::media::MediaTranscoder;
use crate::models::{StatusReport, Task, TaskSnapshot, TaskStatus};
use table::TaskTable;

/// One synchronization job: a reference video and the dubbed track to
/// align with it.
#[derive(Debug, Clone)]
pub struct SyncRequest {
    pub original_path: PathBuf,
    pub dubbed_path: PathBuf,
    pub output_name: Option<String>,
}

impl SyncRequest {
    pub fn new(original: impl Into<PathBuf>, dubbed: impl Into<PathBuf>) -> Self {
        Self {
            original_path: original.into(),
            dubbed_path: dubbed.into(),
            output_name: None,
        }
    }

    /// Requests a specific output file name instead of the generated
    /// `synced_<task_id>.mkv`.
    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }
}

struct Inner {
    settings: Settings,
    transcoder: Arc<dyn MediaTranscoder>,
    resources: Arc<ResourceManager>,
    estimator: OffsetEstimator,
    table: TaskTable,
}

/// Owns the task table and spawns one worker per submitted request.
#[derive(Clone)]
pub struct TaskOrchestrator {
    inner: Arc<Inner>,
}

impl TaskOrchestrator {
    pub fn new(
        settings: Settings,
        transcoder: Arc<dyn MediaTranscoder>,
        resources: Arc<ResourceManager>,
    ) -> Self {
        let estimator = OffsetEstimator::new(settings.estimator.clone());
        Self {
            inner: Arc::new(Inner {
                settings,
                transcoder,
                resources,
                estimator,
                table: TaskTable::new(),
            }),
        }
    }

    /// Registers the task and spawns its worker. Returns the task id
    /// immediately; validation failures surface through `get_status`.
    pub fn submit(&self, request: SyncRequest) -> String {
        let task_id = Uuid::new_v4().to_string();
        self.inner.table.insert(Task::new(
            &task_id,
            request.original_path.clone(),
            request.dubbed_path.clone(),
            request.output_name.clone(),
        ));
        tracing::info!(
            task_id = %task_id,
            original = %request.original_path.display(),
            dubbed = %request.dubbed_path.display(),
            "Task submitted"
        );

        let inner = Arc::clone(&self.inner);
        let id = task_id.clone();
        tokio::spawn(async move {
            run_task(inner, id, request).await;
        });
        task_id
    }

    pub fn get_status(&self, task_id: &str) -> SyncResult<StatusReport> {
        self.inner
            .table
            .status_report(task_id)
            .ok_or_else(|| SyncError::task_not_found(task_id))
    }

    /// Path of the finished container. Valid only once the task has
    /// completed.
    pub fn get_result_path(&self, task_id: &str) -> SyncResult<PathBuf> {
        let snapshot = self
            .inner
            .table
            .snapshot(task_id)
            .ok_or_else(|| SyncError::task_not_found(task_id))?;
        match (snapshot.status, snapshot.result_path) {
            (TaskStatus::Completed, Some(path)) => Ok(path),
            (status, _) => Err(SyncError::result_not_ready(task_id, status)),
        }
    }

    /// Detached copies of every known task, newest first.
    pub fn list_tasks(&self) -> Vec<TaskSnapshot> {
        self.inner.table.list()
    }

    /// Drops terminal tasks older than the retention window, deleting
    /// their result files when auto-cleanup is on. Returns how many
    /// tasks went.
    pub fn evict_expired(&self) -> usize {
        let retention = chrono::Duration::hours(self.inner.settings.tasks.retention_hours as i64);
        let evicted = self.inner.table.evict_expired(retention, Utc::now());
        for task in &evicted {
            if self.inner.settings.tasks.auto_cleanup_results {
                if let Some(path) = &task.result_path {
                    match std::fs::remove_file(path) {
                        Ok(()) => {}
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => tracing::warn!(
                            task_id = %task.id,
                            error = %e,
                            "Could not remove evicted result file"
                        ),
                    }
                }
            }
            tracing::info!(task_id = %task.id, "Evicted expired task");
        }
        evicted.len()
    }

    /// Background retention sweep on a fixed interval.
    pub fn spawn_sweeper(&self) -> tokio::task::JoinHandle<()> {
        let orchestrator = self.clone();
        let minutes = self.inner.settings.tasks.sweep_interval_minutes.max(1);
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(std::time::Duration::from_secs(minutes * 60));
            // The first tick completes immediately; skip it so the
            // sweep starts one interval from now.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let evicted = orchestrator.evict_expired();
                if evicted > 0 {
                    tracing::debug!(evicted, "Retention sweep evicted tasks");
                }
            }
        })
    }
}

/// Worker body: run the pipeline, record the terminal state, always
/// clean up, always release held capabilities.
async fn run_task(inner: Arc<Inner>, task_id: String, request: SyncRequest) {
    let logger = TaskLogger::create(&task_id, &inner.settings.paths.logs_dir).unwrap_or_else(|e| {
        tracing::warn!(task_id = %task_id, error = %e, "Could not open task log file");
        TaskLogger::disabled(&task_id)
    });
    logger.info(&format!(
        "Syncing {} against {}",
        request.dubbed_path.display(),
        request.original_path.display()
    ));

    let handle = pipeline::TaskHandle::new(&inner.table, &task_id);
    match pipeline::run_sync(&inner, &request, &handle, &logger).await {
        Ok(result_path) => {
            inner.table.complete(&task_id, result_path.clone());
            logger.success(&format!("Output written to {}", result_path.display()));
            tracing::info!(task_id = %task_id, result = %result_path.display(), "Task completed");
        }
        Err(e) => {
            let message = e.to_string();
            logger.error(&message);
            tracing::error!(task_id = %task_id, error = %message, "Task failed");
            inner.table.fail(&task_id, message);
        }
    }

    cleanup_task(&inner, &task_id, &logger).await;
    inner.resources.release();
    logger.close();
}

async fn cleanup_task(inner: &Inner, task_id: &str, logger: &TaskLogger) {
    for artifact in inner.table.take_artifacts(task_id) {
        match tokio::fs::remove_file(&artifact).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => logger.warn(&format!("Could not remove {}: {}", artifact.display(), e)),
        }
    }

    let task_dir = std::path::Path::new(&inner.settings.paths.work_dir).join(task_id);
    match tokio::fs::remove_dir_all(&task_dir).await {
        Ok(()) => logger.info("Cleaned up working files"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => logger.warn(&format!("Could not remove {}: {}", task_dir.display(), e)),
    }
}
