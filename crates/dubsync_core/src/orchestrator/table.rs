//! Task table: the orchestrator's only shared mutable state.
//!
//! One coordinating mutex guards the whole map so a status record can
//! never be observed half-written. Workers do not hold entries across
//! await points; every access is a short exclusive section.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::models::{StatusReport, Task, TaskSnapshot, TaskStatus};

pub(super) struct TaskTable {
    tasks: Mutex<HashMap<String, Task>>,
}

impl TaskTable {
    pub(super) fn new() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
        }
    }

    pub(super) fn insert(&self, task: Task) {
        self.tasks.lock().insert(task.id.clone(), task);
    }

    /// Advances the progress bar and stage message. Progress is
    /// clamped to its running maximum so polls never see it regress.
    pub(super) fn set_progress(&self, id: &str, progress: u8, message: &str) {
        if let Some(task) = self.tasks.lock().get_mut(id) {
            if progress > task.progress {
                task.progress = progress;
            }
            task.message = message.to_string();
        }
    }

    pub(super) fn record_artifact(&self, id: &str, path: PathBuf) {
        if let Some(task) = self.tasks.lock().get_mut(id) {
            task.transient_artifacts.push(path);
        }
    }

    pub(super) fn set_computed_offset(&self, id: &str, offset: f64) {
        if let Some(task) = self.tasks.lock().get_mut(id) {
            task.computed_offset = Some(offset);
        }
    }

    pub(super) fn complete(&self, id: &str, result_path: PathBuf) {
        if let Some(task) = self.tasks.lock().get_mut(id) {
            task.status = TaskStatus::Completed;
            task.progress = 100;
            task.message = "Completed".to_string();
            task.result_path = Some(result_path);
        }
    }

    /// Moves the task to its error terminal state. The message keeps
    /// the last stage reached; the error field records the cause.
    pub(super) fn fail(&self, id: &str, error: String) {
        if let Some(task) = self.tasks.lock().get_mut(id) {
            task.status = TaskStatus::Error;
            task.error = Some(error);
        }
    }

    pub(super) fn status_report(&self, id: &str) -> Option<StatusReport> {
        self.tasks.lock().get(id).map(Task::status_report)
    }

    pub(super) fn snapshot(&self, id: &str) -> Option<TaskSnapshot> {
        self.tasks.lock().get(id).map(Task::snapshot)
    }

    /// Artifacts registered so far, drained for cleanup.
    pub(super) fn take_artifacts(&self, id: &str) -> Vec<PathBuf> {
        self.tasks
            .lock()
            .get_mut(id)
            .map(|task| std::mem::take(&mut task.transient_artifacts))
            .unwrap_or_default()
    }

    /// Detached copies of every task, newest first.
    pub(super) fn list(&self) -> Vec<TaskSnapshot> {
        let mut snapshots: Vec<TaskSnapshot> =
            self.tasks.lock().values().map(Task::snapshot).collect();
        snapshots.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        snapshots
    }

    /// Removes terminal tasks older than `retention` and returns them
    /// so the caller can dispose of their result files.
    pub(super) fn evict_expired(&self, retention: Duration, now: DateTime<Utc>) -> Vec<Task> {
        let mut tasks = self.tasks.lock();
        let expired: Vec<String> = tasks
            .iter()
            .filter(|(_, task)| task.status.is_terminal() && now - task.created_at >= retention)
            .map(|(id, _)| id.clone())
            .collect();
        expired
            .into_iter()
            .filter_map(|id| tasks.remove(&id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::*;

    fn table_with(id: &str) -> TaskTable {
        let table = TaskTable::new();
        table.insert(Task::new(id, "/a.mkv", "/b.mkv", None));
        table
    }

    #[test]
    fn progress_never_regresses() {
        let table = table_with("t1");
        table.set_progress("t1", 45, "Transcribing");
        table.set_progress("t1", 25, "stale update");

        let report = table.status_report("t1").unwrap();
        assert_eq!(report.progress, 45);
        assert_eq!(report.message, "stale update");
    }

    #[test]
    fn failure_keeps_last_stage_message() {
        let table = table_with("t1");
        table.set_progress("t1", 95, "Remuxing final output");
        table.fail("t1", "ffmpeg failed with exit code 1: boom".to_string());

        let report = table.status_report("t1").unwrap();
        assert_eq!(report.status, TaskStatus::Error);
        assert_eq!(report.message, "Remuxing final output");
        assert_eq!(
            report.error.as_deref(),
            Some("ffmpeg failed with exit code 1: boom")
        );
        assert_eq!(report.progress, 95);
    }

    #[test]
    fn completion_pins_progress_to_one_hundred() {
        let table = table_with("t1");
        table.complete("t1", PathBuf::from("/out/synced.mkv"));

        let snapshot = table.snapshot("t1").unwrap();
        assert_eq!(snapshot.status, TaskStatus::Completed);
        assert_eq!(snapshot.progress, 100);
        assert_eq!(snapshot.result_path.as_deref(), Some(Path::new("/out/synced.mkv")));
    }

    #[test]
    fn eviction_skips_running_and_recent_tasks() {
        let table = TaskTable::new();
        table.insert(Task::new("running", "/a.mkv", "/b.mkv", None));
        table.insert(Task::new("done", "/a.mkv", "/b.mkv", None));
        table.complete("done", PathBuf::from("/out/x.mkv"));

        // Nothing is old enough yet.
        let evicted = table.evict_expired(Duration::hours(1), Utc::now());
        assert!(evicted.is_empty());

        // A day later only the terminal task goes.
        let later = Utc::now() + Duration::hours(25);
        let evicted = table.evict_expired(Duration::hours(24), later);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].id, "done");
        assert!(table.snapshot("running").is_some());
        assert!(table.snapshot("done").is_none());
    }

    #[test]
    fn unknown_ids_are_ignored_quietly() {
        let table = TaskTable::new();
        table.set_progress("ghost", 50, "nope");
        table.fail("ghost", "nope".to_string());
        assert!(table.status_report("ghost").is_none());
        assert!(table.take_artifacts("ghost").is_empty());
    }
}
