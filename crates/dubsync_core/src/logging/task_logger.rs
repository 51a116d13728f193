//! Per-task logger writing to a dedicated file.
//!
//! Each worker gets its own logger so a task's full history survives in
//! one place even when many tasks interleave on the process log. Write
//! failures are swallowed: logging must never fail a task.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;

/// Buffered file logger scoped to one task.
pub struct TaskLogger {
    /// Task id, used in the log filename.
    task_id: String,
    /// Path to the log file.
    log_path: PathBuf,
    /// File writer (buffered). `None` after close.
    writer: Mutex<Option<BufWriter<File>>>,
}

impl TaskLogger {
    /// Create a logger writing to `<log_dir>/task_<id>.log`.
    pub fn create(task_id: impl Into<String>, log_dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let task_id = task_id.into();
        let log_dir = log_dir.as_ref();
        fs::create_dir_all(log_dir)?;

        let log_path = log_dir.join(format!("task_{}.log", task_id));
        let file = File::create(&log_path)?;

        Ok(Self {
            task_id,
            log_path,
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }

    /// Logger that discards everything. Used when the log file cannot
    /// be opened, since logging must never fail a task.
    pub fn disabled(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            log_path: PathBuf::new(),
            writer: Mutex::new(None),
        }
    }

    /// Get the task id.
    pub fn task_id(&self) -> &str {
        &self.task_id
    }

    /// Get the log file path.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Log an informational message.
    pub fn info(&self, message: &str) {
        self.write_line(message);
    }

    /// Log a warning.
    pub fn warn(&self, message: &str) {
        self.write_line(&format!("[WARNING] {}", message));
    }

    /// Log an error.
    pub fn error(&self, message: &str) {
        self.write_line(&format!("[ERROR] {}", message));
    }

    /// Log a pipeline phase marker.
    pub fn phase(&self, name: &str) {
        self.write_line(&format!("=== {} ===", name));
    }

    /// Log a success message.
    pub fn success(&self, message: &str) {
        self.write_line(&format!("[SUCCESS] {}", message));
    }

    /// Log an external command line.
    pub fn command(&self, command: &str) {
        self.write_line(&format!("$ {}", command));
    }

    /// Flush buffered output to disk.
    pub fn flush(&self) {
        if let Some(ref mut writer) = *self.writer.lock() {
            let _ = writer.flush();
        }
    }

    /// Flush and release the file handle.
    pub fn close(&self) {
        self.flush();
        *self.writer.lock() = None;
    }

    fn write_line(&self, message: &str) {
        let timestamp = Local::now().format("%H:%M:%S");
        if let Some(ref mut writer) = *self.writer.lock() {
            let _ = writeln!(writer, "[{}] {}", timestamp, message);
        }
    }
}

impl Drop for TaskLogger {
    fn drop(&mut self) {
        self.close();
    }
}
