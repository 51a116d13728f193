//! Per-task log files.

mod task_logger;

pub use task_logger::TaskLogger;
