//! Core data model: tasks, segments, and offset estimates.

mod enums;
mod offset;
mod segment;
mod task;

pub use enums::{OffsetMethod, TaskStatus};
pub use offset::OffsetEstimate;
pub use segment::Segment;
pub use task::{StatusReport, Task, TaskSnapshot};
