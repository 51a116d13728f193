//! DubSync Core - dubbed-audio synchronization engine
//!
//! This crate contains all business logic with zero UI dependencies:
//! audio extraction and remuxing through ffmpeg, transcript-driven
//! offset estimation, and the task orchestration around them. It can
//! be used by the CLI binary or embedded behind another surface.

pub mod capability;
pub mod config;
pub mod error;
pub mod estimator;
pub mod logging;
pub mod media;
pub mod models;
pub mod orchestrator;
pub mod transcript;

pub use error::{SyncError, SyncResult};
pub use orchestrator::{SyncRequest, TaskOrchestrator};

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_returns_value() {
        assert!(!version().is_empty());
    }
}
