//! Media tool boundary.
//!
//! Everything that shells out to ffmpeg/ffprobe sits behind the
//! [`MediaTranscoder`] trait so the pipeline can run against a fake in
//! tests. The real implementation lives in [`ffmpeg`].

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

mod ffmpeg;

pub use ffmpeg::FfmpegTranscoder;

pub type MediaResult<T> = Result<T, MediaError>;

/// Errors from external media tooling.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{tool} not found on PATH; install it or set its path in settings")]
    ToolNotFound { tool: String },

    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} failed with exit code {exit_code}: {message}")]
    CommandFailed {
        tool: String,
        exit_code: i32,
        message: String,
    },

    #[error("{tool} timed out after {seconds}s")]
    Timeout { tool: String, seconds: u64 },

    #[error("IO error while {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    #[error("invalid output: {0}")]
    InvalidOutput(String),
}

impl MediaError {
    pub fn tool_not_found(tool: impl Into<String>) -> Self {
        Self::ToolNotFound { tool: tool.into() }
    }

    pub fn spawn(tool: impl Into<String>, source: io::Error) -> Self {
        Self::Spawn {
            tool: tool.into(),
            source,
        }
    }

    pub fn command_failed(tool: impl Into<String>, exit_code: i32, message: impl Into<String>) -> Self {
        Self::CommandFailed {
            tool: tool.into(),
            exit_code,
            message: message.into(),
        }
    }

    pub fn timeout(tool: impl Into<String>, seconds: u64) -> Self {
        Self::Timeout {
            tool: tool.into(),
            seconds,
        }
    }

    pub fn io(operation: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    pub fn parse(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            what: what.into(),
            message: message.into(),
        }
    }

    pub fn invalid_output(message: impl Into<String>) -> Self {
        Self::InvalidOutput(message.into())
    }
}

/// Titles and languages stamped onto the two audio streams of the
/// remuxed container.
#[derive(Debug, Clone)]
pub struct TrackLabels {
    pub original_title: String,
    pub original_language: String,
    pub dubbed_title: String,
    pub dubbed_language: String,
}

impl Default for TrackLabels {
    fn default() -> Self {
        Self {
            original_title: "Original".to_string(),
            original_language: "eng".to_string(),
            dubbed_title: "Dubbed".to_string(),
            dubbed_language: "spa".to_string(),
        }
    }
}

/// Operations the sync pipeline needs from the media toolchain.
#[async_trait]
pub trait MediaTranscoder: Send + Sync {
    /// Extracts the audio track of `video` into a reproducible mono
    /// WAV at `output`.
    async fn extract_audio(&self, video: &Path, output: &Path) -> MediaResult<PathBuf>;

    /// Shifts `audio` by `offset_seconds` into `output`.
    ///
    /// A positive offset trims the lead (the track starts late), a
    /// negative one pads it with silence, and an offset inside the
    /// configured epsilon copies the file unchanged.
    async fn apply_offset(
        &self,
        audio: &Path,
        offset_seconds: f64,
        output: &Path,
    ) -> MediaResult<PathBuf>;

    /// Builds the final container: video copied from `video`, the
    /// original audio first, the synced dubbed audio second, both
    /// stamped with `labels`.
    async fn remux(
        &self,
        video: &Path,
        original_audio: &Path,
        synced_audio: &Path,
        output: &Path,
        labels: &TrackLabels,
    ) -> MediaResult<PathBuf>;

    /// Media duration in seconds via ffprobe.
    async fn probe_duration(&self, media: &Path) -> MediaResult<f64>;
}
