//! Speech-to-text contract.

use std::path::Path;

use async_trait::async_trait;

use crate::models::Segment;

/// Turns an audio file into ordered, timestamped text segments
/// covering the whole duration.
///
/// Implementations must be deterministic (temperature-zero equivalent)
/// so repeated runs over identical audio yield identical offsets.
#[async_trait]
pub trait TranscriptionClient: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<Vec<Segment>, TranscriptionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("transcription api request failed: {0}")]
    ApiRequestFailed(String),

    #[error("invalid transcription response: {0}")]
    InvalidResponse(String),

    #[error("failed to read audio file {path}: {source}")]
    AudioRead {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
