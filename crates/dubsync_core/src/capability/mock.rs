//! Deterministic in-memory capability clients for tests.

use std::collections::hash_map::DefaultHasher;
use std::collections::VecDeque;
use std::hash::{Hash, Hasher};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::embedding::{EmbedError, Embedding, EmbeddingClient};
use super::transcription::{TranscriptionClient, TranscriptionError};
use crate::models::Segment;

/// Transcription client that replays canned segment lists in order.
///
/// Each `transcribe` call pops the next queued response, so a test can
/// enqueue the original track's segments followed by the dubbed track's.
pub struct MockTranscriptionClient {
    responses: Mutex<VecDeque<Vec<Segment>>>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockTranscriptionClient {
    pub fn with_responses(responses: Vec<Vec<Segment>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Client whose every call fails with an API error.
    pub fn failing() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranscriptionClient for MockTranscriptionClient {
    async fn transcribe(&self, _audio_path: &Path) -> Result<Vec<Segment>, TranscriptionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(TranscriptionError::ApiRequestFailed(
                "simulated transcription failure".to_string(),
            ));
        }
        let mut queue = self.responses.lock();
        queue.pop_front().ok_or_else(|| {
            TranscriptionError::InvalidResponse("no queued response".to_string())
        })
    }
}

/// Embedding client that derives a vector from a hash of the text.
///
/// Identical texts always map to identical vectors, so the highest
/// cosine similarity lands on exact text matches.
pub struct MockEmbeddingClient {
    fail: bool,
    calls: AtomicUsize,
}

impl MockEmbeddingClient {
    pub fn new() -> Self {
        Self {
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Client whose every call fails with an API error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(text: &str) -> Embedding {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut state = hasher.finish() | 1;
        let values = (0..8)
            .map(|_| {
                // xorshift over the text hash keeps the vector stable per text
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                ((state >> 11) as f32 / (1u64 << 53) as f32) * 2.0 - 1.0
            })
            .collect();
        Embedding::new(values)
    }
}

impl Default for MockEmbeddingClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingClient for MockEmbeddingClient {
    async fn embed(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EmbedError::ApiRequestFailed(
                "simulated embedding failure".to_string(),
            ));
        }
        Ok(texts.iter().map(|t| Self::vector_for(t)).collect())
    }
}
