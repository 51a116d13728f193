//! External inference capabilities.
//!
//! Speech-to-text and text-embedding are consumed through narrow async
//! contracts. Concrete clients speak HTTP to Whisper/OpenAI-compatible
//! endpoints; deterministic mocks back the test suites. Access always
//! goes through [`ResourceManager`], which gates grants on the memory
//! budget and releases held handles deterministically.

mod embedding;
mod http;
mod mock;
mod resources;
mod transcription;

pub use embedding::{EmbedError, Embedding, EmbeddingClient};
pub use http::{HttpEmbeddingClient, HttpTranscriptionClient};
pub use mock::{MockEmbeddingClient, MockTranscriptionClient};
pub use resources::ResourceManager;
pub use transcription::{TranscriptionClient, TranscriptionError};
