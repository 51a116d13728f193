//! Memory-gated access to the capability clients.
//!
//! Transcription and embedding backends are expensive to keep around,
//! so they are built lazily through injected factories, cached until
//! [`ResourceManager::release`], and only granted while system memory
//! utilization sits under a configurable ceiling. A denied grant is not
//! an error: callers degrade to the offset paths that need no client.

use std::sync::Arc;

use parking_lot::Mutex;
use sysinfo::System;

use super::embedding::EmbeddingClient;
use super::transcription::TranscriptionClient;

type UtilizationProbe = Box<dyn Fn() -> f64 + Send + Sync>;
type TranscriptionFactory = Box<dyn Fn() -> Arc<dyn TranscriptionClient> + Send + Sync>;
type EmbeddingFactory = Box<dyn Fn() -> Arc<dyn EmbeddingClient> + Send + Sync>;

pub struct ResourceManager {
    memory_ceiling: f64,
    probe: UtilizationProbe,
    transcription_factory: Option<TranscriptionFactory>,
    embedding_factory: Option<EmbeddingFactory>,
    transcription_cache: Mutex<Option<Arc<dyn TranscriptionClient>>>,
    embedding_cache: Mutex<Option<Arc<dyn EmbeddingClient>>>,
}

impl ResourceManager {
    /// Manager with the system-memory probe and no clients configured.
    pub fn new(memory_ceiling: f64) -> Self {
        let system = Mutex::new(System::new());
        let probe: UtilizationProbe = Box::new(move || {
            let mut sys = system.lock();
            sys.refresh_memory();
            let total = sys.total_memory();
            if total == 0 {
                return 0.0;
            }
            sys.used_memory() as f64 / total as f64
        });
        Self {
            memory_ceiling,
            probe,
            transcription_factory: None,
            embedding_factory: None,
            transcription_cache: Mutex::new(None),
            embedding_cache: Mutex::new(None),
        }
    }

    /// Replaces the memory probe. Tests use this to simulate pressure.
    pub fn with_utilization_probe(
        mut self,
        probe: impl Fn() -> f64 + Send + Sync + 'static,
    ) -> Self {
        self.probe = Box::new(probe);
        self
    }

    pub fn with_transcription_factory(
        mut self,
        factory: impl Fn() -> Arc<dyn TranscriptionClient> + Send + Sync + 'static,
    ) -> Self {
        self.transcription_factory = Some(Box::new(factory));
        self
    }

    pub fn with_embedding_factory(
        mut self,
        factory: impl Fn() -> Arc<dyn EmbeddingClient> + Send + Sync + 'static,
    ) -> Self {
        self.embedding_factory = Some(Box::new(factory));
        self
    }

    /// Fraction of system memory currently in use, in `[0, 1]`.
    pub fn memory_utilization(&self) -> f64 {
        (self.probe)()
    }

    /// Whether a new client may be built right now.
    pub fn check_budget(&self) -> bool {
        let utilization = self.memory_utilization();
        let ok = utilization < self.memory_ceiling;
        if !ok {
            tracing::warn!(
                utilization = format!("{:.1}%", utilization * 100.0),
                ceiling = format!("{:.1}%", self.memory_ceiling * 100.0),
                "Memory budget exceeded, denying capability grant"
            );
        }
        ok
    }

    /// Transcription client, or `None` when unconfigured or over budget.
    ///
    /// The first grant builds the client; later grants reuse the cache
    /// without re-checking the budget, since the memory was already paid.
    pub fn transcription(&self) -> Option<Arc<dyn TranscriptionClient>> {
        let mut cache = self.transcription_cache.lock();
        if let Some(client) = cache.as_ref() {
            return Some(Arc::clone(client));
        }
        let factory = self.transcription_factory.as_ref()?;
        if !self.check_budget() {
            return None;
        }
        let client = factory();
        *cache = Some(Arc::clone(&client));
        Some(client)
    }

    /// Embedding client, or `None` when unconfigured or over budget.
    pub fn embedding(&self) -> Option<Arc<dyn EmbeddingClient>> {
        let mut cache = self.embedding_cache.lock();
        if let Some(client) = cache.as_ref() {
            return Some(Arc::clone(client));
        }
        let factory = self.embedding_factory.as_ref()?;
        if !self.check_budget() {
            return None;
        }
        let client = factory();
        *cache = Some(Arc::clone(&client));
        Some(client)
    }

    /// Drops the cached clients. Safe to call repeatedly; the next
    /// grant rebuilds through the factories.
    pub fn release(&self) {
        let dropped_t = self.transcription_cache.lock().take().is_some();
        let dropped_e = self.embedding_cache.lock().take().is_some();
        if dropped_t || dropped_e {
            tracing::debug!("Released cached capability clients");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::capability::{MockEmbeddingClient, MockTranscriptionClient};

    fn manager_with_mocks(utilization: f64) -> (Arc<AtomicUsize>, ResourceManager) {
        let builds = Arc::new(AtomicUsize::new(0));
        let builds_t = Arc::clone(&builds);
        let manager = ResourceManager::new(0.85)
            .with_utilization_probe(move || utilization)
            .with_transcription_factory(move || {
                builds_t.fetch_add(1, Ordering::SeqCst);
                Arc::new(MockTranscriptionClient::with_responses(vec![]))
            })
            .with_embedding_factory(|| Arc::new(MockEmbeddingClient::new()));
        (builds, manager)
    }

    #[test]
    fn grants_and_caches_under_budget() {
        let (builds, manager) = manager_with_mocks(0.40);

        assert!(manager.transcription().is_some());
        assert!(manager.transcription().is_some());
        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert!(manager.embedding().is_some());
    }

    #[test]
    fn denies_over_budget() {
        let (builds, manager) = manager_with_mocks(0.95);

        assert!(manager.transcription().is_none());
        assert!(manager.embedding().is_none());
        assert_eq!(builds.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn unconfigured_capability_is_denied() {
        let manager = ResourceManager::new(0.85).with_utilization_probe(|| 0.10);
        assert!(manager.transcription().is_none());
        assert!(manager.embedding().is_none());
    }

    #[test]
    fn release_forces_rebuild() {
        let (builds, manager) = manager_with_mocks(0.40);

        assert!(manager.transcription().is_some());
        manager.release();
        manager.release();
        assert!(manager.transcription().is_some());
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn budget_boundary_is_exclusive() {
        let manager = ResourceManager::new(0.85).with_utilization_probe(|| 0.85);
        assert!(!manager.check_budget());
    }
}
