//! Memory Tiering — ephemeral vs. durable classification of new memories.
//!
//! A memory's tier is decided once, at write time, by comparing its
//! importance to the long-term threshold.  Durable memories are also
//! vectorized into the episodic index.  A vectorization failure is logged
//! and the memory stays stored; only a dimension mismatch is surfaced.

use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{AnimaError, Result};
use crate::memory::EpisodicMemory;
use crate::store::DocumentStore;
use crate::types::{MemorySource, MemoryTier, Ordinal};
use crate::vectorizer::VectorizationPipeline;

/// Outcome of a memory write.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMemory {
    /// The stored record.
    pub memory: EpisodicMemory,
    /// Episodic-index ordinal when the memory was vectorized.
    pub ordinal: Option<Ordinal>,
}

/// Writes episodic memories and keeps the episodic index in step.
pub struct MemoryTiering {
    store: Arc<dyn DocumentStore>,
    episodic: Arc<VectorizationPipeline>,
    default_threshold: f32,
}

impl MemoryTiering {
    /// Create a tiering service writing to `store` and `episodic`.
    #[must_use]
    pub fn new(
        store: Arc<dyn DocumentStore>,
        episodic: Arc<VectorizationPipeline>,
        default_threshold: f32,
    ) -> Self {
        Self {
            store,
            episodic,
            default_threshold,
        }
    }

    /// Store a new memory, vectorizing it when durable.
    ///
    /// `threshold` overrides the default long-term threshold (per-NPC
    /// configuration).
    ///
    /// # Errors
    ///
    /// Returns document-store errors and
    /// [`AnimaError::DimensionMismatch`]; other vectorization failures are
    /// logged and swallowed.
    pub async fn write_memory(
        &self,
        npc_id: &str,
        content: &str,
        source: MemorySource,
        importance: f32,
        tags: Vec<String>,
        threshold: Option<f32>,
    ) -> Result<StoredMemory> {
        let threshold = threshold.unwrap_or(self.default_threshold);
        let memory = EpisodicMemory::new(npc_id, content, source, importance, tags, threshold);
        self.store.insert_memory(&memory).await?;

        let ordinal = if memory.is_durable() {
            self.index(&memory).await?
        } else {
            None
        };
        info!(
            npc_id,
            memory_id = %memory.id,
            source = source.as_str(),
            importance = memory.importance,
            durable = memory.is_durable(),
            "memory written"
        );
        Ok(StoredMemory { memory, ordinal })
    }

    /// Manually promote an ephemeral memory to durable and vectorize it.
    ///
    /// Promoting an already-durable memory is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`AnimaError::NotFound`] for an unknown id, plus the errors
    /// of [`write_memory`](Self::write_memory).
    pub async fn promote(&self, memory_id: &str) -> Result<StoredMemory> {
        let mut memory = self
            .store
            .get_memory(memory_id)
            .await?
            .ok_or_else(|| AnimaError::not_found("memory", memory_id))?;
        if memory.is_durable() {
            return Ok(StoredMemory { memory, ordinal: None });
        }
        self.store.set_memory_tier(memory_id, MemoryTier::Durable).await?;
        memory.tier = MemoryTier::Durable;
        let ordinal = self.index(&memory).await?;
        info!(memory_id, "memory promoted to durable");
        Ok(StoredMemory { memory, ordinal })
    }

    async fn index(&self, memory: &EpisodicMemory) -> Result<Option<Ordinal>> {
        match self.episodic.vectorize_memory(memory).await {
            Ok(ordinal) => Ok(Some(ordinal)),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                warn!(memory_id = %memory.id, error = %err, "failed to vectorize memory");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbeddingService;
    use crate::store::InMemoryDocumentStore;
    use crate::types::IndexKind;

    fn setup(dir: &std::path::Path, svc: Arc<HashEmbeddingService>) -> (MemoryTiering, Arc<InMemoryDocumentStore>, Arc<VectorizationPipeline>) {
        let store = Arc::new(InMemoryDocumentStore::new());
        let pipeline = Arc::new(VectorizationPipeline::new(
            IndexKind::Episodic,
            16,
            &dir.join("idx"),
            &dir.join("meta"),
            svc,
        ));
        let tiering = MemoryTiering::new(store.clone(), Arc::clone(&pipeline), 0.7);
        (tiering, store, pipeline)
    }

    #[tokio::test]
    async fn important_memory_is_durable_and_vectorized_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = Arc::new(HashEmbeddingService::new(16));
        let (tiering, _, pipeline) = setup(dir.path(), svc.clone());
        let stored = tiering
            .write_memory("npc_1", "the king died", MemorySource::Observation, 0.75, vec![], None)
            .await
            .expect("write");
        assert_eq!(stored.memory.tier, MemoryTier::Durable);
        assert_eq!(stored.ordinal, Some(0));
        assert_eq!(svc.calls(), 1);
        assert_eq!(pipeline.len().expect("len"), 1);
    }

    #[tokio::test]
    async fn low_importance_stays_ephemeral() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = Arc::new(HashEmbeddingService::new(16));
        let (tiering, store, _) = setup(dir.path(), svc.clone());
        let stored = tiering
            .write_memory("npc_1", "a cat yawned", MemorySource::Observation, 0.3, vec![], None)
            .await
            .expect("write");
        assert_eq!(stored.memory.tier, MemoryTier::Ephemeral);
        assert_eq!(svc.calls(), 0);
        assert_eq!(store.memory_count(), 1);
    }

    #[tokio::test]
    async fn per_npc_threshold_overrides_default() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = Arc::new(HashEmbeddingService::new(16));
        let (tiering, _, _) = setup(dir.path(), svc);
        let stored = tiering
            .write_memory("npc_1", "a cat yawned", MemorySource::Observation, 0.3, vec![], Some(0.2))
            .await
            .expect("write");
        assert!(stored.memory.is_durable());
    }

    #[tokio::test]
    async fn vectorization_failure_keeps_memory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = Arc::new(HashEmbeddingService::new(16).with_failure_marker("dragon"));
        let (tiering, store, _) = setup(dir.path(), svc);
        let stored = tiering
            .write_memory("npc_1", "a dragon landed", MemorySource::Observation, 0.95, vec![], None)
            .await
            .expect("write succeeds");
        assert!(stored.ordinal.is_none());
        assert_eq!(store.memory_count(), 1);
    }

    #[tokio::test]
    async fn promote_vectorizes_and_unknown_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let svc = Arc::new(HashEmbeddingService::new(16));
        let (tiering, store, pipeline) = setup(dir.path(), svc);
        let stored = tiering
            .write_memory("npc_1", "found a coin", MemorySource::Observation, 0.2, vec![], None)
            .await
            .expect("write");
        let promoted = tiering.promote(&stored.memory.id).await.expect("promote");
        assert!(promoted.memory.is_durable());
        assert_eq!(pipeline.len().expect("len"), 1);
        let reloaded = store.get_memory(&stored.memory.id).await.expect("get").expect("Some");
        assert!(reloaded.is_durable());

        let err = tiering.promote("mem_missing").await.expect_err("missing");
        assert!(matches!(err, AnimaError::NotFound { .. }));
    }
}
