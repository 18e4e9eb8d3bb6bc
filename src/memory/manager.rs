//! Record lifecycle and the caller-facing operations.
//!
//! [`MemoryManager`] owns creation (tag/type/metadata handling), delegates
//! embedding and search to the [`VectorStore`](crate::vector::VectorStore)
//! coordinator, and exposes aggregate statistics. Every operation is
//! owner-scoped and fails with [`MemoryError::MissingOwner`] before any
//! other work when the owner is blank.

use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::RetrievalConfig;
use crate::error::MemoryError;
use crate::memory::types::{MemoryRecord, NewMemory, SearchOptions, SimilarityResult};
use crate::memory::{stats, store};
use crate::vector::VectorStore;

/// What happened to the local-index mirror for a newly added record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorStatus {
    /// Embedded and mirrored into the local fallback index.
    Mirrored,
    /// No embedding produced; the record is reachable via substring
    /// search only and never enters the local index.
    NoEmbedding,
    /// Embedded and persisted, but the local index was full. The durable
    /// store still accepted the record.
    CapacityExceeded,
    /// The local index rejected the vector. Fallback coverage is missing
    /// for this record until the next rebuild.
    Failed,
}

/// Result of [`MemoryManager::add_memory`].
#[derive(Debug)]
pub struct AddMemoryOutcome {
    pub record: MemoryRecord,
    pub mirror: MirrorStatus,
}

/// Caller-facing memory operations over the shared durable store and the
/// vector store coordinator. Constructed explicitly and handed to
/// dependents — no ambient global state.
pub struct MemoryManager {
    db: Arc<Mutex<Connection>>,
    vectors: Arc<VectorStore>,
    default_limit: usize,
    default_threshold: f32,
}

impl MemoryManager {
    pub fn new(
        db: Arc<Mutex<Connection>>,
        vectors: Arc<VectorStore>,
        retrieval: &RetrievalConfig,
    ) -> Self {
        Self {
            db,
            vectors,
            default_limit: retrieval.default_limit,
            default_threshold: retrieval.default_threshold,
        }
    }

    /// Create a memory record: embed (when available), persist, mirror.
    pub async fn add_memory(
        &self,
        owner: &str,
        memory: NewMemory,
    ) -> Result<AddMemoryOutcome, MemoryError> {
        if owner.trim().is_empty() {
            return Err(MemoryError::MissingOwner);
        }
        if memory.content.trim().is_empty() {
            return Err(MemoryError::EmptyContent);
        }

        let embedding = self.vectors.embed(&memory.content).await;

        let record = store::insert_record(
            &mut self.conn(),
            owner,
            &memory,
            embedding.as_deref(),
        )?;

        let mirror = match &embedding {
            None => MirrorStatus::NoEmbedding,
            Some(vector) => {
                match self
                    .vectors
                    .mirror_insert(&record.id, owner, &record.content, vector)
                {
                    Ok(()) => MirrorStatus::Mirrored,
                    Err(MemoryError::LocalIndexCapacityExceeded { capacity }) => {
                        tracing::warn!(
                            capacity,
                            id = %record.id,
                            "local index full, record persisted without a mirror"
                        );
                        MirrorStatus::CapacityExceeded
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, id = %record.id, "mirror insert failed");
                        MirrorStatus::Failed
                    }
                }
            }
        };

        tracing::debug!(id = %record.id, owner, mirror = ?mirror, "memory added");
        Ok(AddMemoryOutcome { record, mirror })
    }

    /// Ranked similarity search with defaults applied
    /// (limit 5, threshold 0.7 on the ranked path).
    pub async fn search_memories(
        &self,
        owner: &str,
        query: &str,
        options: SearchOptions,
    ) -> Result<Vec<SimilarityResult>, MemoryError> {
        let threshold = options
            .threshold
            .unwrap_or(self.default_threshold)
            .clamp(0.0, 1.0);
        let limit = options.limit.unwrap_or(self.default_limit);
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.vectors
            .search(owner, query, threshold, limit, options.memory_type)
            .await
    }

    /// Aggregate statistics for one owner.
    pub fn get_stats(&self, owner: &str) -> Result<crate::memory::types::MemoryStats, MemoryError> {
        if owner.trim().is_empty() {
            return Err(MemoryError::MissingOwner);
        }
        Ok(stats::memory_stats(&self.conn(), owner)?)
    }

    /// All records for one owner, newest first.
    pub fn list_memories(&self, owner: &str) -> Result<Vec<MemoryRecord>, MemoryError> {
        if owner.trim().is_empty() {
            return Err(MemoryError::MissingOwner);
        }
        Ok(store::list_by_owner(&self.conn(), owner)?)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RetrievalConfig;
    use crate::db;
    use crate::embedding::{EmbeddingGenerator, EMBEDDING_DIM};
    use crate::vector::backend::SqliteBackend;
    use async_trait::async_trait;

    /// Deterministic embedder: a unit spike at a position derived from the
    /// text length, so equal texts embed identically.
    struct TestEmbedder {
        enabled: bool,
    }

    #[async_trait]
    impl EmbeddingGenerator for TestEmbedder {
        async fn embed(&self, text: &str) -> Option<Vec<f32>> {
            if !self.enabled {
                return None;
            }
            let mut v = vec![0.0f32; EMBEDDING_DIM];
            v[text.len() % EMBEDDING_DIM] = 1.0;
            Some(v)
        }
    }

    fn manager(embeddings_enabled: bool, capacity: usize) -> MemoryManager {
        let db = Arc::new(Mutex::new(db::open_memory_database().unwrap()));
        let backend = Arc::new(SqliteBackend::new(db.clone(), 4));
        let vectors = Arc::new(VectorStore::new(
            Arc::new(TestEmbedder {
                enabled: embeddings_enabled,
            }),
            backend,
            capacity,
        ));
        MemoryManager::new(db, vectors, &RetrievalConfig::default())
    }

    fn note(content: &str) -> NewMemory {
        NewMemory {
            title: "note".into(),
            content: content.into(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn add_then_search_self_match() {
        let manager = manager(true, 64);
        let outcome = manager.add_memory("u1", note("the sky is blue")).await.unwrap();
        assert_eq!(outcome.mirror, MirrorStatus::Mirrored);

        let results = manager
            .search_memories("u1", "the sky is blue", SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, outcome.record.id);
        assert!(results[0].similarity >= 0.7);
    }

    #[tokio::test]
    async fn blank_owner_is_rejected_everywhere() {
        let manager = manager(true, 64);

        let err = manager.add_memory("", note("x")).await.unwrap_err();
        assert!(matches!(err, MemoryError::MissingOwner));

        let err = manager
            .search_memories(" \t", "x", SearchOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, MemoryError::MissingOwner));

        assert!(matches!(
            manager.get_stats("").unwrap_err(),
            MemoryError::MissingOwner
        ));
    }

    #[tokio::test]
    async fn empty_content_is_rejected_before_embedding() {
        let manager = manager(true, 64);
        let err = manager.add_memory("u1", note("  ")).await.unwrap_err();
        assert!(matches!(err, MemoryError::EmptyContent));
    }

    #[tokio::test]
    async fn disabled_embeddings_store_without_mirror_and_search_by_substring() {
        let manager = manager(false, 64);
        let outcome = manager.add_memory("u1", note("the sky is blue")).await.unwrap();
        assert_eq!(outcome.mirror, MirrorStatus::NoEmbedding);
        assert!(!outcome.record.has_embedding);

        let results = manager
            .search_memories("u1", "sky", SearchOptions::default())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(
            results[0].similarity,
            crate::memory::types::SUBSTRING_SENTINEL_SCORE
        );
    }

    #[tokio::test]
    async fn capacity_overflow_keeps_durable_record() {
        let manager = manager(true, 2);
        // Distinct content lengths → distinct embedding spikes
        assert_eq!(
            manager.add_memory("u1", note("a")).await.unwrap().mirror,
            MirrorStatus::Mirrored
        );
        assert_eq!(
            manager.add_memory("u1", note("bb")).await.unwrap().mirror,
            MirrorStatus::Mirrored
        );
        let third = manager.add_memory("u1", note("ccc")).await.unwrap();
        assert_eq!(third.mirror, MirrorStatus::CapacityExceeded);

        // All three persisted regardless
        assert_eq!(manager.get_stats("u1").unwrap().total, 3);
    }

    #[tokio::test]
    async fn search_limit_zero_returns_empty() {
        let manager = manager(true, 64);
        manager.add_memory("u1", note("something")).await.unwrap();
        let results = manager
            .search_memories(
                "u1",
                "something",
                SearchOptions {
                    limit: Some(0),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(results.is_empty());
    }
}
