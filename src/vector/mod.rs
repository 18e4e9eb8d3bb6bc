//! Vector store coordination.
//!
//! [`VectorStore`] binds the embedding generator, the ranked similarity
//! backend, and the local fallback index into one search operation with a
//! fixed degradation policy:
//!
//! 1. blank owner → [`MemoryError::MissingOwner`], no backend touched;
//! 2. no embedding capability → substring search;
//! 3. ranked backend search — the success path;
//! 4. backend failure → local approximate index, best-effort; an empty or
//!    unusable index degrades to an empty result, never an error.
//!
//! The insertion path mirrors embedded records into the local index; the
//! dual write is not transactional, so [`VectorStore::rebuild_local_index`]
//! must run at process start to heal any divergence.

pub mod backend;
pub mod local;

use std::sync::Arc;

use crate::embedding::EmbeddingGenerator;
use crate::error::MemoryError;
use crate::memory::store::{truncate_snippet, SNIPPET_MAX_CHARS};
use crate::memory::types::{MemoryType, SimilarityResult};
use backend::SimilarityBackend;
use local::LocalVectorIndex;

/// Owner-scoped over-fetch factor for the local fallback: the index holds
/// every owner's vectors, so nearest neighbors are pulled with headroom
/// before filtering to the querying owner.
const LOCAL_FETCH_MULTIPLIER: usize = 4;

/// Coordinates embedding generation and the two-tier similarity search.
///
/// Explicitly constructed and passed to dependents; lifecycle is tied to
/// process start/stop, never an implicit global.
pub struct VectorStore {
    embedder: Arc<dyn EmbeddingGenerator>,
    backend: Arc<dyn SimilarityBackend>,
    local: LocalVectorIndex,
}

impl VectorStore {
    pub fn new(
        embedder: Arc<dyn EmbeddingGenerator>,
        backend: Arc<dyn SimilarityBackend>,
        index_capacity: usize,
    ) -> Self {
        let dimension = embedder.dimensions();
        Self {
            embedder,
            backend,
            local: LocalVectorIndex::new(dimension, index_capacity),
        }
    }

    /// Embed text for the insertion path. `None` means the generator is
    /// unavailable and the record will be stored without a vector.
    pub async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        self.embedder.embed(text).await
    }

    /// Similarity search with the full degradation policy.
    ///
    /// Always returns an ordered (possibly empty) sequence; backend or
    /// embedding unavailability never surfaces as an error. Only the owner
    /// contract violation does.
    pub async fn search(
        &self,
        owner: &str,
        query: &str,
        threshold: f32,
        limit: usize,
        type_filter: Option<MemoryType>,
    ) -> Result<Vec<SimilarityResult>, MemoryError> {
        if owner.trim().is_empty() {
            return Err(MemoryError::MissingOwner);
        }

        let Some(embedding) = self.embedder.embed(query).await else {
            // No embedding capability: substring search, threshold ignored.
            return Ok(self.substring_fallback(owner, query, limit));
        };

        match self
            .backend
            .ranked_search(owner, &embedding, threshold, limit, type_filter)
        {
            Ok(results) => Ok(results),
            Err(err) => {
                tracing::warn!(error = %err, "ranked search failed, falling back to local index");
                Ok(self.local_fallback(owner, &embedding, limit))
            }
        }
    }

    /// Mirror an embedded record into the local fallback index.
    ///
    /// Capacity exhaustion comes back as a distinct condition; the durable
    /// record already stands and must not be rolled back for it.
    pub fn mirror_insert(
        &self,
        record_id: &str,
        owner: &str,
        content: &str,
        embedding: &[f32],
    ) -> Result<(), MemoryError> {
        self.local.insert(
            embedding,
            record_id,
            owner,
            &truncate_snippet(content, SNIPPET_MAX_CHARS),
        )
    }

    /// Rebuild the local index from durable storage.
    ///
    /// Required at process start: the mirror write is best-effort, so a crash
    /// between the durable write and the mirror leaves the index stale until
    /// this runs. Returns the number of vectors mirrored.
    pub fn rebuild_local_index(&self) -> Result<usize, MemoryError> {
        let entries = self.backend.embedded_entries()?;
        let total = entries.len();
        let loaded = self.local.rebuild(
            entries
                .into_iter()
                .map(|e| (e.id, e.owner_id, e.snippet, e.embedding)),
        );
        tracing::info!(loaded, total, "local vector index rebuilt from durable store");
        Ok(loaded)
    }

    /// Number of vectors currently mirrored in the local index.
    pub fn local_index_len(&self) -> usize {
        self.local.len()
    }

    fn substring_fallback(&self, owner: &str, query: &str, limit: usize) -> Vec<SimilarityResult> {
        match self.backend.substring_search(owner, query, limit) {
            Ok(results) => results,
            Err(err) => {
                // Both tiers down: the caller gets "no matches", not a failure.
                tracing::warn!(error = %err, "substring search failed, returning no matches");
                Vec::new()
            }
        }
    }

    fn local_fallback(&self, owner: &str, embedding: &[f32], limit: usize) -> Vec<SimilarityResult> {
        let hits = self
            .local
            .query(embedding, limit.saturating_mul(LOCAL_FETCH_MULTIPLIER).max(limit));
        hits.into_iter()
            .filter(|hit| hit.owner == owner)
            .take(limit)
            .map(|hit| SimilarityResult {
                id: hit.handle,
                content: hit.snippet,
                metadata: None,
                similarity: (1.0 - hit.distance).clamp(0.0, 1.0),
            })
            .collect()
    }
}
