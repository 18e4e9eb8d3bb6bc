//! Similarity backend seam.
//!
//! The coordinator talks to the ranked/substring search capability through
//! [`SimilarityBackend`] so tests can exercise the fallback policy against a
//! failing backend. [`SqliteBackend`] is the production implementation over
//! the shared connection.

use anyhow::Result;
use rusqlite::Connection;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::memory::store::{self, EmbeddedEntry};
use crate::memory::types::{MemoryType, SimilarityResult};

/// Server-side search capability with direct access to stored embeddings.
///
/// Any `Err` from these methods is a backend failure and triggers fallback
/// in the coordinator. Contract violations (blank owner) are checked before
/// the backend is called, so the two can never be confused.
pub trait SimilarityBackend: Send + Sync {
    /// Ranked similarity search: only records with similarity ≥ `threshold`,
    /// at most `limit`, descending by similarity, owner- and type-filtered.
    fn ranked_search(
        &self,
        owner: &str,
        embedding: &[f32],
        threshold: f32,
        limit: usize,
        type_filter: Option<MemoryType>,
    ) -> Result<Vec<SimilarityResult>>;

    /// Plain substring search; used only when no embedding capability exists.
    fn substring_search(&self, owner: &str, query: &str, limit: usize)
        -> Result<Vec<SimilarityResult>>;

    /// Every stored embedding with its record context, for index rebuild.
    fn embedded_entries(&self) -> Result<Vec<EmbeddedEntry>>;
}

/// SQLite + sqlite-vec implementation over the shared connection.
pub struct SqliteBackend {
    db: Arc<Mutex<Connection>>,
    candidate_multiplier: usize,
}

impl SqliteBackend {
    pub fn new(db: Arc<Mutex<Connection>>, candidate_multiplier: usize) -> Self {
        Self {
            db,
            candidate_multiplier: candidate_multiplier.max(1),
        }
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl SimilarityBackend for SqliteBackend {
    fn ranked_search(
        &self,
        owner: &str,
        embedding: &[f32],
        threshold: f32,
        limit: usize,
        type_filter: Option<MemoryType>,
    ) -> Result<Vec<SimilarityResult>> {
        let candidate_limit = limit.saturating_mul(self.candidate_multiplier);
        store::query_ranked_by_embedding(
            &self.conn(),
            owner,
            embedding,
            threshold,
            limit,
            type_filter,
            candidate_limit,
        )
    }

    fn substring_search(
        &self,
        owner: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SimilarityResult>> {
        store::query_by_substring(&self.conn(), owner, query, limit)
    }

    fn embedded_entries(&self) -> Result<Vec<EmbeddedEntry>> {
        store::embedded_entries(&self.conn())
    }
}
