#![allow(dead_code)]

use async_trait::async_trait;
use engram::config::RetrievalConfig;
use engram::db;
use engram::embedding::{EmbeddingGenerator, EMBEDDING_DIM};
use engram::memory::manager::MemoryManager;
use engram::memory::types::{MemoryType, NewMemory, SimilarityResult};
use engram::vector::backend::{SimilarityBackend, SqliteBackend};
use engram::vector::VectorStore;
use rusqlite::Connection;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Deterministic embedder for tests.
///
/// Known phrases map to preset vectors; anything else embeds as a
/// normalized bag-of-words hash, so identical texts always embed
/// identically. Can be switched off to simulate a missing API key.
pub struct StubEmbedder {
    presets: HashMap<String, Vec<f32>>,
    enabled: AtomicBool,
}

impl StubEmbedder {
    pub fn new() -> Self {
        Self {
            presets: HashMap::new(),
            enabled: AtomicBool::new(true),
        }
    }

    pub fn disabled() -> Self {
        let embedder = Self::new();
        embedder.enabled.store(false, Ordering::SeqCst);
        embedder
    }

    pub fn with_preset(mut self, text: &str, vector: Vec<f32>) -> Self {
        self.presets.insert(text.to_string(), vector);
        self
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }
}

#[async_trait]
impl EmbeddingGenerator for StubEmbedder {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        if !self.enabled.load(Ordering::SeqCst) {
            return None;
        }
        if let Some(preset) = self.presets.get(text) {
            return Some(preset.clone());
        }
        Some(bag_of_words(text))
    }
}

/// Backend wrapper whose ranked path can be made to fail on demand,
/// simulating an unreachable similarity backend.
pub struct FlakyBackend {
    inner: SqliteBackend,
    ranked_down: AtomicBool,
}

impl FlakyBackend {
    pub fn new(db: Arc<Mutex<Connection>>) -> Self {
        Self {
            inner: SqliteBackend::new(db, 4),
            ranked_down: AtomicBool::new(false),
        }
    }

    pub fn set_ranked_down(&self, down: bool) {
        self.ranked_down.store(down, Ordering::SeqCst);
    }
}

impl SimilarityBackend for FlakyBackend {
    fn ranked_search(
        &self,
        owner: &str,
        embedding: &[f32],
        threshold: f32,
        limit: usize,
        type_filter: Option<MemoryType>,
    ) -> anyhow::Result<Vec<SimilarityResult>> {
        if self.ranked_down.load(Ordering::SeqCst) {
            anyhow::bail!("similarity backend unreachable");
        }
        self.inner
            .ranked_search(owner, embedding, threshold, limit, type_filter)
    }

    fn substring_search(
        &self,
        owner: &str,
        query: &str,
        limit: usize,
    ) -> anyhow::Result<Vec<SimilarityResult>> {
        self.inner.substring_search(owner, query, limit)
    }

    fn embedded_entries(&self) -> anyhow::Result<Vec<engram::memory::store::EmbeddedEntry>> {
        self.inner.embedded_entries()
    }
}

/// Fully wired test fixture over an in-memory database.
pub struct TestEnv {
    pub db: Arc<Mutex<Connection>>,
    pub embedder: Arc<StubEmbedder>,
    pub backend: Arc<FlakyBackend>,
    pub vectors: Arc<VectorStore>,
    pub manager: MemoryManager,
}

/// Wire a manager the way the binary does, with the stub embedder and the
/// flaky backend in place of the real collaborators.
pub fn test_env(embedder: StubEmbedder, index_capacity: usize) -> TestEnv {
    let db = Arc::new(Mutex::new(db::open_memory_database().unwrap()));
    let embedder = Arc::new(embedder);
    let backend = Arc::new(FlakyBackend::new(db.clone()));
    let vectors = Arc::new(VectorStore::new(
        embedder.clone(),
        backend.clone(),
        index_capacity,
    ));
    let manager = MemoryManager::new(db.clone(), vectors.clone(), &RetrievalConfig::default());
    TestEnv {
        db,
        embedder,
        backend,
        vectors,
        manager,
    }
}

pub fn env() -> TestEnv {
    test_env(StubEmbedder::new(), 1024)
}

/// Unit vector along dimension `i`.
pub fn spike(i: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; EMBEDDING_DIM];
    v[i % EMBEDDING_DIM] = 1.0;
    v
}

/// A vector close to `base` (cosine similarity well above 0.9).
pub fn similar_to(base: &[f32]) -> Vec<f32> {
    let mut v = base.to_vec();
    let len = v.len();
    for i in 0..5 {
        v[(i * 37) % len] += 0.05;
    }
    normalize(&mut v);
    v
}

/// Deterministic bag-of-words embedding: each whitespace token hashes to a
/// dimension spike, the sum is L2-normalized.
pub fn bag_of_words(text: &str) -> Vec<f32> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut v = vec![0.0f32; EMBEDDING_DIM];
    for token in text.to_lowercase().split_whitespace() {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        v[(hasher.finish() as usize) % EMBEDDING_DIM] += 1.0;
    }
    normalize(&mut v);
    v
}

pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

pub fn note(title: &str, content: &str) -> NewMemory {
    NewMemory {
        title: title.into(),
        content: content.into(),
        ..Default::default()
    }
}
