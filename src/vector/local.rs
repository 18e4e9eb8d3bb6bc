//! In-process approximate nearest-neighbor fallback index.
//!
//! A capacity-bounded HNSW index (`hora`) over L2-normalized vectors, used
//! only when the ranked similarity backend is unreachable. Each vector
//! carries its record handle, owner, and a content snippet so fallback
//! results stay useful while the durable store is down.
//!
//! Input contract: vectors must be non-zero and of the configured dimension.
//! A zero vector never enters the index, and a zero query vector matches
//! nothing — one consistent policy for "maximally dissimilar".

use hora::core::ann_index::ANNIndex;
use hora::core::metrics::Metric;
use hora::index::hnsw_idx::HNSWIndex;
use hora::index::hnsw_params::HNSWParams;
use std::sync::RwLock;

use crate::embedding::l2_normalize;
use crate::error::MemoryError;

/// A neighbor returned by [`LocalVectorIndex::query`].
#[derive(Debug, Clone)]
pub struct LocalHit {
    pub handle: String,
    pub owner: String,
    pub snippet: String,
    /// Cosine distance in `[0, 2]`; ascending order, lower is closer.
    pub distance: f32,
}

struct IndexEntry {
    handle: String,
    owner: String,
    snippet: String,
    /// L2-normalized copy of the inserted vector, kept for exact
    /// cosine scoring of HNSW candidates.
    vector: Vec<f32>,
}

struct IndexState {
    index: HNSWIndex<f32, usize>,
    entries: Vec<IndexEntry>,
}

/// Capacity-bounded ANN index over cosine distance.
///
/// One `RwLock` serializes writers against readers: the capacity check is
/// atomic with the insert it guards, and queries never observe an index
/// mid-build.
pub struct LocalVectorIndex {
    dimension: usize,
    capacity: usize,
    state: RwLock<IndexState>,
}

impl LocalVectorIndex {
    /// Create an empty index for up to `capacity` vectors of `dimension`.
    pub fn new(dimension: usize, capacity: usize) -> Self {
        Self {
            dimension,
            capacity,
            state: RwLock::new(IndexState {
                index: HNSWIndex::new(dimension, &HNSWParams::default()),
                entries: Vec::new(),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.state.read().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a vector with its handle. No deduplication: re-inserting the
    /// same logical record is the caller's responsibility to avoid.
    pub fn insert(
        &self,
        vector: &[f32],
        handle: &str,
        owner: &str,
        snippet: &str,
    ) -> Result<(), MemoryError> {
        let normalized = self.validate(vector)?;

        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if state.entries.len() >= self.capacity {
            return Err(MemoryError::LocalIndexCapacityExceeded {
                capacity: self.capacity,
            });
        }

        let slot = state.entries.len();
        state
            .index
            .add(&normalized, slot)
            .map_err(MemoryError::InvalidVector)?;
        // Vectors are searchable only after a build; on unit vectors the
        // Euclidean ordering equals the cosine ordering.
        state
            .index
            .build(Metric::Euclidean)
            .map_err(MemoryError::InvalidVector)?;
        state.entries.push(IndexEntry {
            handle: handle.to_string(),
            owner: owner.to_string(),
            snippet: snippet.to_string(),
            vector: normalized,
        });
        Ok(())
    }

    /// Return up to `k` nearest neighbors, ascending by cosine distance.
    ///
    /// Fewer than `k` hits come back when the index holds fewer points; an
    /// empty index (or a zero query vector) yields an empty vec, not an error.
    pub fn query(&self, vector: &[f32], k: usize) -> Vec<LocalHit> {
        if k == 0 || vector.len() != self.dimension {
            return Vec::new();
        }
        let mut query = vector.to_vec();
        l2_normalize(&mut query);
        if query.iter().all(|x| *x == 0.0) {
            return Vec::new();
        }

        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        if state.entries.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<LocalHit> = state
            .index
            .search(&query, k.min(state.entries.len()))
            .into_iter()
            .filter_map(|slot| state.entries.get(slot))
            .map(|entry| LocalHit {
                handle: entry.handle.clone(),
                owner: entry.owner.clone(),
                snippet: entry.snippet.clone(),
                distance: cosine_distance(&query, &entry.vector),
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }

    /// Replace the index contents from durable storage (restart recovery).
    ///
    /// Entries past capacity are not mirrored; invalid vectors are skipped.
    /// Returns the number of vectors loaded.
    pub fn rebuild<I>(&self, entries: I) -> usize
    where
        I: IntoIterator<Item = (String, String, String, Vec<f32>)>,
    {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        state.index = HNSWIndex::new(self.dimension, &HNSWParams::default());
        state.entries = Vec::new();

        for (handle, owner, snippet, vector) in entries {
            if state.entries.len() >= self.capacity {
                tracing::warn!(
                    capacity = self.capacity,
                    "local index capacity reached during rebuild, remaining vectors not mirrored"
                );
                break;
            }
            let normalized = match self.validate(&vector) {
                Ok(v) => v,
                Err(err) => {
                    tracing::warn!(handle = %handle, error = %err, "skipping vector during rebuild");
                    continue;
                }
            };
            let slot = state.entries.len();
            if state.index.add(&normalized, slot).is_err() {
                tracing::warn!(handle = %handle, "index rejected vector during rebuild");
                continue;
            }
            state.entries.push(IndexEntry {
                handle,
                owner,
                snippet,
                vector: normalized,
            });
        }

        if !state.entries.is_empty() {
            if let Err(err) = state.index.build(Metric::Euclidean) {
                tracing::warn!(error = %err, "local index build failed after rebuild");
            }
        }
        state.entries.len()
    }

    /// Check dimension and the zero-vector contract, returning a normalized copy.
    fn validate(&self, vector: &[f32]) -> Result<Vec<f32>, MemoryError> {
        if vector.len() != self.dimension {
            return Err(MemoryError::InvalidVector("dimension mismatch"));
        }
        if vector.iter().all(|x| *x == 0.0) {
            return Err(MemoryError::InvalidVector("zero vector"));
        }
        let mut normalized = vector.to_vec();
        l2_normalize(&mut normalized);
        Ok(normalized)
    }
}

/// Cosine distance between two unit vectors: `1 - dot(a, b)`.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    (1.0 - dot).clamp(0.0, 2.0)
}
