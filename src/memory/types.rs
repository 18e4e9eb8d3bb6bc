//! Core memory type definitions.
//!
//! Defines [`MemoryType`] (the categorical memory kinds), [`MemoryRecord`]
//! (a full record), [`NewMemory`] (creation fields), [`SimilarityResult`]
//! (a ranked search hit), and the stats/search option structs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Similarity score attached to substring-fallback matches.
///
/// This is a fixed placeholder, NOT a true cosine similarity — substring
/// matches carry no embedding, so there is nothing to measure. Callers must
/// not compare it numerically against real similarity scores.
pub const SUBSTRING_SENTINEL_SCORE: f32 = 0.8;

/// Categorical memory kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    /// Events and experiences tied to a moment in time.
    Episodic,
    /// Facts and general knowledge.
    Semantic,
    /// How-to knowledge, workflows, processes.
    Procedural,
    /// Explicitly stated facts that can be recalled on demand.
    Declarative,
    /// Knowledge expressed through behavior rather than recall.
    Implicit,
    /// Links between concepts.
    Associative,
    /// Uncategorized. The default when no type is supplied.
    Generic,
}

impl MemoryType {
    /// SQL-compatible string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Episodic => "episodic",
            Self::Semantic => "semantic",
            Self::Procedural => "procedural",
            Self::Declarative => "declarative",
            Self::Implicit => "implicit",
            Self::Associative => "associative",
            Self::Generic => "generic",
        }
    }

    /// All kinds, in stable order. Used to zero-fill stats maps.
    pub fn all() -> [MemoryType; 7] {
        [
            Self::Episodic,
            Self::Semantic,
            Self::Procedural,
            Self::Declarative,
            Self::Implicit,
            Self::Associative,
            Self::Generic,
        ]
    }
}

impl Default for MemoryType {
    fn default() -> Self {
        Self::Generic
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MemoryType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "episodic" => Ok(Self::Episodic),
            "semantic" => Ok(Self::Semantic),
            "procedural" => Ok(Self::Procedural),
            "declarative" => Ok(Self::Declarative),
            "implicit" => Ok(Self::Implicit),
            "associative" => Ok(Self::Associative),
            "generic" => Ok(Self::Generic),
            _ => Err(format!("unknown memory type: {s}")),
        }
    }
}

/// A memory record, matching the `memories` table schema.
///
/// The embedding vector itself lives in the `memories_vec` table;
/// `has_embedding` records whether one was produced at insert time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// UUID v7 (time-sortable) primary key.
    pub id: String,
    /// Owning user. Never blank after creation.
    pub owner_id: String,
    pub title: String,
    /// The full text content — the unit that gets embedded.
    pub content: String,
    /// Tag set. Stored as a JSON array; order irrelevant, duplicates dropped.
    pub tags: Vec<String>,
    #[serde(rename = "type")]
    pub memory_type: MemoryType,
    /// Optional free-text context carried alongside the record.
    pub context: Option<String>,
    /// Arbitrary JSON metadata, passed through unchanged.
    pub metadata: Option<serde_json::Value>,
    /// Whether an embedding was stored for this record.
    pub has_embedding: bool,
    /// ISO 8601 creation timestamp. Immutable.
    pub created_at: String,
    /// ISO 8601 last-modification timestamp.
    pub updated_at: String,
}

/// Fields supplied by the caller when creating a memory.
#[derive(Debug, Clone, Default)]
pub struct NewMemory {
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
    pub memory_type: MemoryType,
    pub context: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// A single ranked similarity hit.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityResult {
    pub id: String,
    /// Content snippet of the matched record.
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Similarity in `[0, 1]`: 1.0 identical, 0.0 maximally dissimilar.
    /// Substring matches carry [`SUBSTRING_SENTINEL_SCORE`] instead.
    pub similarity: f32,
}

/// Options for a similarity search. All fields optional; defaults are
/// applied by the manager (limit 5, threshold 0.7 on the ranked path).
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Minimum similarity for ranked results. Ignored on the substring path.
    pub threshold: Option<f32>,
    pub limit: Option<usize>,
    pub memory_type: Option<MemoryType>,
}

/// Aggregate statistics for one owner.
#[derive(Debug, Serialize)]
pub struct MemoryStats {
    pub total: u64,
    /// Counts per memory type. Zero-filled: every kind is present.
    pub by_type: HashMap<String, u64>,
    pub by_tag: HashMap<String, u64>,
    /// Records created within the trailing 24 hours (wall clock, inclusive
    /// at exactly -24h).
    pub recently_added: u64,
}
