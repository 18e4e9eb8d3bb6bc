//! Error taxonomy for the memory core.
//!
//! Contract violations surface as hard failures; failures of optional
//! subsystems (embedding provider, ranked backend) never appear here — they
//! degrade into substring/local/empty results inside the coordinator.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MemoryError {
    /// The owner id was blank. Contract violation: never retried, and no
    /// backend is contacted.
    #[error("owner id is required")]
    MissingOwner,

    /// The content to store was empty. Checked before any embedding call.
    #[error("memory content must not be empty")]
    EmptyContent,

    /// A vector violated the local index's input contract
    /// (dimension mismatch or zero vector).
    #[error("invalid vector: {0}")]
    InvalidVector(&'static str),

    /// The local fallback index is full. The durable record still stands;
    /// only the mirror insert was rejected.
    #[error("local vector index is full (capacity {capacity})")]
    LocalIndexCapacityExceeded { capacity: usize },

    /// The durable store failed on a path with no degraded mode
    /// (persisting a record, reading stats).
    #[error("durable store failure")]
    Store(#[from] anyhow::Error),
}
