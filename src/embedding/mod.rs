//! Text-to-vector embedding pipeline.
//!
//! Provides the [`EmbeddingGenerator`] trait and the remote OpenAI-compatible
//! implementation. A generator that cannot run (no API key configured) is a
//! normal operating mode, not a fault: [`EmbeddingGenerator::embed`] returns
//! `None` and callers degrade to substring search.

pub mod remote;

use async_trait::async_trait;
use std::sync::Arc;

/// Number of dimensions in the embedding vectors.
///
/// Fixed for the process lifetime; the vec0 table, the local index, and the
/// remote request all agree on this value.
pub const EMBEDDING_DIM: usize = 1536;

/// Trait for embedding text into vectors.
///
/// `embed` returns `None` when the provider is unavailable — missing
/// credentials or a transient provider error (rate limit, network). The
/// caller must not treat `None` as permanent; the next call may succeed.
/// Backoff policy is a collaborator concern, not this crate's.
#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    /// Embed a single non-empty text string. `None` means unavailable
    /// for this call.
    async fn embed(&self, text: &str) -> Option<Vec<f32>>;

    /// Return the number of dimensions this generator produces.
    fn dimensions(&self) -> usize {
        EMBEDDING_DIM
    }
}

/// Generator used when no API key is configured. Always unavailable.
pub struct DisabledEmbeddingGenerator;

#[async_trait]
impl EmbeddingGenerator for DisabledEmbeddingGenerator {
    async fn embed(&self, _text: &str) -> Option<Vec<f32>> {
        tracing::debug!("embedding generator disabled, no vector produced");
        None
    }
}

/// Create an embedding generator from config.
///
/// Returns the remote OpenAI-compatible generator when the configured API key
/// environment variable is set, otherwise [`DisabledEmbeddingGenerator`].
pub fn create_generator(
    config: &crate::config::EmbeddingConfig,
) -> anyhow::Result<Arc<dyn EmbeddingGenerator>> {
    match std::env::var(&config.api_key_env) {
        Ok(key) if !key.trim().is_empty() => Ok(Arc::new(
            remote::RemoteEmbeddingGenerator::new(config, key)?,
        )),
        _ => {
            tracing::info!(
                env = %config.api_key_env,
                "no embedding API key configured — semantic search degrades to substring matching"
            );
            Ok(Arc::new(DisabledEmbeddingGenerator))
        }
    }
}

/// L2-normalize a vector in place. A zero vector is left unchanged.
pub(crate) fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}
