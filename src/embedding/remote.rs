//! OpenAI-compatible remote embedding generator.
//!
//! Calls `POST {base_url}/embeddings` with bearer auth. Any transport or
//! provider error is reported as `None` for that call and logged — degraded
//! mode is a normal outcome here, never a hard failure.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{l2_normalize, EmbeddingGenerator, EMBEDDING_DIM};
use crate::config::EmbeddingConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Remote generator over an OpenAI-compatible `/embeddings` endpoint.
pub struct RemoteEmbeddingGenerator {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl RemoteEmbeddingGenerator {
    pub fn new(config: &EmbeddingConfig, api_key: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
        })
    }

    async fn request_embedding(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let url = format!("{}/embeddings", self.base_url);
        let body = EmbeddingRequest {
            model: &self.model,
            input: text,
            dimensions: EMBEDDING_DIM,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        let parsed: EmbeddingResponse = response.json().await?;
        let mut embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| anyhow::anyhow!("embedding response contained no data"))?;

        if embedding.len() != EMBEDDING_DIM {
            anyhow::bail!(
                "provider returned {} dimensions, expected {EMBEDDING_DIM}",
                embedding.len()
            );
        }

        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

#[async_trait]
impl EmbeddingGenerator for RemoteEmbeddingGenerator {
    async fn embed(&self, text: &str) -> Option<Vec<f32>> {
        if text.trim().is_empty() {
            tracing::debug!("refusing to embed empty text");
            return None;
        }

        match self.request_embedding(text).await {
            Ok(embedding) => Some(embedding),
            Err(err) => {
                // Transient by assumption: the next call may succeed.
                tracing::warn!(error = %err, "embedding request failed, treating as unavailable");
                None
            }
        }
    }
}
