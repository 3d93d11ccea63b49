//! OpenAI-compatible embedding client (`POST {base}/v1/embeddings`).
//!
//! Texts are trimmed and sent in batches of `batch_size`; every batch
//! carries its own retry-with-backoff.  Returned vectors are checked
//! against the configured width, and a mismatch is surfaced as
//! [`AnimaError::DimensionMismatch`] without retrying.

use std::time::Duration;

use anima_core::config::{EmbeddingConfig, LlmConfig};
use anima_core::embedding::{EmbeddingService, check_dimensions};
use anima_core::{AnimaError, Embedding};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::LlmError;
use crate::retry::RetryPolicy;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

/// Reorder response rows by their `index` field.
fn into_ordered(mut data: Vec<EmbeddingDatum>, expected: usize) -> Result<Vec<Embedding>, LlmError> {
    if data.len() != expected {
        return Err(LlmError::SchemaValidation(format!(
            "requested {expected} embeddings, received {}",
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| Embedding(d.embedding)).collect())
}

/// Embedding client for an OpenAI-compatible endpoint.
pub struct OpenAiEmbeddingClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
    batch_size: usize,
    timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for OpenAiEmbeddingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbeddingClient")
            .field("model", &self.model)
            .field("dimensions", &self.dimensions)
            .finish_non_exhaustive()
    }
}

impl OpenAiEmbeddingClient {
    /// Build a client; endpoint and key come from the `llm` section.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ConfigError`] if the HTTP client cannot be built.
    pub fn from_config(embedding: &EmbeddingConfig, llm: &LlmConfig) -> Result<Self, LlmError> {
        let http = Client::builder()
            .build()
            .map_err(|e| LlmError::ConfigError(e.to_string()))?;
        Ok(Self {
            http,
            base_url: llm.base_url.trim_end_matches('/').to_string(),
            api_key: llm.api_key.clone(),
            model: embedding.model.clone(),
            dimensions: embedding.dimensions,
            batch_size: embedding.batch_size.max(1),
            timeout: Duration::from_millis(embedding.timeout_ms),
            retry: RetryPolicy::from_embedding_config(embedding),
        })
    }

    async fn post_batch(&self, batch: &[String]) -> Result<Vec<Embedding>, LlmError> {
        let url = format!("{}/v1/embeddings", self.base_url);
        let body = EmbeddingRequest {
            model: &self.model,
            input: batch.iter().map(|t| t.trim()).collect(),
        };
        let mut req = self.http.post(&url).json(&body).timeout(self.timeout);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::RequestFailed(format!("HTTP {} {text}", status.as_u16())));
        }
        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| LlmError::ParseError(e.to_string()))?;
        into_ordered(parsed.data, batch.len())
    }
}

#[async_trait]
impl EmbeddingService for OpenAiEmbeddingClient {
    async fn embed(&self, texts: &[String]) -> anima_core::Result<Vec<Embedding>> {
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let vectors = self
                .retry
                .run("embedding_batch", || self.post_batch(batch))
                .await
                .map_err(AnimaError::from)?;
            check_dimensions(&vectors, self.dimensions)?;
            out.extend(vectors);
        }
        debug!(model = %self.model, count = out.len(), "embedded texts");
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_reordered_by_index() {
        let data = vec![
            EmbeddingDatum { index: 1, embedding: vec![0.0, 1.0] },
            EmbeddingDatum { index: 0, embedding: vec![1.0, 0.0] },
        ];
        let out = into_ordered(data, 2).expect("ordered");
        assert_eq!(out[0].0, vec![1.0, 0.0]);
        assert_eq!(out[1].0, vec![0.0, 1.0]);
    }

    #[test]
    fn short_response_is_rejected() {
        let data = vec![EmbeddingDatum { index: 0, embedding: vec![1.0] }];
        assert!(matches!(into_ordered(data, 2), Err(LlmError::SchemaValidation(_))));
    }

    #[tokio::test]
    async fn empty_input_makes_no_request() {
        let mut llm = LlmConfig::default();
        llm.base_url = "http://127.0.0.1:9".into();
        let client = OpenAiEmbeddingClient::from_config(&EmbeddingConfig::default(), &llm).expect("client");
        assert!(client.embed(&[]).await.expect("empty").is_empty());
        assert_eq!(client.dimensions(), 3072);
    }
}
