//! Embedding service adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use super::{with_deadline, AdapterResult, AdapterUnavailable, EmbeddingAdapter};
use crate::types::Embedding;

/// `spec.md` §6: `{model, prompt}`.
#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

/// `spec.md` §6: `{success, data?: {embedding}, error?}`.
#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    success: bool,
    data: Option<EmbeddingData>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// HTTP-backed embedding adapter. Mirrors the request/response
/// envelope and per-call timeout discipline of the teacher pack's
/// `OllamaEmbeddingProvider`.
pub struct HttpEmbeddingAdapter {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
    deadline: Duration,
}

impl HttpEmbeddingAdapter {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>, dimension: usize, deadline: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            dimension,
            deadline,
        }
    }

    async fn call(&self, text: &str) -> AdapterResult<Embedding> {
        let body = EmbeddingRequest { model: &self.model, prompt: text };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterUnavailable::transport(e.to_string()))?;

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| AdapterUnavailable::malformed(e.to_string()))?;

        if !parsed.success {
            return Err(AdapterUnavailable::transport(
                parsed.error.unwrap_or_else(|| "embedding service reported failure".to_string()),
            ));
        }

        let data = parsed
            .data
            .ok_or_else(|| AdapterUnavailable::malformed("missing data field"))?;

        if data.embedding.len() != self.dimension {
            warn!(
                expected = self.dimension,
                actual = data.embedding.len(),
                "embedding adapter returned mismatched vector length"
            );
            return Err(AdapterUnavailable::malformed(format!(
                "expected dimension {}, got {}",
                self.dimension,
                data.embedding.len()
            )));
        }

        Ok(data.embedding)
    }
}

#[async_trait]
impl EmbeddingAdapter for HttpEmbeddingAdapter {
    async fn embed(&self, text: &str) -> AdapterResult<Embedding> {
        with_deadline(self.deadline, "embedding.embed", self.call(text)).await
    }
}

/// Default adapter when no embedding endpoint is configured: always
/// unavailable, never blocks the pipeline.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEmbeddingAdapter;

#[async_trait]
impl EmbeddingAdapter for NullEmbeddingAdapter {
    async fn embed(&self, _text: &str) -> AdapterResult<Embedding> {
        Err(AdapterUnavailable::not_configured("embedding"))
    }
}

/// Deterministic in-memory adapter for tests: derives a stable vector
/// from the text's hash so identical input is idempotent, matching
/// `spec.md` §4.1, without any network dependency. Grounded on the
/// teacher pack's `DummyEmbeddingProvider`.
pub struct FixtureEmbeddingAdapter {
    dimension: usize,
}

impl FixtureEmbeddingAdapter {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingAdapter for FixtureEmbeddingAdapter {
    async fn embed(&self, text: &str) -> AdapterResult<Embedding> {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let seed = hasher.finish();

        Ok((0..self.dimension)
            .map(|i| {
                let v = seed.wrapping_add(i as u64);
                ((v % 1000) as f32 / 1000.0) * 2.0 - 1.0
            })
            .collect())
    }
}
