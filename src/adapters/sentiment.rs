//! Sentiment analysis adapter.
//!
//! Used only by the context builder when deriving segment-level
//! metadata; not required for resolution (`spec.md` §4.1).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{with_deadline, AdapterResult, AdapterUnavailable, SentimentAdapter, SentimentPrediction};

#[derive(Debug, Clone, Serialize)]
struct SentimentRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct SentimentResponse {
    success: bool,
    data: Option<SentimentData>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SentimentData {
    label: String,
    confidence: f32,
}

pub struct HttpSentimentAdapter {
    client: reqwest::Client,
    endpoint: String,
    deadline: Duration,
}

impl HttpSentimentAdapter {
    pub fn new(endpoint: impl Into<String>, deadline: Duration) -> Self {
        Self { client: reqwest::Client::new(), endpoint: endpoint.into(), deadline }
    }

    async fn call(&self, text: &str) -> AdapterResult<SentimentPrediction> {
        let body = SentimentRequest { text };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterUnavailable::transport(e.to_string()))?;

        let parsed: SentimentResponse = response
            .json()
            .await
            .map_err(|e| AdapterUnavailable::malformed(e.to_string()))?;

        if !parsed.success {
            return Err(AdapterUnavailable::transport(
                parsed.error.unwrap_or_else(|| "sentiment service reported failure".to_string()),
            ));
        }

        let data = parsed.data.ok_or_else(|| AdapterUnavailable::malformed("missing data field"))?;
        Ok(SentimentPrediction { label: data.label, confidence: data.confidence })
    }
}

#[async_trait]
impl SentimentAdapter for HttpSentimentAdapter {
    async fn analyze(&self, text: &str) -> AdapterResult<SentimentPrediction> {
        with_deadline(self.deadline, "sentiment.analyze", self.call(text)).await
    }
}

/// Default adapter when no sentiment endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSentimentAdapter;

#[async_trait]
impl SentimentAdapter for NullSentimentAdapter {
    async fn analyze(&self, _text: &str) -> AdapterResult<SentimentPrediction> {
        Err(AdapterUnavailable::not_configured("sentiment"))
    }
}
