//! Intent classification adapter.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use super::{with_deadline, AdapterResult, AdapterUnavailable, IntentAdapter, IntentPrediction};

/// `spec.md` §6: `{text, user_id?, conversation_context?}`.
#[derive(Debug, Clone, Serialize)]
struct IntentRequest<'a> {
    text: &'a str,
    user_id: Option<&'a str>,
    conversation_context: &'a [String],
}

/// `spec.md` §6: `{success, data?: {predicted_intent, confidence,
/// detected_language, alternatives, inference_time_ms, metadata}, error?}`.
#[derive(Debug, Clone, Deserialize)]
struct IntentResponse {
    success: bool,
    data: Option<IntentData>,
    error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct IntentData {
    predicted_intent: String,
    confidence: f32,
    #[allow(dead_code)]
    detected_language: Option<String>,
    #[serde(default)]
    alternatives: Vec<(String, f32)>,
    #[allow(dead_code)]
    #[serde(default)]
    inference_time_ms: f64,
    #[allow(dead_code)]
    #[serde(default)]
    metadata: HashMap<String, serde_json::Value>,
}

/// The fixed set of intents this resolver ever assigns when falling
/// back to heuristics (`spec.md` §3).
pub const KNOWN_INTENTS: &[&str] = &[
    "greeting",
    "question",
    "request",
    "information_sharing",
    "confirmation",
    "negation",
    "complaint",
    "farewell",
    "general",
];

pub struct HttpIntentAdapter {
    client: reqwest::Client,
    endpoint: String,
    deadline: Duration,
}

impl HttpIntentAdapter {
    pub fn new(endpoint: impl Into<String>, deadline: Duration) -> Self {
        Self { client: reqwest::Client::new(), endpoint: endpoint.into(), deadline }
    }

    async fn call(&self, text: &str, user_id: &str, recent_intents: &[String]) -> AdapterResult<IntentPrediction> {
        let body = IntentRequest { text, user_id: Some(user_id), conversation_context: recent_intents };

        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterUnavailable::transport(e.to_string()))?;

        let parsed: IntentResponse = response
            .json()
            .await
            .map_err(|e| AdapterUnavailable::malformed(e.to_string()))?;

        if !parsed.success {
            return Err(AdapterUnavailable::transport(
                parsed.error.unwrap_or_else(|| "intent service reported failure".to_string()),
            ));
        }

        let data = parsed.data.ok_or_else(|| AdapterUnavailable::malformed("missing data field"))?;

        Ok(IntentPrediction {
            intent: data.predicted_intent,
            confidence: data.confidence,
            alternatives: data.alternatives,
        })
    }
}

#[async_trait]
impl IntentAdapter for HttpIntentAdapter {
    async fn classify(&self, text: &str, user_id: &str, recent_intents: &[String]) -> AdapterResult<IntentPrediction> {
        with_deadline(self.deadline, "intent.classify", self.call(text, user_id, recent_intents)).await
    }
}

/// Default adapter when no intent endpoint is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullIntentAdapter;

#[async_trait]
impl IntentAdapter for NullIntentAdapter {
    async fn classify(&self, _text: &str, _user_id: &str, _recent_intents: &[String]) -> AdapterResult<IntentPrediction> {
        Err(AdapterUnavailable::not_configured("intent"))
    }
}

/// Deterministic in-memory adapter for tests: classifies via the same
/// heuristic boundary phrases the lexicon module uses, falling back to
/// "general" with full confidence. Never unavailable.
pub struct FixtureIntentAdapter;

#[async_trait]
impl IntentAdapter for FixtureIntentAdapter {
    async fn classify(&self, text: &str, _user_id: &str, _recent_intents: &[String]) -> AdapterResult<IntentPrediction> {
        let lower = text.to_lowercase();
        let intent = if lower.contains('?') {
            "question"
        } else if lower.ends_with('!') && (lower.contains("hi") || lower.contains("hello")) {
            "greeting"
        } else {
            "general"
        };
        Ok(IntentPrediction { intent: intent.to_string(), confidence: 0.9, alternatives: Vec::new() })
    }
}
