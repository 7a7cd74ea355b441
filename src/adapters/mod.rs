//! External client adapters (C1): typed, fail-closed facades over the
//! embedding, NER, intent, sentiment, working-memory, and
//! semantic-memory collaborators.
//!
//! Every adapter returns `AdapterResult<T>` instead of raising —
//! "dynamic typing over heterogeneous response dicts" and "exceptions
//! used for control flow across async boundaries" are the two source
//! patterns `spec.md` §9 calls out for re-architecture; this module is
//! the fix for both.

pub mod embedding;
pub mod intent;
pub mod ner;
pub mod semantic_memory;
pub mod sentiment;
pub mod working_store;

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;

use crate::types::{Embedding, EntityMap, MessageRecord, Segment};

/// Why an adapter call did not produce a usable result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnavailableReason {
    /// The per-call deadline elapsed.
    Timeout,
    /// Network/transport failure (connection refused, DNS, 5xx, ...).
    Transport,
    /// The response didn't match the expected schema (wrong field,
    /// wrong vector length, ...).
    MalformedResponse,
    /// No endpoint configured for this adapter.
    NotConfigured,
}

impl fmt::Display for UnavailableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnavailableReason::Timeout => "timeout",
            UnavailableReason::Transport => "transport",
            UnavailableReason::MalformedResponse => "malformed_response",
            UnavailableReason::NotConfigured => "not_configured",
        };
        write!(f, "{s}")
    }
}

/// A typed "unavailable" result — never an exception.
#[derive(Debug, Clone, thiserror::Error)]
#[error("adapter unavailable ({reason}): {detail}")]
pub struct AdapterUnavailable {
    pub reason: UnavailableReason,
    pub detail: String,
}

impl AdapterUnavailable {
    pub fn new(reason: UnavailableReason, detail: impl Into<String>) -> Self {
        Self { reason, detail: detail.into() }
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(UnavailableReason::Timeout, detail)
    }

    pub fn transport(detail: impl Into<String>) -> Self {
        Self::new(UnavailableReason::Transport, detail)
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::new(UnavailableReason::MalformedResponse, detail)
    }

    pub fn not_configured(name: &str) -> Self {
        Self::new(UnavailableReason::NotConfigured, format!("{name} has no endpoint configured"))
    }
}

/// Result type returned by every adapter operation.
pub type AdapterResult<T> = Result<T, AdapterUnavailable>;

/// Embedding service adapter (`spec.md` §4.1, §6).
#[async_trait]
pub trait EmbeddingAdapter: Send + Sync {
    /// Idempotent for identical input. Large inputs are passed through
    /// untouched.
    async fn embed(&self, text: &str) -> AdapterResult<Embedding>;

    /// Human-readable adapter name for metrics/logging.
    fn name(&self) -> &str {
        "embedding"
    }
}

/// Named-entity recognition adapter.
#[async_trait]
pub trait NerAdapter: Send + Sync {
    async fn extract(&self, text: &str, entity_types: Option<&[String]>) -> AdapterResult<EntityMap>;

    fn name(&self) -> &str {
        "ner"
    }
}

/// Classified intent with confidence and alternatives.
#[derive(Debug, Clone)]
pub struct IntentPrediction {
    pub intent: String,
    pub confidence: f32,
    pub alternatives: Vec<(String, f32)>,
}

/// Intent classification adapter.
#[async_trait]
pub trait IntentAdapter: Send + Sync {
    async fn classify(
        &self,
        text: &str,
        user_id: &str,
        recent_intents: &[String],
    ) -> AdapterResult<IntentPrediction>;

    fn name(&self) -> &str {
        "intent"
    }
}

/// Sentiment label with confidence.
#[derive(Debug, Clone)]
pub struct SentimentPrediction {
    pub label: String,
    pub confidence: f32,
}

/// Sentiment analysis adapter. Used only by the context builder when
/// deriving segment-level metadata; not required for resolution
/// (`spec.md` §4.1).
#[async_trait]
pub trait SentimentAdapter: Send + Sync {
    async fn analyze(&self, text: &str) -> AdapterResult<SentimentPrediction>;

    fn name(&self) -> &str {
        "sentiment"
    }
}

/// Working-memory store adapter: returns recent messages for a user.
/// Unavailability degrades to an empty list rather than an error
/// (`spec.md` §4.1).
#[async_trait]
pub trait WorkingStoreAdapter: Send + Sync {
    async fn recent_messages(&self, user_id: &str, since_hours: i64) -> Vec<MessageRecord>;

    fn name(&self) -> &str {
        "working_store"
    }
}

/// Semantic-memory adapter (reserved). An empty result is always
/// valid (`spec.md` §4.1, §6).
#[async_trait]
pub trait SemanticMemoryAdapter: Send + Sync {
    async fn query_nearby(&self, user_id: &str, embedding: &[f32], k: usize) -> Vec<Segment>;

    fn name(&self) -> &str {
        "semantic_memory"
    }
}

/// Wrap a future with a per-call deadline, mapping elapsed time into
/// an `AdapterUnavailable::timeout`.
pub(crate) async fn with_deadline<T, F>(deadline: Duration, label: &str, fut: F) -> AdapterResult<T>
where
    F: std::future::Future<Output = AdapterResult<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(AdapterUnavailable::timeout(format!(
            "{label} exceeded {}ms",
            deadline.as_millis()
        ))),
    }
}
