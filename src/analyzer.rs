//! Message analyzer (C2): turns one incoming message (plus the
//! caller's own recent history, when available) into a
//! `ConversationAnalysis`.
//!
//! Sub-analyses fan out concurrently under an overall
//! `analyzer_deadline_ms` timeout (`spec.md` §4.2, §6). Embedding,
//! intent, and NER calls go through the typed adapters and degrade
//! individually on failure; the heuristic sub-scores (topic shift,
//! conversation boundary, context dependency) are synchronous,
//! CPU-bound, and cannot fail.

use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use crate::adapters::{EmbeddingAdapter, IntentAdapter, NerAdapter};
use crate::cache::EmbeddingCache;
use crate::lexicon;
use crate::types::{ConversationAnalysis, EntityMap};

/// Analyzes a single message, fanning out to the injected adapters.
pub struct MessageAnalyzer {
    embedding: Arc<dyn EmbeddingAdapter>,
    intent: Arc<dyn IntentAdapter>,
    ner: Arc<dyn NerAdapter>,
    embedding_cache: Arc<EmbeddingCache>,
    analyzer_deadline: Duration,
    adapter_deadline: Duration,
    embedding_dimension: usize,
}

impl MessageAnalyzer {
    pub fn new(
        embedding: Arc<dyn EmbeddingAdapter>,
        intent: Arc<dyn IntentAdapter>,
        ner: Arc<dyn NerAdapter>,
        embedding_cache: Arc<EmbeddingCache>,
        analyzer_deadline: Duration,
        adapter_deadline: Duration,
        embedding_dimension: usize,
    ) -> Self {
        Self {
            embedding,
            intent,
            ner,
            embedding_cache,
            analyzer_deadline,
            adapter_deadline,
            embedding_dimension,
        }
    }

    /// Analyze `message` for `user_id`, given their recent intent
    /// history (most recent last). Never fails: any sub-analysis that
    /// cannot complete within the overall deadline degrades to a
    /// neutral value and the call still returns.
    pub async fn analyze(
        &self,
        user_id: &str,
        message: &str,
        recent_intents: &[String],
    ) -> ConversationAnalysis {
        let boundary = lexicon::conversation_boundary_score(message);
        let topic_shift = lexicon::topic_shift_score(message);
        let context_dependency = lexicon::context_dependency_score(message);

        let pipeline = async {
            tokio::join!(
                self.embed(message),
                self.classify_intent(message, user_id, recent_intents),
                self.extract_entities(message),
            )
        };

        match tokio::time::timeout(self.analyzer_deadline, pipeline).await {
            Ok((embedding, intent, entities)) => ConversationAnalysis {
                message_embedding: embedding,
                detected_intent: intent,
                topic_shift_score: topic_shift,
                conversation_boundary_score: boundary,
                urgency_score: 0.5,
                context_dependency_score: context_dependency,
                entities,
            },
            Err(_) => {
                warn!(user_id, "analyzer deadline exceeded; degrading to heuristics-only analysis");
                ConversationAnalysis {
                    message_embedding: vec![0.0; self.embedding_dimension],
                    detected_intent: "general".to_string(),
                    topic_shift_score: topic_shift,
                    conversation_boundary_score: boundary,
                    urgency_score: 0.5,
                    context_dependency_score: context_dependency,
                    entities: EntityMap::new(),
                }
            }
        }
    }

    async fn embed(&self, message: &str) -> Vec<f32> {
        if let Some(cached) = self.embedding_cache.get(message).await {
            return cached;
        }

        let lock = self.embedding_cache.flight_lock(message);
        let _guard = lock.lock().await;

        if let Some(cached) = self.embedding_cache.get(message).await {
            return cached;
        }

        match tokio::time::timeout(self.adapter_deadline, self.embedding.embed(message)).await {
            Ok(Ok(embedding)) => {
                self.embedding_cache.put(message, embedding.clone()).await;
                embedding
            }
            Ok(Err(err)) => {
                warn!(error = %err, "embedding adapter unavailable; using zero vector");
                vec![0.0; self.embedding_dimension]
            }
            Err(_) => {
                warn!("embedding adapter call timed out");
                vec![0.0; self.embedding_dimension]
            }
        }
    }

    async fn classify_intent(&self, message: &str, user_id: &str, recent_intents: &[String]) -> String {
        match tokio::time::timeout(self.adapter_deadline, self.intent.classify(message, user_id, recent_intents)).await
        {
            Ok(Ok(prediction)) if prediction.confidence < 0.3 => {
                warn!(confidence = prediction.confidence, "intent confidence below threshold; defaulting to general");
                "general".to_string()
            }
            Ok(Ok(prediction)) => prediction.intent,
            Ok(Err(err)) => {
                warn!(error = %err, "intent adapter unavailable; defaulting to general");
                "general".to_string()
            }
            Err(_) => {
                warn!("intent adapter call timed out");
                "general".to_string()
            }
        }
    }

    async fn extract_entities(&self, message: &str) -> EntityMap {
        match tokio::time::timeout(self.adapter_deadline, self.ner.extract(message, None)).await {
            Ok(Ok(entities)) => entities,
            Ok(Err(err)) => {
                warn!(error = %err, "ner adapter unavailable; no entities extracted");
                EntityMap::new()
            }
            Err(_) => {
                warn!("ner adapter call timed out");
                EntityMap::new()
            }
        }
    }
}
