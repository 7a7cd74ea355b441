//! Thread-context builder (C3): assembles per-thread context from a
//! user's recent message history.
//!
//! `spec.md` §4.3. Recent messages from the last 24 hours are grouped
//! by `thread_id` (messages with no `thread_id` are discarded — they
//! predate thread tracking or came from a caller that hasn't adopted
//! it yet). Each group becomes one `ThreadContext`: derived status
//! from last activity vs. `dormancy_threshold`, a topic embedding from
//! the mean of the group's own last-up-to-3 message embeddings
//! (fetched through the same embedding adapter and cache the analyzer
//! uses, so warm text never costs a second round trip), entities
//! unioned across recent messages via the NER adapter, and an intent
//! history built by classifying each recent message via the intent
//! adapter.
//!
//! Bounded to the most recently active 256 threads per user
//! (`spec.md` §5 resource bound) so a pathological user with thousands
//! of threads can't make a single resolve call scan unboundedly.
//! Per-thread enrichment fans out concurrently across threads.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;

use crate::adapters::{EmbeddingAdapter, IntentAdapter, NerAdapter, WorkingStoreAdapter};
use crate::cache::{EmbeddingCache, UserContextCache};
use crate::config::ResolverConfig;
use crate::similarity::mean_vector;
use crate::types::{EntityMap, MessageRecord, MessageType, ThreadContext, ThreadId, ThreadMessage, ThreadStatus};

const MAX_THREADS_PER_USER: usize = 256;
const MAX_RECENT_MESSAGES_PER_THREAD: usize = 10;
const MAX_MESSAGES_EMBEDDED_PER_THREAD: usize = 3;
/// `spec.md` §4.3 step 2: "fetch recent messages for the last 24 hours".
const CONTEXT_LOOKBACK_HOURS: i64 = 24;

/// Builds `ThreadContext`s for a user from the working-memory store,
/// with a cache in front of the (potentially expensive) grouping work.
pub struct ContextBuilder {
    working_store: Arc<dyn WorkingStoreAdapter>,
    embedding: Arc<dyn EmbeddingAdapter>,
    ner: Arc<dyn NerAdapter>,
    intent: Arc<dyn IntentAdapter>,
    embedding_cache: Arc<EmbeddingCache>,
    context_cache: Arc<UserContextCache>,
    adapter_deadline: Duration,
}

impl ContextBuilder {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        working_store: Arc<dyn WorkingStoreAdapter>,
        embedding: Arc<dyn EmbeddingAdapter>,
        ner: Arc<dyn NerAdapter>,
        intent: Arc<dyn IntentAdapter>,
        embedding_cache: Arc<EmbeddingCache>,
        context_cache: Arc<UserContextCache>,
        adapter_deadline: Duration,
    ) -> Self {
        Self { working_store, embedding, ner, intent, embedding_cache, context_cache, adapter_deadline }
    }

    /// Return this user's thread contexts, most recently active first.
    pub async fn contexts(&self, user_id: &str, config: &ResolverConfig) -> Vec<ThreadContext> {
        if config.enable_caching {
            if let Some(cached) = self.context_cache.get(user_id).await {
                return cached;
            }
        }

        let lock = self.context_cache.flight_lock(user_id);
        let _guard = lock.lock().await;

        if config.enable_caching {
            if let Some(cached) = self.context_cache.get(user_id).await {
                return cached;
            }
        }

        let messages = self.working_store.recent_messages(user_id, CONTEXT_LOOKBACK_HOURS).await;
        let mut contexts = self.group_into_contexts(user_id, messages, config).await;
        contexts.truncate(config.max_thread_context_messages);

        if config.enable_caching {
            self.context_cache.put(user_id, contexts.clone()).await;
        }

        contexts
    }

    async fn group_into_contexts(&self, user_id: &str, messages: Vec<MessageRecord>, config: &ResolverConfig) -> Vec<ThreadContext> {
        let mut groups: HashMap<ThreadId, Vec<MessageRecord>> = HashMap::new();
        for message in messages {
            if let Some(thread_id) = message.thread_id.clone() {
                groups.entry(thread_id).or_default().push(message);
            }
        }

        // Shared for the life of this single build, per `spec.md` §4.3
        // step e ("cache by message content hash for the life of the build").
        let intent_cache: Arc<DashMap<String, String>> = Arc::new(DashMap::new());

        let futures = groups.into_iter().map(|(thread_id, mut records)| {
            let intent_cache = intent_cache.clone();
            async move {
                records.sort_by_key(|m| m.timestamp);
                self.build_context(user_id, thread_id, records, config, &intent_cache).await
            }
        });

        let mut contexts: Vec<ThreadContext> = join_all(futures).await;
        contexts.sort_by(|a, b| b.last_activity.cmp(&a.last_activity));
        contexts.truncate(MAX_THREADS_PER_USER);
        contexts
    }

    async fn build_context(
        &self,
        user_id: &str,
        thread_id: ThreadId,
        records: Vec<MessageRecord>,
        config: &ResolverConfig,
        intent_cache: &DashMap<String, String>,
    ) -> ThreadContext {
        let last_activity = records.last().map(|m| m.timestamp).unwrap_or_else(Utc::now);
        let message_count = records.len();

        let status = if Utc::now() - last_activity >= config.dormancy_threshold() {
            ThreadStatus::Dormant
        } else {
            ThreadStatus::Active
        };

        let recent_messages: Vec<ThreadMessage> = records
            .iter()
            .rev()
            .take(MAX_RECENT_MESSAGES_PER_THREAD)
            .rev()
            .map(|m| ThreadMessage {
                role: m.message_type,
                content: m.message_content.clone(),
                timestamp: m.timestamp,
            })
            .collect();

        let (topic_embedding, entities, intent_history) = tokio::join!(
            self.topic_embedding(&recent_messages),
            self.collect_entities(&recent_messages),
            self.collect_intent_history(user_id, &recent_messages, intent_cache),
        );

        // Reserved for future learning (`spec.md` §3/§4.4): always 0.5,
        // matching the original's `ThreadContext` dataclass default.
        let user_engagement_score = 0.5;

        ThreadContext {
            thread_id,
            user_id: user_id.to_string(),
            last_activity,
            message_count,
            status,
            topic_embedding,
            recent_messages,
            entities,
            intent_history,
            conversation_type: "general".to_string(),
            user_engagement_score,
        }
    }

    /// Mean of embeddings for the last up-to-3 message contents
    /// (`spec.md` §4.3 step f).
    async fn topic_embedding(&self, recent_messages: &[ThreadMessage]) -> Option<Vec<f32>> {
        let sample = recent_messages.iter().rev().take(MAX_MESSAGES_EMBEDDED_PER_THREAD);
        let futures = sample.map(|m| self.embed_cached(&m.content));
        let embeddings: Vec<Vec<f32>> = join_all(futures).await.into_iter().flatten().collect();
        mean_vector(&embeddings)
    }

    async fn embed_cached(&self, text: &str) -> Option<Vec<f32>> {
        if let Some(cached) = self.embedding_cache.get(text).await {
            return Some(cached);
        }

        let lock = self.embedding_cache.flight_lock(text);
        let _guard = lock.lock().await;

        if let Some(cached) = self.embedding_cache.get(text).await {
            return Some(cached);
        }

        match tokio::time::timeout(self.adapter_deadline, self.embedding.embed(text)).await {
            Ok(Ok(embedding)) => {
                self.embedding_cache.put(text, embedding.clone()).await;
                Some(embedding)
            }
            _ => None,
        }
    }

    /// Union entities by type across recent messages, deduplicating
    /// while preserving first-seen order (`spec.md` §4.3 step d).
    async fn collect_entities(&self, recent_messages: &[ThreadMessage]) -> EntityMap {
        let futures = recent_messages.iter().map(|m| self.extract_entities(&m.content));
        let per_message: Vec<EntityMap> = join_all(futures).await;

        let mut merged: EntityMap = EntityMap::new();
        for entities in per_message {
            for (entity_type, values) in entities {
                let list = merged.entry(entity_type).or_default();
                for value in values {
                    if !list.contains(&value) {
                        list.push(value);
                    }
                }
            }
        }
        merged
    }

    async fn extract_entities(&self, text: &str) -> EntityMap {
        match tokio::time::timeout(self.adapter_deadline, self.ner.extract(text, None)).await {
            Ok(Ok(entities)) => entities,
            _ => EntityMap::new(),
        }
    }

    /// Classify each recent message via the intent adapter, caching by
    /// message content hash for the life of the build (`spec.md` §4.3
    /// step e).
    async fn collect_intent_history(
        &self,
        user_id: &str,
        recent_messages: &[ThreadMessage],
        intent_cache: &DashMap<String, String>,
    ) -> Vec<String> {
        let mut history = Vec::with_capacity(recent_messages.len());
        for message in recent_messages {
            let key = content_key(&message.content);
            let intent = if let Some(cached) = intent_cache.get(&key) {
                cached.clone()
            } else {
                let classified = self.classify_intent(user_id, &message.content, &history).await;
                intent_cache.insert(key, classified.clone());
                classified
            };
            history.push(intent);
        }
        history
    }

    async fn classify_intent(&self, user_id: &str, text: &str, recent_intents: &[String]) -> String {
        match tokio::time::timeout(self.adapter_deadline, self.intent.classify(text, user_id, recent_intents)).await {
            Ok(Ok(prediction)) if prediction.confidence >= 0.3 => prediction.intent,
            _ => "general".to_string(),
        }
    }
}

fn content_key(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::embedding::{FixtureEmbeddingAdapter, NullEmbeddingAdapter};
    use crate::adapters::intent::{FixtureIntentAdapter, NullIntentAdapter};
    use crate::adapters::ner::{FixtureNerAdapter, NullNerAdapter};
    use crate::adapters::working_store::FixtureWorkingStoreAdapter;
    use chrono::Duration as ChronoDuration;
    use std::time::Duration as StdDuration;

    fn record(thread_id: &str, user_id: &str, minutes_ago: i64) -> MessageRecord {
        MessageRecord {
            thread_id: Some(thread_id.to_string()),
            user_id: user_id.to_string(),
            message_type: MessageType::UserInput,
            message_content: "hi".to_string(),
            timestamp: Utc::now() - ChronoDuration::minutes(minutes_ago),
        }
    }

    fn builder_with_fixtures(messages: Vec<MessageRecord>) -> ContextBuilder {
        ContextBuilder::new(
            Arc::new(FixtureWorkingStoreAdapter::new(messages)),
            Arc::new(FixtureEmbeddingAdapter::new(8)),
            Arc::new(NullNerAdapter),
            Arc::new(NullIntentAdapter),
            Arc::new(EmbeddingCache::new(100, StdDuration::from_secs(60))),
            Arc::new(UserContextCache::new(10, StdDuration::from_secs(60))),
            StdDuration::from_millis(500),
        )
    }

    #[tokio::test]
    async fn groups_messages_by_thread_id() {
        let messages = vec![record("t1", "u1", 10), record("t1", "u1", 5), record("t2", "u1", 1)];
        let builder = builder_with_fixtures(messages);
        let config = ResolverConfig::default();

        let contexts = builder.contexts("u1", &config).await;
        assert_eq!(contexts.len(), 2);
        let t1 = contexts.iter().find(|c| c.thread_id == "t1").unwrap();
        assert_eq!(t1.message_count, 2);
    }

    #[tokio::test]
    async fn no_history_yields_no_contexts() {
        let builder = builder_with_fixtures(Vec::new());
        let config = ResolverConfig::default();

        let contexts = builder.contexts("brand-new-user", &config).await;
        assert!(contexts.is_empty());
    }

    #[tokio::test]
    async fn messages_older_than_24_hours_are_excluded() {
        let messages = vec![record("t1", "u1", 60 * 30)]; // 30 hours ago
        let builder = builder_with_fixtures(messages);
        let config = ResolverConfig::default();

        let contexts = builder.contexts("u1", &config).await;
        assert!(contexts.is_empty());
    }

    #[tokio::test]
    async fn stale_thread_is_marked_dormant() {
        let messages = vec![record("t1", "u1", 60 * 8)]; // 8h old, past the 2h dormancy threshold but within the 24h lookback
        let builder = builder_with_fixtures(messages);
        let config = ResolverConfig::default();

        let contexts = builder.contexts("u1", &config).await;
        assert_eq!(contexts[0].status, ThreadStatus::Dormant);
    }

    #[tokio::test]
    async fn recent_messages_capped_at_ten() {
        let messages: Vec<MessageRecord> = (0..15).map(|i| record("t1", "u1", 15 - i)).collect();
        let builder = builder_with_fixtures(messages);
        let config = ResolverConfig::default();

        let contexts = builder.contexts("u1", &config).await;
        assert_eq!(contexts[0].recent_messages.len(), 10);
    }

    #[tokio::test]
    async fn results_are_cached_on_repeat_calls() {
        let messages = vec![record("t1", "u1", 1)];
        let working_store = Arc::new(FixtureWorkingStoreAdapter::new(messages));
        let embedding_cache = Arc::new(EmbeddingCache::new(100, StdDuration::from_secs(60)));
        let context_cache = Arc::new(UserContextCache::new(10, StdDuration::from_secs(60)));
        let builder = ContextBuilder::new(
            working_store,
            Arc::new(FixtureEmbeddingAdapter::new(8)),
            Arc::new(NullNerAdapter),
            Arc::new(NullIntentAdapter),
            embedding_cache,
            context_cache.clone(),
            StdDuration::from_millis(500),
        );
        let config = ResolverConfig::default();

        builder.contexts("u1", &config).await;
        assert!(context_cache.get("u1").await.is_some());
    }

    #[tokio::test]
    async fn contexts_sorted_most_recent_first() {
        let messages = vec![record("old", "u1", 120), record("new", "u1", 1)];
        let builder = builder_with_fixtures(messages);
        let config = ResolverConfig::default();

        let contexts = builder.contexts("u1", &config).await;
        assert_eq!(contexts[0].thread_id, "new");
        assert_eq!(contexts[1].thread_id, "old");
    }

    #[tokio::test]
    async fn topic_embedding_is_populated_when_embedding_adapter_available() {
        let messages = vec![record("t1", "u1", 1)];
        let builder = builder_with_fixtures(messages);
        let config = ResolverConfig::default();

        let contexts = builder.contexts("u1", &config).await;
        assert!(contexts[0].topic_embedding.is_some());
    }

    #[tokio::test]
    async fn topic_embedding_is_none_when_embedding_adapter_unavailable() {
        let messages = vec![record("t1", "u1", 1)];
        let builder = ContextBuilder::new(
            Arc::new(FixtureWorkingStoreAdapter::new(messages)),
            Arc::new(NullEmbeddingAdapter),
            Arc::new(NullNerAdapter),
            Arc::new(NullIntentAdapter),
            Arc::new(EmbeddingCache::new(100, StdDuration::from_secs(60))),
            Arc::new(UserContextCache::new(10, StdDuration::from_secs(60))),
            StdDuration::from_millis(500),
        );
        let config = ResolverConfig::default();

        let contexts = builder.contexts("u1", &config).await;
        assert!(contexts[0].topic_embedding.is_none());
    }

    #[tokio::test]
    async fn entities_are_unioned_across_recent_messages_via_ner_adapter() {
        let mut messages = vec![record("t1", "u1", 5), record("t1", "u1", 1)];
        messages[0].message_content = "Alice called Bob".to_string();
        messages[1].message_content = "Bob replied to Carol".to_string();
        let builder = ContextBuilder::new(
            Arc::new(FixtureWorkingStoreAdapter::new(messages)),
            Arc::new(FixtureEmbeddingAdapter::new(8)),
            Arc::new(FixtureNerAdapter),
            Arc::new(NullIntentAdapter),
            Arc::new(EmbeddingCache::new(100, StdDuration::from_secs(60))),
            Arc::new(UserContextCache::new(10, StdDuration::from_secs(60))),
            StdDuration::from_millis(500),
        );
        let config = ResolverConfig::default();

        let contexts = builder.contexts("u1", &config).await;
        let persons = contexts[0].entities.get("PERSON").unwrap();
        assert!(persons.contains(&"Bob".to_string()));
        assert!(persons.contains(&"Carol".to_string()));
        // dedup: "Bob" appears in both messages but only once in the union
        assert_eq!(persons.iter().filter(|p| *p == "Bob").count(), 1);
    }

    #[tokio::test]
    async fn intent_history_reflects_classification_per_message() {
        let mut messages = vec![record("t1", "u1", 5), record("t1", "u1", 1)];
        messages[0].message_content = "What time is it?".to_string();
        messages[1].message_content = "Thanks for the help".to_string();
        let builder = ContextBuilder::new(
            Arc::new(FixtureWorkingStoreAdapter::new(messages)),
            Arc::new(FixtureEmbeddingAdapter::new(8)),
            Arc::new(NullNerAdapter),
            Arc::new(FixtureIntentAdapter),
            Arc::new(EmbeddingCache::new(100, StdDuration::from_secs(60))),
            Arc::new(UserContextCache::new(10, StdDuration::from_secs(60))),
            StdDuration::from_millis(500),
        );
        let config = ResolverConfig::default();

        let contexts = builder.contexts("u1", &config).await;
        assert_eq!(contexts[0].intent_history, vec!["question".to_string(), "general".to_string()]);
    }

    #[tokio::test]
    async fn intent_history_is_empty_when_adapter_unavailable() {
        let messages = vec![record("t1", "u1", 1)];
        let builder = builder_with_fixtures(messages);
        let config = ResolverConfig::default();

        let contexts = builder.contexts("u1", &config).await;
        assert_eq!(contexts[0].intent_history, vec!["general".to_string()]);
    }
}
