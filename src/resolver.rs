//! Resolver orchestrator (C7): the public entry point.
//!
//! `spec.md` §4.7. `ThreadResolver::builder()` mirrors the teacher
//! pack's `EmbeddingServiceImpl::new(provider, config)` construction
//! style, generalized to inject all six collaborator adapters; every
//! adapter defaults to its `Null*` implementation so `ThreadResolver`
//! is always constructible and always safe to call even with nothing
//! configured (it will simply fall back to new-thread-per-message).

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tracing::{info_span, Instrument};
use uuid::Uuid;

use crate::adapters::embedding::NullEmbeddingAdapter;
use crate::adapters::intent::NullIntentAdapter;
use crate::adapters::ner::NullNerAdapter;
use crate::adapters::semantic_memory::NullSemanticMemoryAdapter;
use crate::adapters::sentiment::NullSentimentAdapter;
use crate::adapters::working_store::NullWorkingStoreAdapter;
use crate::adapters::{
    EmbeddingAdapter, IntentAdapter, NerAdapter, SemanticMemoryAdapter, SentimentAdapter, WorkingStoreAdapter,
};
use crate::analyzer::MessageAnalyzer;
use crate::cache::{EmbeddingCache, UserContextCache};
use crate::config::ResolverConfig;
use crate::context_builder::ContextBuilder;
use crate::decision::DecisionMatrix;
use crate::metrics::{health_check, HealthReport, PerformanceSnapshot, ResolverMetrics};
use crate::scorer::Scorer;
use crate::types::{ThreadReason, ThreadResolution};

/// Builds a `ThreadResolver` with whichever adapters the caller has
/// available; anything left unset defaults to its `Null*` adapter.
pub struct ThreadResolverBuilder {
    config: ResolverConfig,
    embedding: Arc<dyn EmbeddingAdapter>,
    intent: Arc<dyn IntentAdapter>,
    ner: Arc<dyn NerAdapter>,
    sentiment: Arc<dyn SentimentAdapter>,
    working_store: Arc<dyn WorkingStoreAdapter>,
    semantic_memory: Arc<dyn SemanticMemoryAdapter>,
    configured: std::collections::HashMap<&'static str, bool>,
}

impl Default for ThreadResolverBuilder {
    fn default() -> Self {
        let mut configured = std::collections::HashMap::new();
        for name in ["embedding", "intent", "ner", "sentiment", "working_store", "semantic_memory"] {
            configured.insert(name, false);
        }
        Self {
            config: ResolverConfig::default(),
            embedding: Arc::new(NullEmbeddingAdapter),
            intent: Arc::new(NullIntentAdapter),
            ner: Arc::new(NullNerAdapter),
            sentiment: Arc::new(NullSentimentAdapter),
            working_store: Arc::new(NullWorkingStoreAdapter),
            semantic_memory: Arc::new(NullSemanticMemoryAdapter),
            configured,
        }
    }
}

impl ThreadResolverBuilder {
    pub fn config(mut self, config: ResolverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn embedding_adapter(mut self, adapter: Arc<dyn EmbeddingAdapter>) -> Self {
        self.embedding = adapter;
        self.configured.insert("embedding", true);
        self
    }

    pub fn intent_adapter(mut self, adapter: Arc<dyn IntentAdapter>) -> Self {
        self.intent = adapter;
        self.configured.insert("intent", true);
        self
    }

    pub fn ner_adapter(mut self, adapter: Arc<dyn NerAdapter>) -> Self {
        self.ner = adapter;
        self.configured.insert("ner", true);
        self
    }

    pub fn sentiment_adapter(mut self, adapter: Arc<dyn SentimentAdapter>) -> Self {
        self.sentiment = adapter;
        self.configured.insert("sentiment", true);
        self
    }

    pub fn working_store_adapter(mut self, adapter: Arc<dyn WorkingStoreAdapter>) -> Self {
        self.working_store = adapter;
        self.configured.insert("working_store", true);
        self
    }

    pub fn semantic_memory_adapter(mut self, adapter: Arc<dyn SemanticMemoryAdapter>) -> Self {
        self.semantic_memory = adapter;
        self.configured.insert("semantic_memory", true);
        self
    }

    pub fn build(self) -> ThreadResolver {
        let embedding_cache = Arc::new(EmbeddingCache::new(10_000, Duration::from_secs(self.config.embedding_cache_ttl_seconds)));
        let context_cache = Arc::new(UserContextCache::new(5_000, Duration::from_secs(self.config.context_cache_ttl_seconds)));

        let analyzer = MessageAnalyzer::new(
            self.embedding.clone(),
            self.intent.clone(),
            self.ner.clone(),
            embedding_cache.clone(),
            Duration::from_millis(self.config.analyzer_deadline_ms),
            Duration::from_millis(self.config.adapter_deadline_ms),
            self.config.embedding_dimension,
        );

        let context_builder = ContextBuilder::new(
            self.working_store.clone(),
            self.embedding.clone(),
            self.ner.clone(),
            self.intent.clone(),
            embedding_cache.clone(),
            context_cache.clone(),
            Duration::from_millis(self.config.adapter_deadline_ms),
        );

        ThreadResolver {
            config: self.config,
            analyzer,
            context_builder,
            scorer: Scorer,
            decision_matrix: DecisionMatrix,
            sentiment: self.sentiment,
            semantic_memory: self.semantic_memory,
            metrics: Arc::new(ResolverMetrics::new()),
            embedding_cache,
            context_cache,
            configured: self.configured,
        }
    }
}

/// The conversation thread resolver.
///
/// `resolve` is infallible by signature (`spec.md` §4.7, §7): every
/// internal failure degrades to a fallback `ThreadResolution` rather
/// than propagating an error to the caller.
pub struct ThreadResolver {
    config: ResolverConfig,
    analyzer: MessageAnalyzer,
    context_builder: ContextBuilder,
    scorer: Scorer,
    decision_matrix: DecisionMatrix,
    #[allow(dead_code)]
    sentiment: Arc<dyn SentimentAdapter>,
    #[allow(dead_code)]
    semantic_memory: Arc<dyn SemanticMemoryAdapter>,
    metrics: Arc<ResolverMetrics>,
    embedding_cache: Arc<EmbeddingCache>,
    context_cache: Arc<UserContextCache>,
    configured: std::collections::HashMap<&'static str, bool>,
}

impl ThreadResolver {
    pub fn builder() -> ThreadResolverBuilder {
        ThreadResolverBuilder::default()
    }

    /// Convenience constructor: every adapter defaults to `Null*`, so
    /// this resolver always treats every user as brand-new. Useful for
    /// embedding the decision logic in a host process that wires up
    /// its own collaborators via `builder()` incrementally.
    pub fn new(config: ResolverConfig) -> Self {
        ThreadResolverBuilder::default().config(config).build()
    }

    /// Resolve which thread `message` belongs to for `user_id`.
    ///
    /// Never panics and never returns an error: on internal timeout or
    /// unexpected failure this degrades to a low-confidence new-thread
    /// resolution with `ThreadReason::Fallback` (`spec.md` §4.7
    /// invariant 4).
    pub async fn resolve(&self, user_id: &str, message: &str) -> ThreadResolution {
        let span = info_span!("resolve_thread", user_id_hash = %hash_user_id(user_id));
        self.resolve_inner(user_id, message).instrument(span).await
    }

    async fn resolve_inner(&self, user_id: &str, message: &str) -> ThreadResolution {
        let started = Instant::now();
        let deadline = Duration::from_millis(self.config.resolver_total_deadline_ms);

        // Catch a panic anywhere in the pipeline at this single boundary
        // (spec.md §7 "Catastrophic" taxonomy entry) so one bad input
        // degrades to a fallback resolution instead of unwinding into
        // the caller.
        let pipeline = std::panic::AssertUnwindSafe(self.run_pipeline(user_id, message)).catch_unwind();

        let mut resolution = match tokio::time::timeout(deadline, pipeline).await {
            Ok(Ok(resolution)) => resolution,
            Ok(Err(_panic)) => catastrophic_resolution("internal panic during resolution"),
            Err(_) => fallback_resolution("resolver deadline exceeded"),
        };

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        let was_fallback = resolution.primary_reason == ThreadReason::Fallback;
        self.metrics.record_request(elapsed_ms, was_fallback);

        resolution.context_factors.insert("resolution_time_ms".to_string(), serde_json::json!(elapsed_ms));
        resolution.context_factors.insert(
            "service_status".to_string(),
            serde_json::json!(self.configured.iter().map(|(k, v)| (k.to_string(), *v)).collect::<std::collections::HashMap<_, _>>()),
        );

        resolution
    }

    async fn run_pipeline(&self, user_id: &str, message: &str) -> ThreadResolution {
        let contexts = self.context_builder.contexts(user_id, &self.config).await;
        let recent_intents: Vec<String> = contexts
            .iter()
            .flat_map(|ctx| ctx.intent_history.iter().cloned())
            .collect();

        let analysis = self.analyzer.analyze(user_id, message, &recent_intents).await;
        let scores = self.scorer.score(&analysis, &contexts);

        self.decision_matrix.decide(message, &analysis, &contexts, &scores, &self.config)
    }

    /// Point-in-time performance snapshot (`spec.md` §9 supplemented
    /// feature: `get_performance_metrics`), with `cache_hit_rate`
    /// blended across the embedding and user-context caches.
    pub async fn performance_metrics(&self) -> PerformanceSnapshot {
        let mut snapshot = self.metrics.snapshot();
        let embedding_stats = self.embedding_cache.stats().await;
        let context_stats = self.context_cache.stats().await;
        let hits = embedding_stats.hits + context_stats.hits;
        let total = hits + embedding_stats.misses + context_stats.misses;
        snapshot.cache_hit_rate = if total == 0 { 0.0 } else { hits as f64 / total as f64 };
        snapshot
    }

    /// Aggregate health verdict plus per-collaborator status
    /// (`spec.md` §9 supplemented feature: `health_check`).
    pub fn health_check(&self) -> HealthReport {
        let snapshot = self.metrics.snapshot();
        let services = self.configured.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        health_check(&snapshot, services)
    }
}

fn fallback_resolution(reasoning: impl Into<String>) -> ThreadResolution {
    let mut resolution = ThreadResolution::new_thread(ThreadReason::Fallback, 0.4, reasoning);
    resolution.thread_id = Uuid::new_v4().to_string();
    resolution
}

/// `spec.md` §7: a Catastrophic failure (panic/unhandled) caught at the
/// orchestrator boundary always carries confidence exactly 0.3.
fn catastrophic_resolution(reasoning: impl Into<String>) -> ThreadResolution {
    let mut resolution = ThreadResolution::new_thread(ThreadReason::Fallback, 0.3, reasoning);
    resolution.thread_id = Uuid::new_v4().to_string();
    resolution
}

fn hash_user_id(user_id: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(user_id.as_bytes());
    format!("{:x}", hasher.finalize())[..12].to_string()
}
