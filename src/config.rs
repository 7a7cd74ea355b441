//! Resolver configuration.
//!
//! Loading configuration from files/environment is out of scope for
//! this core (`spec.md` §1); callers construct a `ResolverConfig`
//! however their host process obtains values and pass it in.

use serde::{Deserialize, Serialize};

/// Recognized, bounded configuration for the resolver pipeline.
///
/// Field names and defaults follow `spec.md` §6 "Configuration"
/// exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    pub dormancy_threshold_hours: i64,
    pub semantic_similarity_threshold: f32,
    pub topic_shift_threshold: f32,
    pub max_thread_context_messages: usize,
    pub enable_caching: bool,
    pub resolver_total_deadline_ms: u64,
    pub analyzer_deadline_ms: u64,
    pub adapter_deadline_ms: u64,
    pub context_cache_ttl_seconds: u64,
    pub embedding_cache_ttl_seconds: u64,
    pub embedding_dimension: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            dormancy_threshold_hours: 2,
            semantic_similarity_threshold: 0.7,
            topic_shift_threshold: 0.4,
            max_thread_context_messages: 50,
            enable_caching: true,
            resolver_total_deadline_ms: 3000,
            analyzer_deadline_ms: 1500,
            adapter_deadline_ms: 2000,
            context_cache_ttl_seconds: 300,
            embedding_cache_ttl_seconds: 3600,
            embedding_dimension: 768,
        }
    }
}

impl ResolverConfig {
    pub fn dormancy_threshold(&self) -> chrono::Duration {
        chrono::Duration::hours(self.dormancy_threshold_hours)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = ResolverConfig::default();
        assert_eq!(cfg.dormancy_threshold_hours, 2);
        assert!((cfg.semantic_similarity_threshold - 0.7).abs() < f32::EPSILON);
        assert!((cfg.topic_shift_threshold - 0.4).abs() < f32::EPSILON);
        assert_eq!(cfg.max_thread_context_messages, 50);
        assert!(cfg.enable_caching);
        assert_eq!(cfg.resolver_total_deadline_ms, 3000);
        assert_eq!(cfg.analyzer_deadline_ms, 1500);
        assert_eq!(cfg.adapter_deadline_ms, 2000);
        assert_eq!(cfg.context_cache_ttl_seconds, 300);
        assert_eq!(cfg.embedding_cache_ttl_seconds, 3600);
        assert_eq!(cfg.embedding_dimension, 768);
    }
}
