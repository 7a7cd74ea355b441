//! Metrics and health reporting (C8).
//!
//! Grounded on the source integration layer's `get_performance_metrics`,
//! `health_check`, and `_get_service_status` — this resolver keeps the
//! same three surfaces (latency/throughput snapshot, aggregate health
//! verdict, per-collaborator status map) but backs them with atomics
//! and a bounded ring buffer instead of in-process Python dicts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

const MAX_RETAINED_LATENCIES: usize = 1000;

/// Aggregate counters and a bounded window of recent latencies.
pub struct ResolverMetrics {
    total_requests: AtomicU64,
    fallback_count: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    latencies_ms: Mutex<VecDeque<f64>>,
    started_at: Instant,
}

impl Default for ResolverMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ResolverMetrics {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            fallback_count: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            latencies_ms: Mutex::new(VecDeque::with_capacity(MAX_RETAINED_LATENCIES)),
            started_at: Instant::now(),
        }
    }

    pub fn record_request(&self, latency_ms: f64, was_fallback: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if was_fallback {
            self.fallback_count.fetch_add(1, Ordering::Relaxed);
        }

        let mut latencies = self.latencies_ms.lock();
        if latencies.len() == MAX_RETAINED_LATENCIES {
            latencies.pop_front();
        }
        latencies.push_back(latency_ms);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// A point-in-time snapshot of request volume, fallback rate, and
    /// latency percentiles over the last `MAX_RETAINED_LATENCIES`
    /// requests.
    pub fn snapshot(&self) -> PerformanceSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let fallbacks = self.fallback_count.load(Ordering::Relaxed);
        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);

        let mut latencies: Vec<f64> = self.latencies_ms.lock().iter().copied().collect();
        latencies.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let avg_latency_ms = if latencies.is_empty() {
            0.0
        } else {
            latencies.iter().sum::<f64>() / latencies.len() as f64
        };
        let p95_latency_ms = percentile(&latencies, 0.95);
        let p99_latency_ms = percentile(&latencies, 0.99);

        let cache_requests = hits + misses;
        let cache_hit_rate = if cache_requests == 0 {
            0.0
        } else {
            hits as f64 / cache_requests as f64
        };

        PerformanceSnapshot {
            uptime_seconds: self.started_at.elapsed().as_secs_f64(),
            total_requests: total,
            fallback_rate: if total == 0 { 0.0 } else { fallbacks as f64 / total as f64 },
            avg_latency_ms,
            p95_latency_ms,
            p99_latency_ms,
            cache_hit_rate,
        }
    }
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    pub uptime_seconds: f64,
    pub total_requests: u64,
    pub fallback_rate: f64,
    pub avg_latency_ms: f64,
    pub p95_latency_ms: f64,
    pub p99_latency_ms: f64,
    pub cache_hit_rate: f64,
}

/// Aggregate health verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub services: HashMap<String, bool>,
    pub fallback_rate: f64,
    pub p99_latency_ms: f64,
}

/// Degraded above this fallback rate; unhealthy above
/// `UNHEALTHY_FALLBACK_RATE` or when every collaborator is down.
const DEGRADED_FALLBACK_RATE: f64 = 0.1;
const UNHEALTHY_FALLBACK_RATE: f64 = 0.5;

/// Collaborators resolution actually depends on (`spec.md` §4.7
/// pipeline). `sentiment` and `semantic_memory` are reserved/optional
/// (`spec.md` §4.1) and are reported in `services` for observability
/// but never count against the aggregate verdict.
const REQUIRED_SERVICES: &[&str] = &["embedding", "ner", "intent", "working_store"];

/// Derive a `HealthReport` from a performance snapshot and the set of
/// collaborator adapters that are currently configured (vs. `Null*`).
pub fn health_check(snapshot: &PerformanceSnapshot, services: HashMap<String, bool>) -> HealthReport {
    let required_up: Vec<bool> = REQUIRED_SERVICES
        .iter()
        .filter_map(|name| services.get(*name).copied())
        .collect();
    let any_service_up = required_up.iter().any(|up| *up);
    let all_services_up = !required_up.is_empty() && required_up.iter().all(|up| *up);

    let status = if !any_service_up || snapshot.fallback_rate >= UNHEALTHY_FALLBACK_RATE {
        HealthStatus::Unhealthy
    } else if !all_services_up || snapshot.fallback_rate >= DEGRADED_FALLBACK_RATE {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    };

    HealthReport {
        status,
        services,
        fallback_rate: snapshot.fallback_rate,
        p99_latency_ms: snapshot.p99_latency_ms,
    }
}

/// Shared handle for injecting into the resolver and its adapters.
pub type SharedMetrics = Arc<ResolverMetrics>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_with_no_requests_is_all_zero() {
        let metrics = ResolverMetrics::new();
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 0);
        assert_eq!(snapshot.fallback_rate, 0.0);
        assert_eq!(snapshot.avg_latency_ms, 0.0);
    }

    #[test]
    fn fallback_rate_reflects_ratio() {
        let metrics = ResolverMetrics::new();
        metrics.record_request(10.0, false);
        metrics.record_request(20.0, true);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.total_requests, 2);
        assert!((snapshot.fallback_rate - 0.5).abs() < 1e-9);
    }

    #[test]
    fn latency_window_is_bounded() {
        let metrics = ResolverMetrics::new();
        for i in 0..(MAX_RETAINED_LATENCIES + 10) {
            metrics.record_request(i as f64, false);
        }
        let snapshot = metrics.snapshot();
        // average should reflect only the most recent MAX_RETAINED_LATENCIES samples
        assert!(snapshot.avg_latency_ms > 10.0);
    }

    #[test]
    fn cache_hit_rate_computes_correctly() {
        let metrics = ResolverMetrics::new();
        metrics.record_cache_hit();
        metrics.record_cache_hit();
        metrics.record_cache_miss();
        let snapshot = metrics.snapshot();
        assert!((snapshot.cache_hit_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn all_services_down_is_unhealthy() {
        let metrics = ResolverMetrics::new();
        let snapshot = metrics.snapshot();
        let mut services = HashMap::new();
        services.insert("embedding".to_string(), false);
        services.insert("intent".to_string(), false);
        let report = health_check(&snapshot, services);
        assert_eq!(report.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn partial_services_down_is_degraded() {
        let metrics = ResolverMetrics::new();
        let snapshot = metrics.snapshot();
        let mut services = HashMap::new();
        services.insert("embedding".to_string(), true);
        services.insert("intent".to_string(), false);
        let report = health_check(&snapshot, services);
        assert_eq!(report.status, HealthStatus::Degraded);
    }

    #[test]
    fn all_services_up_with_low_fallback_is_healthy() {
        let metrics = ResolverMetrics::new();
        metrics.record_request(10.0, false);
        let snapshot = metrics.snapshot();
        let mut services = HashMap::new();
        services.insert("embedding".to_string(), true);
        services.insert("intent".to_string(), true);
        let report = health_check(&snapshot, services);
        assert_eq!(report.status, HealthStatus::Healthy);
    }

    #[test]
    fn high_fallback_rate_degrades_even_with_services_up() {
        let metrics = ResolverMetrics::new();
        for _ in 0..10 {
            metrics.record_request(10.0, true);
        }
        let snapshot = metrics.snapshot();
        let mut services = HashMap::new();
        services.insert("embedding".to_string(), true);
        let report = health_check(&snapshot, services);
        assert_eq!(report.status, HealthStatus::Unhealthy);
    }
}
