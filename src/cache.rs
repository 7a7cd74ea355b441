//! Cache layer (C6): bounded, TTL-based, process-local caches for
//! embeddings and per-user thread-context snapshots.
//!
//! Structure follows the teacher pack's `embedding-service::cache`
//! (an `lru::LruCache` behind a `tokio::sync::RwLock`, with a hit/miss
//! counter), extended with TTL-on-read (checked against a stored
//! timestamp rather than a background sweep, matching the original
//! Python implementation's `(now - cached.timestamp).seconds < ttl`
//! check) and a single-flight map so concurrent misses for the same
//! key only trigger one loader (`spec.md` §4.6).

use dashmap::DashMap;
use lru::LruCache;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};

use crate::types::{Embedding, ThreadContext};

/// Hit/miss counters for a single cache instance.
#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f32 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f32 / total as f32
        }
    }
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
}

/// A generic TTL+LRU+single-flight cache. Both the embedding cache and
/// the user-context cache are instances of this with different `V`.
struct TtlLruCache<V: Clone> {
    entries: RwLock<LruCache<String, Entry<V>>>,
    ttl: Duration,
    hits: std::sync::atomic::AtomicU64,
    misses: std::sync::atomic::AtomicU64,
    in_flight: DashMap<String, Arc<Mutex<()>>>,
}

impl<V: Clone> TtlLruCache<V> {
    fn new(capacity: usize, ttl: Duration) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap();
        Self {
            entries: RwLock::new(LruCache::new(cap)),
            ttl,
            hits: std::sync::atomic::AtomicU64::new(0),
            misses: std::sync::atomic::AtomicU64::new(0),
            in_flight: DashMap::new(),
        }
    }

    async fn get(&self, key: &str) -> Option<V> {
        let mut guard = self.entries.write().await;
        if let Some(entry) = guard.get(key) {
            if entry.inserted_at.elapsed() <= self.ttl {
                self.hits.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                return Some(entry.value.clone());
            }
            guard.pop(key);
        }
        self.misses.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        None
    }

    async fn put(&self, key: String, value: V) {
        let mut guard = self.entries.write().await;
        guard.put(key, Entry { value, inserted_at: Instant::now() });
    }

    async fn stats(&self) -> CacheStats {
        let guard = self.entries.read().await;
        CacheStats {
            hits: self.hits.load(std::sync::atomic::Ordering::Relaxed),
            misses: self.misses.load(std::sync::atomic::Ordering::Relaxed),
            len: guard.len(),
            capacity: guard.cap().get(),
        }
    }

    async fn clear(&self) {
        self.entries.write().await.clear();
    }

    /// Lock held per-key for the lifetime of a loader, so concurrent
    /// misses on the same key serialize onto one upstream call instead
    /// of stampeding it.
    fn flight_lock(&self, key: &str) -> Arc<Mutex<()>> {
        self.in_flight.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

/// Cache key for an embedding: SHA-256 of the raw text, so identical
/// input is idempotent regardless of process lifetime (`spec.md` §4.1).
pub fn embedding_cache_key(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Embedding cache: key = hash(text), TTL 1h, max 10,000 entries.
pub struct EmbeddingCache {
    inner: TtlLruCache<Embedding>,
}

impl EmbeddingCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self { inner: TtlLruCache::new(max_entries, ttl) }
    }

    pub async fn get(&self, text: &str) -> Option<Embedding> {
        self.inner.get(&embedding_cache_key(text)).await
    }

    pub async fn put(&self, text: &str, embedding: Embedding) {
        self.inner.put(embedding_cache_key(text), embedding).await;
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.stats().await
    }

    pub async fn clear(&self) {
        self.inner.clear().await;
    }

    /// Single-flight lock for a given text's embedding lookup.
    pub fn flight_lock(&self, text: &str) -> Arc<Mutex<()>> {
        self.inner.flight_lock(&embedding_cache_key(text))
    }
}

/// A cached snapshot of a user's thread contexts.
#[derive(Debug, Clone)]
pub struct UserContextSnapshot {
    pub contexts: Vec<ThreadContext>,
}

/// User-context cache: key = user_id, TTL 5min, max 5,000 entries.
pub struct UserContextCache {
    inner: TtlLruCache<UserContextSnapshot>,
}

impl UserContextCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self { inner: TtlLruCache::new(max_entries, ttl) }
    }

    pub async fn get(&self, user_id: &str) -> Option<Vec<ThreadContext>> {
        self.inner.get(user_id).await.map(|s| s.contexts)
    }

    pub async fn put(&self, user_id: &str, contexts: Vec<ThreadContext>) {
        self.inner.put(user_id.to_string(), UserContextSnapshot { contexts }).await;
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.stats().await
    }

    pub async fn clear(&self) {
        self.inner.clear().await;
    }

    pub fn flight_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.inner.flight_lock(user_id)
    }
}
