//! LRU + TTL document cache with per-key build locks.

use std::collections::HashMap;
use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::{Mutex as AsyncMutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::key::DocumentKey;
use crate::ttl::TtlTracker;

/// State protected by the cache's RwLock.
struct CacheInner<V> {
    lru: LruCache<DocumentKey, V>,
    ttl: TtlTracker<DocumentKey>,
}

impl<V> CacheInner<V> {
    /// Drop an entry if its TTL has lapsed. Returns true if something was removed.
    fn evict_if_expired(&mut self, key: &DocumentKey) -> bool {
        if self.ttl.ttl().is_some() && self.lru.contains(key) && self.ttl.is_expired(key) {
            self.lru.pop(key);
            self.ttl.remove(key);
            debug!(key = %key, "Document expired, removed from cache");
            return true;
        }
        false
    }
}

/// Build locks for keys currently being built.
type BuildLocks = parking_lot::Mutex<HashMap<DocumentKey, Arc<AsyncMutex<()>>>>;

/// One caller's hold on a key's build lock.
///
/// The last holder to drop removes the lock from the map, including when
/// the build future is dropped part way through.
struct BuildSlot<'a> {
    locks: &'a BuildLocks,
    key: &'a DocumentKey,
    lock: Arc<AsyncMutex<()>>,
}

impl<'a> BuildSlot<'a> {
    fn acquire(locks: &'a BuildLocks, key: &'a DocumentKey) -> Self {
        let lock = Arc::clone(locks.lock().entry(key.clone()).or_default());
        Self { locks, key, lock }
    }
}

impl Drop for BuildSlot<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.lock();
        // Held by the map and this slot only.
        let last = locks
            .get(self.key)
            .is_some_and(|current| Arc::ptr_eq(current, &self.lock))
            && Arc::strong_count(&self.lock) == 2;
        if last {
            locks.remove(self.key);
        }
    }
}

/// Process-wide cache of built documents, keyed by conversation and URL.
///
/// Values are stored and removed as a whole, so a reader never sees half an
/// entry. Cloning the cache yields another handle to the same storage.
pub struct DocumentCache<V> {
    inner: Arc<RwLock<CacheInner<V>>>,
    building: Arc<BuildLocks>,
    config: CacheConfig,
}

impl<V: Clone + Send + Sync + 'static> DocumentCache<V> {
    /// Create an empty cache.
    pub fn new(config: CacheConfig) -> Self {
        let cap = NonZeroUsize::new(config.max_documents).unwrap_or(NonZeroUsize::MIN);

        let inner = CacheInner {
            lru: LruCache::new(cap),
            ttl: TtlTracker::new(config.ttl),
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
            building: Arc::new(parking_lot::Mutex::new(HashMap::new())),
            config,
        }
    }

    /// The cache configuration.
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Number of cached documents (including ones not yet swept for expiry).
    pub async fn len(&self) -> usize {
        self.inner.read().await.lru.len()
    }

    /// Whether the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.lru.is_empty()
    }

    /// Look up a document, marking it recently used and resetting its TTL.
    pub async fn get(&self, key: &DocumentKey) -> Option<V> {
        let mut inner = self.inner.write().await;

        if inner.evict_if_expired(key) {
            return None;
        }

        let value = inner.lru.get(key).cloned()?;
        inner.ttl.touch(key);
        trace!(key = %key, "Document cache hit");
        Some(value)
    }

    /// Check for a live entry without touching LRU order or TTL.
    pub async fn contains(&self, key: &DocumentKey) -> bool {
        let inner = self.inner.read().await;
        inner.lru.contains(key) && !inner.ttl.is_expired(key)
    }

    /// Insert a document, evicting the least recently used one at capacity.
    pub async fn insert(&self, key: DocumentKey, value: V) {
        let mut inner = self.inner.write().await;

        if let Some((evicted, _)) = inner.lru.push(key.clone(), value)
            && evicted != key
        {
            debug!(key = %evicted, "Evicting LRU document to make room");
            inner.ttl.remove(&evicted);
        }
        inner.ttl.touch(&key);

        trace!(
            key = %key,
            cache_size = inner.lru.len(),
            "Document inserted into cache"
        );
    }

    /// Return the cached value, or build and cache it.
    ///
    /// Concurrent callers for the same key wait on one build and then read its
    /// result. A failed build caches nothing and the error goes to the caller
    /// that ran it.
    pub async fn get_or_try_insert_with<F, Fut, E>(
        &self,
        key: &DocumentKey,
        build: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        let slot = BuildSlot::acquire(&self.building, key);
        let _guard = slot.lock.lock().await;

        // Someone else may have finished the build while we waited.
        if let Some(value) = self.get(key).await {
            return Ok(value);
        }

        debug!(key = %key, "Document cache miss, building");
        let result = build().await;
        if let Ok(ref value) = result {
            self.insert(key.clone(), value.clone()).await;
        }
        result
    }

    /// Remove one document. Returns true if it was cached.
    pub async fn invalidate(&self, key: &DocumentKey) -> bool {
        let mut inner = self.inner.write().await;
        inner.ttl.remove(key);
        let removed = inner.lru.pop(key).is_some();
        if removed {
            debug!(key = %key, "Document invalidated");
        }
        removed
    }

    /// Remove every document cached for a conversation.
    pub async fn invalidate_conversation(&self, conversation_id: &str) -> usize {
        let mut inner = self.inner.write().await;
        let keys: Vec<DocumentKey> = inner
            .lru
            .iter()
            .filter(|(key, _)| key.conversation_id() == conversation_id)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &keys {
            inner.lru.pop(key);
            inner.ttl.remove(key);
        }

        if !keys.is_empty() {
            debug!(
                conversation_id = %conversation_id,
                count = keys.len(),
                "Invalidated conversation documents"
            );
        }
        keys.len()
    }

    /// Sweep expired documents. Returns how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut inner = self.inner.write().await;
        let expired = inner.ttl.drain_expired();

        let mut count = 0;
        for key in expired {
            if inner.lru.pop(&key).is_some() {
                count += 1;
            }
        }

        if count > 0 {
            debug!(count = count, "Cleaned up expired documents");
        }
        count
    }

    /// Run [`cleanup_expired`](Self::cleanup_expired) on the configured
    /// interval until `cancel` fires.
    pub fn spawn_cleanup_task(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let cache = self.clone();
        let period = self.config.cleanup_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        cache.cleanup_expired().await;
                    }
                }
            }
            trace!("Document cache cleanup task stopped");
        })
    }

    /// Cache statistics.
    pub async fn stats(&self) -> CacheStats {
        let inner = self.inner.read().await;
        CacheStats {
            size: inner.lru.len(),
            capacity: self.config.max_documents,
            ttl_tracked: inner.ttl.len(),
        }
    }
}

impl<V> Clone for DocumentCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            building: Arc::clone(&self.building),
            config: self.config.clone(),
        }
    }
}

impl<V> std::fmt::Debug for DocumentCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentCache")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Current number of cached documents.
    pub size: usize,

    /// Maximum capacity.
    pub capacity: usize,

    /// Number of documents tracked for TTL.
    pub ttl_tracked: usize,
}
