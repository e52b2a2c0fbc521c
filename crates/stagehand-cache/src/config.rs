//! Configuration for the document cache.

use std::time::Duration;

/// Default maximum number of cached documents.
pub const DEFAULT_MAX_DOCUMENTS: usize = 100;

/// Configuration for the document cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of documents to keep before LRU eviction.
    pub max_documents: usize,

    /// Optional time-to-live. Entries not accessed within this duration expire.
    pub ttl: Option<Duration>,

    /// Interval for the background cleanup task.
    pub cleanup_interval: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_documents: DEFAULT_MAX_DOCUMENTS,
            ttl: None,
            cleanup_interval: Duration::from_secs(60),
        }
    }
}

impl CacheConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of documents.
    pub fn with_max_documents(mut self, max: usize) -> Self {
        self.max_documents = max;
        self
    }

    /// Set the TTL for cached documents.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Disable the TTL.
    pub fn without_ttl(mut self) -> Self {
        self.ttl = None;
        self
    }

    /// Set the cleanup interval.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.cleanup_interval = interval;
        self
    }
}
