//! Access-time tracking for TTL expiry.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

/// Tracks last access times for TTL-based expiration.
#[derive(Debug)]
pub struct TtlTracker<K> {
    access_times: HashMap<K, Instant>,
    ttl: Option<Duration>,
}

impl<K: Hash + Eq + Clone> TtlTracker<K> {
    /// Create a tracker. `None` disables expiry.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            access_times: HashMap::new(),
            ttl,
        }
    }

    /// Record an access, resetting the key's timer.
    pub fn touch(&mut self, key: &K) {
        self.access_times.insert(key.clone(), Instant::now());
    }

    /// Whether a key has outlived the TTL.
    ///
    /// Untracked keys count as expired when a TTL is set.
    pub fn is_expired(&self, key: &K) -> bool {
        match self.ttl {
            None => false,
            Some(ttl) => self
                .access_times
                .get(key)
                .is_none_or(|last| last.elapsed() > ttl),
        }
    }

    /// Stop tracking a key.
    pub fn remove(&mut self, key: &K) {
        self.access_times.remove(key);
    }

    /// Remove all expired keys and return them.
    pub fn drain_expired(&mut self) -> Vec<K> {
        let Some(ttl) = self.ttl else {
            return Vec::new();
        };
        let now = Instant::now();
        let expired: Vec<K> = self
            .access_times
            .iter()
            .filter(|(_, last)| now.duration_since(**last) > ttl)
            .map(|(key, _)| key.clone())
            .collect();
        for key in &expired {
            self.access_times.remove(key);
        }
        expired
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.access_times.len()
    }

    /// Whether nothing is tracked.
    pub fn is_empty(&self) -> bool {
        self.access_times.is_empty()
    }

    /// The configured TTL.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }
}
