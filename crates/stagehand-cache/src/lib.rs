//! Document cache with LRU eviction, TTL and single-flight builds.
//!
//! Retrieval indexes are expensive to build (extract, chunk, embed, index), so
//! they are cached per conversation and per document:
//! - LRU eviction bounds memory use
//! - Optional TTL expires entries for conversations that went quiet
//! - A per-key build lock makes concurrent misses share a single build
//!
//! # Example
//!
//! ```rust,ignore
//! use stagehand_cache::{CacheConfig, DocumentCache, DocumentKey};
//!
//! let cache = DocumentCache::new(
//!     CacheConfig::default()
//!         .with_max_documents(100)
//!         .with_ttl(Duration::from_secs(3600)),
//! );
//!
//! let key = DocumentKey::new("conv-1", "files/abc/report.txt");
//! let index = cache
//!     .get_or_try_insert_with(&key, || async { build_index().await })
//!     .await?;
//! ```

mod cache;
mod config;
mod key;
mod ttl;

pub use cache::{CacheStats, DocumentCache};
pub use config::CacheConfig;
pub use key::DocumentKey;
pub use ttl::TtlTracker;
