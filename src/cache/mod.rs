//! Cache Entry Store
//!
//! The delta proxy cache consumes its store through the [`CacheStore`] trait:
//! get, set, and a scoped per-key lock. Absence of a key is a cold cache,
//! never an error.
//!
//! - **key**: Cache key derivation from (backend, statement, step)
//! - **locks**: Sharded map of per-key async mutexes
//! - **memory**: In-memory reference store (TTL + LRU, compressed entries)
//!
//! # Entry Layout
//!
//! ```text
//! CacheEntry
//!   key          sha256(backend, statement, step)
//!   extents      coalesced, step-aligned coverage
//!   series       points inside the extents, sorted by timestamp
//!   last_access  unix millis of the last write
//! ```

pub mod key;
pub mod locks;
pub mod memory;

pub use key::derive_key;
pub use locks::{KeyGuard, KeyLocks};
pub use memory::{MemoryCache, MemoryCacheConfig};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::timeseries::{Extent, Series};

/// A cached series and the extents it covers
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    /// Coverage of `series`; coalesced on every write
    pub extents: Vec<Extent>,
    pub series: Series,
    /// Unix timestamp in milliseconds
    pub last_access: i64,
}

impl CacheEntry {
    /// Empty entry for a cold key
    pub fn empty(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.extents.is_empty()
    }
}

/// Counters exposed on the health endpoint
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
}

/// Errors raised by a cache store
#[derive(Error, Debug)]
pub enum CacheError {
    /// The store cannot be reached or refused the operation
    #[error("Cache store unavailable: {0}")]
    Unavailable(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Stored frame failed its checksum or could not be decompressed
    #[error("Corrupt cache entry: {0}")]
    Corruption(String),
}

impl From<bincode::Error> for CacheError {
    fn from(err: bincode::Error) -> Self {
        CacheError::Serialization(err.to_string())
    }
}

/// Result type alias for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// Storage interface consumed by the delta proxy cache
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Load an entry; `Ok(None)` when the key is absent or expired
    async fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>>;

    /// Store an entry under `entry.key`, replacing any previous value
    async fn set(&self, entry: &CacheEntry) -> CacheResult<()>;

    /// Acquire the merge/store critical section for a key
    ///
    /// The lock is released when the guard is dropped.
    async fn lock(&self, key: &str) -> CacheResult<KeyGuard>;

    /// Check the store is reachable without touching entries or counters
    async fn ping(&self) -> CacheResult<()> {
        Ok(())
    }

    /// Store counters
    fn stats(&self) -> CacheStats {
        CacheStats::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_entry() {
        let entry = CacheEntry::empty("k");
        assert_eq!(entry.key, "k");
        assert!(entry.is_empty());
        assert!(entry.series.is_empty());
    }

    #[test]
    fn test_error_display() {
        let err = CacheError::Unavailable("connection refused".to_string());
        assert_eq!(err.to_string(), "Cache store unavailable: connection refused");
    }
}
