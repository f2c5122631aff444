//! In-memory cache store
//!
//! Entries are kept as compact frames rather than live structs:
//!
//! ```text
//! [crc32: u32 LE][lz4(size-prepended, bincode(CacheEntry))]
//! ```
//!
//! Expired entries are dropped on read. When the store grows past
//! `max_entries`, the least recently accessed entries are evicted.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::cache::locks::{KeyGuard, KeyLocks};
use crate::cache::{CacheEntry, CacheError, CacheResult, CacheStats, CacheStore};

/// Configuration for the in-memory store
#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    /// Time an entry stays valid after its last write
    pub ttl: Duration,
    /// Maximum number of entries before LRU eviction
    pub max_entries: usize,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(6 * 3600), // 6 hours
            max_entries: 10_000,
        }
    }
}

struct StoredFrame {
    bytes: Vec<u8>,
    expires_at: Instant,
    last_access: Instant,
}

/// In-memory `CacheStore` with TTL and LRU eviction
pub struct MemoryCache {
    frames: RwLock<HashMap<String, StoredFrame>>,
    locks: KeyLocks,
    config: MemoryCacheConfig,
    hits: AtomicU64,
    misses: AtomicU64,
    entry_count: AtomicU64,
}

impl MemoryCache {
    pub fn new(config: MemoryCacheConfig) -> Self {
        Self {
            frames: RwLock::new(HashMap::new()),
            locks: KeyLocks::new(),
            config,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            entry_count: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &MemoryCacheConfig {
        &self.config
    }

    /// Remove an entry, returning whether it existed
    pub async fn remove(&self, key: &str) -> bool {
        let mut frames = self.frames.write().await;
        let removed = frames.remove(key).is_some();
        self.entry_count.store(frames.len() as u64, Ordering::Relaxed);
        removed
    }

    /// Number of stored entries, expired ones included until read
    pub async fn len(&self) -> usize {
        self.frames.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn evict_lru(frames: &mut HashMap<String, StoredFrame>, max_entries: usize) {
        while frames.len() > max_entries {
            let oldest = frames
                .iter()
                .min_by_key(|(_, frame)| frame.last_access)
                .map(|(key, _)| key.clone());
            match oldest {
                Some(key) => {
                    tracing::debug!(key = %key, "Evicting least recently used cache entry");
                    frames.remove(&key);
                }
                None => break,
            }
        }
    }
}

/// Serialize, compress and checksum an entry
pub(crate) fn encode_frame(entry: &CacheEntry) -> CacheResult<Vec<u8>> {
    let serialized = bincode::serialize(entry)?;
    let compressed = lz4_flex::compress_prepend_size(&serialized);

    let mut frame = Vec::with_capacity(4 + compressed.len());
    frame.extend_from_slice(&crc32fast::hash(&compressed).to_le_bytes());
    frame.extend_from_slice(&compressed);
    Ok(frame)
}

/// Verify, decompress and deserialize a frame
pub(crate) fn decode_frame(frame: &[u8]) -> CacheResult<CacheEntry> {
    if frame.len() < 4 {
        return Err(CacheError::Corruption(format!(
            "frame too short: {} bytes",
            frame.len()
        )));
    }

    let (crc_bytes, compressed) = frame.split_at(4);
    let stored_crc = u32::from_le_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);
    let computed_crc = crc32fast::hash(compressed);
    if stored_crc != computed_crc {
        return Err(CacheError::Corruption(format!(
            "CRC mismatch: stored={}, computed={}",
            stored_crc, computed_crc
        )));
    }

    let decompressed = lz4_flex::decompress_size_prepended(compressed)
        .map_err(|e| CacheError::Corruption(format!("LZ4 decompression failed: {}", e)))?;
    Ok(bincode::deserialize(&decompressed)?)
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> CacheResult<Option<CacheEntry>> {
        let mut frames = self.frames.write().await;
        let now = Instant::now();

        // Err(None) marks an expired frame, Err(Some(_)) an unreadable one
        let lookup = match frames.get_mut(key) {
            None => Ok(None),
            Some(frame) if frame.expires_at <= now => Err(None),
            Some(frame) => {
                frame.last_access = now;
                decode_frame(&frame.bytes).map(Some).map_err(Some)
            }
        };

        let decoded = match lookup {
            Ok(entry) => entry,
            Err(None) => {
                tracing::debug!(key = %key, "Cache entry expired");
                frames.remove(key);
                None
            }
            Err(Some(e)) => {
                tracing::warn!(key = %key, error = %e, "Dropping unreadable cache entry");
                frames.remove(key);
                None
            }
        };
        self.entry_count.store(frames.len() as u64, Ordering::Relaxed);

        if decoded.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        Ok(decoded)
    }

    async fn set(&self, entry: &CacheEntry) -> CacheResult<()> {
        let bytes = encode_frame(entry)?;
        let now = Instant::now();

        let mut frames = self.frames.write().await;
        frames.insert(
            entry.key.clone(),
            StoredFrame {
                bytes,
                expires_at: now + self.config.ttl,
                last_access: now,
            },
        );
        Self::evict_lru(&mut frames, self.config.max_entries);
        self.entry_count.store(frames.len() as u64, Ordering::Relaxed);
        Ok(())
    }

    async fn lock(&self, key: &str) -> CacheResult<KeyGuard> {
        Ok(self.locks.lock(key).await)
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entry_count.load(Ordering::Relaxed) as usize,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
