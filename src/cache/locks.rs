//! Per-key critical sections
//!
//! A fixed number of shards, each a map from cache key to an async mutex.
//! Requests for different keys never wait on each other beyond the brief
//! shard lookup; requests for the same key queue on that key's mutex.
//!
//! Guards release on drop, so a cancelled request task still releases its
//! lock. Idle mutexes are removed from the map when the last guard goes.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard};
use tokio::sync::{Mutex, OwnedMutexGuard};

const SHARD_COUNT: usize = 16;

type Shard = StdMutex<HashMap<String, Arc<Mutex<()>>>>;

/// Sharded map of per-key async mutexes
#[derive(Clone)]
pub struct KeyLocks {
    shards: Arc<Vec<Shard>>,
}

impl Default for KeyLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyLocks {
    pub fn new() -> Self {
        let shards = (0..SHARD_COUNT).map(|_| Shard::default()).collect();
        Self {
            shards: Arc::new(shards),
        }
    }

    fn shard(&self, key: &str) -> StdMutexGuard<'_, HashMap<String, Arc<Mutex<()>>>> {
        let idx = crc32fast::hash(key.as_bytes()) as usize % self.shards.len();
        // A panic while holding a shard cannot leave the map inconsistent
        self.shards[idx]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Wait for exclusive access to a key
    pub async fn lock(&self, key: &str) -> KeyGuard {
        let mutex = {
            let mut shard = self.shard(key);
            Arc::clone(shard.entry(key.to_string()).or_default())
        };

        let guard = mutex.lock_owned().await;
        tracing::trace!(key = %key, "Acquired key lock");

        KeyGuard {
            key: key.to_string(),
            locks: self.clone(),
            guard: Some(guard),
        }
    }

    /// Number of keys with a live mutex
    pub fn tracked_keys(&self) -> usize {
        (0..self.shards.len())
            .map(|idx| {
                self.shards[idx]
                    .lock()
                    .unwrap_or_else(|poisoned| poisoned.into_inner())
                    .len()
            })
            .sum()
    }
}

/// Scoped ownership of a key's critical section
pub struct KeyGuard {
    key: String,
    locks: KeyLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl KeyGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl std::fmt::Debug for KeyGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyGuard").field("key", &self.key).finish()
    }
}

impl Drop for KeyGuard {
    fn drop(&mut self) {
        drop(self.guard.take());

        let mut shard = self.locks.shard(&self.key);
        // Waiters clone the Arc under the shard lock, so a count of one
        // means nobody else holds or awaits this key
        if shard
            .get(&self.key)
            .is_some_and(|mutex| Arc::strong_count(mutex) == 1)
        {
            shard.remove(&self.key);
        }
    }
}
