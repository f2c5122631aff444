//! Cache key derivation
//!
//! Keys are SHA-256 over the length-prefixed tuple (backend, statement,
//! step). The requested extent never takes part, so every window over the
//! same series lands in the same entry; a different step is a different
//! resampled series and gets its own key.

use sha2::{Digest, Sha256};

/// Derive the cache key for a query identity
pub fn derive_key(backend: &str, statement: &str, step: i64) -> String {
    let mut hasher = Sha256::new();
    // Length prefixes keep ("ab", "c") and ("a", "bc") apart
    for part in [backend.as_bytes(), statement.as_bytes()] {
        hasher.update((part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.update(step.to_le_bytes());
    format!("{}.dpc.{}", backend, hex::encode(hasher.finalize()))
}
