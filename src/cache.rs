//! Short-lived cache of derived query results.
//!
//! Entries are keyed by operation name plus parameters (`trending:top:30`,
//! `feeds:all-items`) and expire after a fixed TTL. Nothing is invalidated on
//! write; a subscribe or refresh becomes visible once the entry ages out.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::Duration;

use lru::LruCache;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::time::Instant;

/// Default entry lifetime
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Key/value store with per-entry expiry.
///
/// Values are opaque strings; use [`get_json`] and [`set_json`] for typed
/// access. Implementations must be safe to share across request tasks.
pub trait FreshnessCache: Send + Sync {
    /// Returns the value if present and not yet expired.
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: String, ttl: Duration);

    /// Drops every entry. Called once at shutdown.
    fn clear(&self);
}

/// Read and deserialize a cached value. Undecodable entries count as misses.
pub fn get_json<T: DeserializeOwned>(cache: &dyn FreshnessCache, key: &str) -> Option<T> {
    let raw = cache.get(key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "Discarding undecodable cache entry");
            None
        }
    }
}

/// Serialize and store a value. Serialization failures are logged, not raised.
pub fn set_json<T: Serialize + ?Sized>(
    cache: &dyn FreshnessCache,
    key: &str,
    value: &T,
    ttl: Duration,
) {
    match serde_json::to_string(value) {
        Ok(raw) => cache.set(key, raw, ttl),
        Err(e) => tracing::warn!(key = %key, error = %e, "Failed to serialize cache entry"),
    }
}

struct Entry {
    expires_at: Instant,
    value: String,
}

/// In-process cache bounded by entry count, evicting least recently used.
///
/// Expiry uses the tokio clock so tests can drive it with a paused runtime.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryCache {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LruCache<String, Entry>> {
        // A panic while holding the lock cannot leave an entry half-written
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl FreshnessCache for MemoryCache {
    fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                return Some(entry.value.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.pop(key);
        }
        None
    }

    fn set(&self, key: &str, value: String, ttl: Duration) {
        let entry = Entry {
            expires_at: Instant::now() + ttl,
            value,
        };
        self.lock().put(key.to_owned(), entry);
    }

    fn clear(&self) {
        self.lock().clear();
    }
}
