//! In-memory TTL cache for immutable-ish API resources.
//!
//! Used as a read-through cache within one export run: callers build a
//! composite key with [`cache_key`], try [`TtlCache::get`], and only hit
//! the network on a miss. Eviction is lazy: expired entries are dropped
//! on access, there is no background sweep.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;

/// Injectable clock returning epoch milliseconds.
pub type NowFn = Arc<dyn Fn() -> i64 + Send + Sync>;

/// Separator for composite cache keys. A control character keeps key
/// segments from colliding with path-like values.
const KEY_SEPARATOR: char = '\u{1f}';

/// Build a composite cache key from segments; `None` becomes an empty
/// segment so key positions stay stable.
#[must_use]
pub fn cache_key<'a>(parts: impl IntoIterator<Item = Option<&'a str>>) -> String {
    let mut key = String::new();
    for (i, part) in parts.into_iter().enumerate() {
        if i > 0 {
            key.push(KEY_SEPARATOR);
        }
        key.push_str(part.unwrap_or(""));
    }
    key
}

struct CacheEntry<V> {
    value: V,
    expires_at: i64,
}

/// A string-keyed value store where entries expire `ttl_ms` after insertion.
pub struct TtlCache<V> {
    ttl_ms: i64,
    now: NowFn,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    /// Create a cache with the given TTL, using the wall clock.
    #[must_use]
    pub fn new(ttl_ms: i64) -> Self {
        Self::with_clock(ttl_ms, Arc::new(|| Utc::now().timestamp_millis()))
    }

    /// Create a cache with an injected clock (deterministic tests).
    #[must_use]
    pub fn with_clock(ttl_ms: i64, now: NowFn) -> Self {
        Self {
            ttl_ms,
            now,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Get a live value, evicting it first if it has expired.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<V> {
        let now = (self.now)();
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert a value, stamping its expiry at `now + ttl_ms`.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let expires_at = (self.now)() + self.ttl_ms;
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), CacheEntry { value, expires_at });
    }

    /// Number of stored entries, including any not yet lazily evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
