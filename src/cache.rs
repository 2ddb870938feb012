//! In-memory TTL cache.
//!
//! Expiry is lazy: stale entries are dropped when they are read, or when
//! `size`/`stats` sweep the map. There is no background eviction, so the key
//! space is expected to stay small.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_TTL: Duration = Duration::from_secs(10 * 60);

struct CacheEntry<V> {
    value: V,
    // None means the deadline overflowed `Instant`, i.e. never expires.
    expires_at: Option<Instant>,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_entries: usize,
    pub active_entries: usize,
    pub expired_entries: usize,
    pub cache_size: usize,
}

pub struct TtlCache<V> {
    entries: DashMap<String, CacheEntry<V>>,
    default_ttl: Duration,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self::with_default_ttl(DEFAULT_TTL)
    }

    pub fn with_default_ttl(default_ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    pub fn put(&self, key: impl Into<String>, value: V) {
        self.put_with_ttl(key, value, self.default_ttl);
    }

    pub fn put_with_ttl(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let entry = CacheEntry {
            value,
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries.insert(key.into(), entry);
    }

    /// Returns the value if present and not expired. An expired entry is
    /// evicted as a side effect.
    pub fn get(&self, key: &str) -> Option<V> {
        let now = Instant::now();
        {
            let entry = self.entries.get(key)?;
            if !entry.is_expired(now) {
                debug!("Cache hit for {}", key);
                return Some(entry.value.clone());
            }
        }
        // The read guard is released above; only evict if nobody stored a
        // fresh value in between.
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        debug!("Cache entry expired for {}", key);
        None
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of live entries. Expired entries are purged first.
    pub fn size(&self) -> usize {
        self.purge_expired();
        self.entries.len()
    }

    pub fn stats(&self) -> CacheStats {
        self.purge_expired();
        let total = self.entries.len();
        CacheStats {
            total_entries: total,
            active_entries: total,
            expired_entries: 0,
            cache_size: self.size(),
        }
    }

    fn purge_expired(&self) {
        let now = Instant::now();
        self.entries.retain(|_, entry| !entry.is_expired(now));
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
