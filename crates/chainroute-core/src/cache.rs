//! TTL quote cache. Entries are valid while `now - timestamp < ttl` and are
//! evicted lazily when a read finds them expired.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Default time-to-live for cached quotes.
pub const DEFAULT_QUOTE_TTL: Duration = Duration::from_secs(300);

/// A cached value with its insertion time and lifetime.
#[derive(Debug, Clone)]
pub struct CachedQuote<V> {
    pub value: V,
    pub timestamp: Instant,
    pub ttl: Duration,
}

impl<V> CachedQuote<V> {
    pub fn is_valid(&self) -> bool {
        self.timestamp.elapsed() < self.ttl
    }
}

pub struct QuoteCache<K, V> {
    default_ttl: Duration,
    entries: Mutex<HashMap<K, CachedQuote<V>>>,
}

impl<K, V> QuoteCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            default_ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<K, CachedQuote<V>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the value if still valid; an expired entry is removed.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = self.lock();
        match entries.get(key) {
            Some(entry) if entry.is_valid() => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert or overwrite with the default TTL.
    pub fn insert(&self, key: K, value: V) {
        self.insert_with_ttl(key, value, self.default_ttl);
    }

    pub fn insert_with_ttl(&self, key: K, value: V, ttl: Duration) {
        self.lock().insert(
            key,
            CachedQuote {
                value,
                timestamp: Instant::now(),
                ttl,
            },
        );
    }

    pub fn remove(&self, key: &K) -> Option<V> {
        self.lock().remove(key).map(|e| e.value)
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, e| e.is_valid());
        before - entries.len()
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl<K: Eq + Hash, V: Clone> Default for QuoteCache<K, V> {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTE_TTL)
    }
}
