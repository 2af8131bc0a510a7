//! Time-limited price cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone)]
struct Entry<T> {
    value: T,
    fetched_at: Instant,
}

/// Concurrent cache keyed by upper-case symbol.
///
/// Expired entries are kept so callers can fall back to the last known value.
#[derive(Debug, Clone)]
pub struct PriceCache<T> {
    entries: Arc<DashMap<String, Entry<T>>>,
    ttl: Duration,
}

impl<T: Clone> PriceCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Value stored less than `ttl` ago.
    pub fn get_fresh(&self, symbol: &str) -> Option<T> {
        self.entries
            .get(&key(symbol))
            .filter(|e| e.fetched_at.elapsed() < self.ttl)
            .map(|e| e.value.clone())
    }

    /// Last stored value regardless of age.
    pub fn get_any(&self, symbol: &str) -> Option<T> {
        self.entries.get(&key(symbol)).map(|e| e.value.clone())
    }

    pub fn insert(&self, symbol: &str, value: T) {
        self.entries.insert(
            key(symbol),
            Entry {
                value,
                fetched_at: Instant::now(),
            },
        );
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn key(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}
