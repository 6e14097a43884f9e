//! Read-through cache store
//!
//! A `HashMap` behind a single mutex. The mutex is held across lookup *and*
//! the fetch on a miss, so a store never has more than one fetch in flight
//! and two callers racing on the same key cannot both reach the backend.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::COMPONENT;

/// Point-in-time counters for one store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

impl StoreStats {
    /// Hit rate in percent (0.0 when nothing was looked up yet)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total > 0 {
            (self.hits as f64 / total as f64) * 100.0
        } else {
            0.0
        }
    }
}

/// Unbounded memoizing map with no eviction and no expiry
pub struct CacheStore<K, V> {
    /// Short name used in hit/miss events ("read", "glob")
    kind: &'static str,
    entries: Mutex<HashMap<K, V>>,
    /// Mirrors `entries.len()`; written only while the map lock is held
    len: AtomicUsize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<K: Hash + Eq, V: Clone> CacheStore<K, V> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: Mutex::new(HashMap::new()),
            len: AtomicUsize::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    // Entries are only ever inserted whole or swapped out wholesale, so a
    // poisoned map is still consistent.
    fn lock(&self) -> MutexGuard<'_, HashMap<K, V>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the cached value for `key`, or run `fetch` and cache its
    /// result if it succeeds.
    ///
    /// Errors from `fetch` are returned as-is and leave the store untouched.
    /// `shown` is only used for the hit/miss events.
    pub fn get_or_fetch<Q, E, F>(&self, key: &Q, shown: &dyn fmt::Display, fetch: F) -> Result<V, E>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ToOwned<Owned = K> + ?Sized,
        F: FnOnce() -> Result<V, E>,
    {
        let mut entries = self.lock();

        if let Some(value) = entries.get(key) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(component = COMPONENT, cache = self.kind, key = %shown, "Cache HIT");
            return Ok(value.clone());
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        debug!(component = COMPONENT, cache = self.kind, key = %shown, "Cache MISS");

        let value = fetch()?;
        entries.insert(key.to_owned(), value.clone());
        self.len.store(entries.len(), Ordering::Relaxed);
        Ok(value)
    }

    /// Swap in an empty map
    pub fn clear(&self) {
        let mut entries = self.lock();
        *entries = HashMap::new();
        self.len.store(0, Ordering::Relaxed);
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.lock().contains_key(key)
    }

    /// Number of cached entries; does not take the map lock
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StoreStats {
        StoreStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}
