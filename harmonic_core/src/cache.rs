//! Bounded per-resolution caches
//!
//! Ring geometry, phase tables and spin-harmonic tables are expensive to
//! build and are reused across calls at the same resolution. Each kind lives
//! in its own LRU cache owned by the engine; the capacity bounds how many
//! resolutions (or `(spin, resolution)` pairs) stay resident.
//!
//! Values are handed out as `Arc`, so an eviction never invalidates a table
//! that a transform is still reading.

use std::fmt::Debug;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use serde::Serialize;

use crate::error::TransformResult;

/// Hit/miss counters and occupancy of one cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
    pub capacity: usize,
}

impl CacheStats {
    /// Returns value in [0.0, 1.0] representing hit/(hit+miss)
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct CacheState<K: Hash + Eq, V> {
    cache: LruCache<K, Arc<V>>,
    hits: u64,
    misses: u64,
}

/// LRU cache keyed by resolution (or resolution plus spin)
///
/// The lock covers lookups and inserts only, never a build. Builds may run
/// on the rayon pool, and a worker waiting on one can pick up a job that
/// asks this same cache for another key.
pub struct ResolutionCache<K: Hash + Eq, V> {
    name: &'static str,
    state: Mutex<CacheState<K, V>>,
}

impl<K, V> ResolutionCache<K, V>
where
    K: Hash + Eq + Clone + Debug,
{
    /// Create a cache holding at most `capacity` entries
    pub fn new(name: &'static str, capacity: NonZeroUsize) -> Self {
        Self {
            name,
            state: Mutex::new(CacheState {
                cache: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
        }
    }

    /// Get a cached value or build it
    ///
    /// Two callers missing the same key may both build it; the first insert
    /// wins and both receive the resident value. A failing `build` leaves
    /// the cache untouched.
    pub fn get_or_try_insert_with<F>(&self, key: K, build: F) -> TransformResult<Arc<V>>
    where
        F: FnOnce(&K) -> TransformResult<V>,
    {
        {
            let mut state = self.lock();
            if let Some(cached) = state.cache.get(&key) {
                let cached = Arc::clone(cached);
                state.hits += 1;
                return Ok(cached);
            }
            state.misses += 1;
        }

        tracing::debug!(cache = self.name, key = ?key, "building cache entry");
        let built = Arc::new(build(&key)?);

        let mut state = self.lock();
        if let Some(resident) = state.cache.get(&key) {
            return Ok(Arc::clone(resident));
        }
        if let Some((evicted, _)) = state.cache.push(key, Arc::clone(&built)) {
            tracing::debug!(cache = self.name, key = ?evicted, "evicted cache entry");
        }
        Ok(built)
    }

    /// Whether `key` is resident, without touching recency
    pub fn contains(&self, key: &K) -> bool {
        self.lock().cache.contains(key)
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            len: state.cache.len(),
            capacity: state.cache.cap().get(),
        }
    }

    /// Clear the cache and reset statistics
    pub fn clear(&self) {
        let mut state = self.lock();
        state.cache.clear();
        state.hits = 0;
        state.misses = 0;
    }

    fn lock(&self) -> MutexGuard<'_, CacheState<K, V>> {
        // Entries are immutable once inserted, so a poisoned lock still
        // guards a consistent map.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
