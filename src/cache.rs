//! Block Cache
//!
//! LRU cache of values read from table files, shared by every column family
//! whose options carry it. Entries are keyed by (table file id, user key) and
//! charged by key + value length.

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use lru::LruCache;
use parking_lot::Mutex;

/// Shared handle to an LRU cache. Cloning shares the same cache.
#[derive(Clone)]
pub struct Cache {
    inner: Arc<Mutex<LruState>>,
}

type CacheKey = (u64, Vec<u8>);

struct LruState {
    capacity: usize,
    /// Sum of key + value lengths of every entry
    usage: usize,
    /// Unbounded by count; eviction is driven by `usage`
    entries: LruCache<CacheKey, Bytes>,
}

fn charge_of(key: &CacheKey, value: &Bytes) -> usize {
    key.1.len() + value.len()
}

impl Cache {
    /// Create an LRU cache holding up to `capacity` bytes
    pub fn new_lru(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(LruState {
                capacity,
                usage: 0,
                entries: LruCache::unbounded(),
            })),
        }
    }

    /// Configured capacity in bytes
    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity
    }

    /// Bytes currently charged to the cache
    pub fn usage(&self) -> usize {
        self.inner.lock().usage
    }

    /// Bytes held by entries that cannot be evicted. Readers always copy
    /// values out, so nothing is ever pinned.
    pub fn pinned_usage(&self) -> usize {
        0
    }

    /// Look up a cached value, marking it most recently used
    pub fn lookup(&self, file_id: u64, key: &[u8]) -> Option<Bytes> {
        self.inner.lock().entries.get(&(file_id, key.to_vec())).cloned()
    }

    /// Insert a value, evicting least recently used entries to make room.
    /// Values larger than the whole cache are not stored.
    pub fn insert(&self, file_id: u64, key: &[u8], value: Bytes) {
        let cache_key = (file_id, key.to_vec());
        let charge = charge_of(&cache_key, &value);
        let mut state = self.inner.lock();
        if charge > state.capacity {
            return;
        }

        state.remove(&cache_key);
        while state.usage + charge > state.capacity {
            match state.entries.pop_lru() {
                Some((old_key, old_value)) => state.usage -= charge_of(&old_key, &old_value),
                None => break,
            }
        }

        state.entries.put(cache_key, value);
        state.usage += charge;
    }

    /// Drop every entry belonging to a table file that no longer exists
    pub fn erase_file(&self, file_id: u64) {
        let mut state = self.inner.lock();
        let doomed: Vec<CacheKey> = state
            .entries
            .iter()
            .filter(|((id, _), _)| *id == file_id)
            .map(|(key, _)| key.clone())
            .collect();
        for key in doomed {
            state.remove(&key);
        }
    }
}

impl LruState {
    fn remove(&mut self, key: &CacheKey) {
        if let Some(value) = self.entries.pop(key) {
            self.usage -= charge_of(key, &value);
        }
    }
}

impl fmt::Debug for Cache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("Cache")
            .field("capacity", &state.capacity)
            .field("usage", &state.usage)
            .field("entries", &state.entries.len())
            .finish()
    }
}
