//! MemTable implementation
//!
//! Copy-on-write BTreeMap with RwLock for concurrency.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;

use super::MemTableEntry;
use crate::range::KeyBounds;

/// Immutable point-in-time view of a memtable
pub type MemTableView = Arc<BTreeMap<Vec<u8>, MemTableEntry>>;

/// Per-entry bookkeeping overhead added to the size estimate
const ENTRY_OVERHEAD: usize = 16;

/// In-memory table for recent writes
pub struct MemTable {
    data: RwLock<MemTableView>,
    /// Approximate size in bytes
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(Arc::new(BTreeMap::new())),
            size: AtomicUsize::new(0),
        }
    }

    /// Get a value by key (read lock)
    pub fn get(&self, key: &[u8]) -> Option<MemTableEntry> {
        self.data.read().get(key).cloned()
    }

    /// Put a key-value pair, returning the new approximate size
    pub fn put(&self, key: Vec<u8>, value: impl Into<Bytes>) -> usize {
        self.insert(key, MemTableEntry::Value(value.into()))
    }

    /// Delete a key (inserts tombstone), returning the new approximate size
    pub fn delete(&self, key: Vec<u8>) -> usize {
        self.insert(key, MemTableEntry::Tombstone)
    }

    fn insert(&self, key: Vec<u8>, entry: MemTableEntry) -> usize {
        let key_charge = key.len() + ENTRY_OVERHEAD;
        let value_charge = entry.charge();

        // Size is only updated under the write lock
        let mut data = self.data.write();
        let prev = self.size.load(Ordering::Relaxed);
        let next = match Arc::make_mut(&mut data).insert(key, entry) {
            // Key already counted; swap the value charge
            Some(old) => prev - old.charge() + value_charge,
            None => prev + key_charge + value_charge,
        };
        self.size.store(next, Ordering::Relaxed);
        next
    }

    /// Point-in-time view; later writes do not show up in it
    pub fn snapshot(&self) -> MemTableView {
        Arc::clone(&self.data.read())
    }

    /// Swap in an empty table and return what it held
    pub fn clear(&self) -> MemTableView {
        let mut data = self.data.write();
        self.size.store(0, Ordering::Relaxed);
        std::mem::replace(&mut *data, Arc::new(BTreeMap::new()))
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Get entry count (tombstones included)
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }

    /// Approximate bytes and entry count held for keys inside `bounds`
    pub fn approximate_stats_in(&self, bounds: KeyBounds<'_>) -> (u64, u64) {
        let range = match bounds.as_range() {
            Some(range) => range,
            None => return (0, 0),
        };
        let data = self.snapshot();
        data.range::<[u8], _>(range).fold((0, 0), |(bytes, count), (k, v)| {
            (bytes + (k.len() + v.charge()) as u64, count + 1)
        })
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
