//! Callback Registry
//!
//! Append-only, copy-on-write table from index to callback.
//!
//! ## Concurrency
//! - `register`: serialized by `append_lock`; copies the current table,
//!   appends, then publishes the new table with a single atomic swap.
//! - `get`: loads the published table without locking. A reader sees either
//!   the old or the new table, never a half-built one.
//!
//! Entries are never removed. The engine may keep an index forever (a
//! background compaction can fire long after configuration), so removal
//! would leave it dangling.

use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::Mutex;

use crate::error::invariant_violation;

/// Process-lifetime table of callbacks addressed by stable indices
pub struct CallbackRegistry<T> {
    /// Currently published table
    entries: ArcSwap<Vec<Arc<T>>>,

    /// Serializes registrations
    append_lock: Mutex<()>,
}

impl<T> CallbackRegistry<T> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: ArcSwap::from_pointee(Vec::new()),
            append_lock: Mutex::new(()),
        }
    }

    /// Append `entry` and return its index.
    ///
    /// Indices start at 0, increase by one per call and are never reused.
    pub fn register(&self, entry: T) -> usize {
        let _append = self.append_lock.lock();

        let current = self.entries.load();
        let mut next = Vec::with_capacity(current.len() + 1);
        next.extend(current.iter().cloned());
        next.push(Arc::new(entry));

        let index = next.len() - 1;
        self.entries.store(Arc::new(next));
        index
    }

    /// Fetch the entry at `index`.
    ///
    /// Indices only come from [`register`](Self::register), so an unknown
    /// index is a programming error and aborts the calling thread.
    pub fn get(&self, index: usize) -> Arc<T> {
        let entries = self.entries.load();
        match entries.get(index) {
            Some(entry) => Arc::clone(entry),
            None => invariant_violation(format!(
                "callback index {} out of range (registered: {})",
                index,
                entries.len()
            )),
        }
    }

    /// Number of registered entries
    pub fn len(&self) -> usize {
        self.entries.load().len()
    }

    /// True if nothing has been registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for CallbackRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
