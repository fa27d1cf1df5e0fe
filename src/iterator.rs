//! Iterators
//!
//! [`DbIterator`] wraps a native cursor. Like snapshots, it is tied to the
//! handle's liveness only at creation time.

use crate::error::{Error, Result};
use crate::native::NativeIterator;

/// Cursor over the keys of one column family.
///
/// ```text
///   seek_to_first / seek / seek_for_prev / seek_to_last
///          │
///          ▼
///   while valid() { key(), value(), next() }
///          │
///          ▼
///   status()  ── error hit while moving, if any
/// ```
pub struct DbIterator {
    inner: Box<dyn NativeIterator>,
}

impl DbIterator {
    pub(crate) fn new(inner: Box<dyn NativeIterator>) -> Self {
        Self { inner }
    }

    pub fn seek_to_first(&mut self) {
        self.inner.seek_to_first();
    }

    pub fn seek_to_last(&mut self) {
        self.inner.seek_to_last();
    }

    /// Move to the first key at or after `key`
    pub fn seek(&mut self, key: &[u8]) {
        self.inner.seek(key);
    }

    /// Move to the last key at or before `key`
    pub fn seek_for_prev(&mut self, key: &[u8]) {
        self.inner.seek_for_prev(key);
    }

    pub fn next(&mut self) {
        self.inner.next();
    }

    pub fn prev(&mut self) {
        self.inner.prev();
    }

    pub fn valid(&self) -> bool {
        self.inner.valid()
    }

    /// Current key; `None` when not valid
    pub fn key(&self) -> Option<&[u8]> {
        self.inner.key()
    }

    /// Current value; `None` when not valid
    pub fn value(&self) -> Option<&[u8]> {
        self.inner.value()
    }

    pub fn status(&self) -> Result<()> {
        self.inner.status().map_err(Error::Engine)
    }

    /// Drain from the current position forward into owned pairs
    pub fn collect_remaining(&mut self) -> Vec<(Vec<u8>, Vec<u8>)> {
        let mut out = Vec::new();
        while self.valid() {
            if let (Some(k), Some(v)) = (self.key(), self.value()) {
                out.push((k.to_vec(), v.to_vec()));
            }
            self.next();
        }
        out
    }
}
