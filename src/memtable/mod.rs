//! MemTable Module
//!
//! In-memory data structure for recent writes, one per column family.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Track size for flush triggers
//! - Cheap point-in-time views for snapshots, iterators and flushes
//!
//! ## Data Structure Choice
//! A `BTreeMap` behind `RwLock<Arc<..>>`:
//! - Ordered keys (required for SSTable generation and iteration)
//! - Readers clone the `Arc` and never block writers for long
//! - Writers copy the map only while a view of the old version is alive

mod table;

use bytes::Bytes;

pub use table::{MemTable, MemTableView};

/// Entry stored in the MemTable
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemTableEntry {
    /// A live value
    Value(Bytes),

    /// A tombstone (deleted key)
    Tombstone,
}

impl MemTableEntry {
    /// Bytes this entry charges against the write buffer
    pub(crate) fn charge(&self) -> usize {
        match self {
            MemTableEntry::Value(v) => v.len(),
            MemTableEntry::Tombstone => 0,
        }
    }
}
