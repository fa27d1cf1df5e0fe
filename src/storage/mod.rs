//! Storage Module
//!
//! Persistent storage layer using an SSTable format.
//!
//! ## Responsibilities
//! - Persist memtables to disk in sorted format
//! - Point lookups and range scans over immutable tables
//! - Per-level bookkeeping used by compaction and the property queries
//!
//! ## Layout
//! ```text
//! <db>/sstables/cf_<id>/sstable_<file id>.sst
//! ```
//! File ids are unique across the whole database, so a higher id always
//! holds newer data for the same key.

mod manager;
pub mod sstable;

pub use manager::{StorageManager, TableSet};
pub(crate) use manager::get_from;
pub use sstable::{
    SSTable, SSTableBuilder, SSTableIterator, SSTableReader, TableLookup, NUM_LEVELS,
};
