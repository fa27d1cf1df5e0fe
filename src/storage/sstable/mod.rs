//! SSTable Module
//!
//! Sorted String Table - immutable on-disk sorted key-value storage.
//!
//! ## File Format
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │ Header (16 bytes)                                                   │
//! │   Magic: "ATKV" (4) | Version: u16 (2) | Level: u16 (2) | Count (8) │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                               │
//! │   [KeyLen: u32][ValLen: u32][Key][Value]                            │
//! │   ... repeated for each entry ...                                   │
//! │   (ValLen = u32::MAX means tombstone, no value bytes)               │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │ Index Block (variable)                                              │
//! │   [KeyLen: u32][Offset: u64][Key]                                   │
//! │   ... repeated for each entry ...                                   │
//! ├─────────────────────────────────────────────────────────────────────┤
//! │ Footer (16 bytes)                                                   │
//! │   IndexOffset: u64 (8) | DataCRC: u32 (4) | Padding (4)             │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

mod builder;
mod iterator;
mod reader;

use std::path::{Path, PathBuf};

use bytes::Bytes;

pub use builder::SSTableBuilder;
pub use iterator::SSTableIterator;
pub use reader::SSTableReader;

// =============================================================================
// Shared Constants (used by builder, reader, iterator)
// =============================================================================

/// Magic bytes identifying an SSTable file
pub(crate) const MAGIC: &[u8; 4] = b"ATKV";

/// Current SSTable format version
pub(crate) const VERSION: u16 = 2;

/// Header size: Magic (4) + Version (2) + Level (2) + EntryCount (8) = 16 bytes
pub(crate) const HEADER_SIZE: u64 = 16;

/// Offset of the entry count inside the header
pub(crate) const ENTRY_COUNT_OFFSET: u64 = 8;

/// Footer size: IndexOffset (8) + DataCRC (4) + Padding (4) = 16 bytes
pub(crate) const FOOTER_SIZE: u64 = 16;

/// Sentinel value indicating a tombstone (deleted key)
pub(crate) const TOMBSTONE_MARKER: u32 = u32::MAX;

/// Number of levels a table can live on
pub const NUM_LEVELS: u32 = 7;

// =============================================================================
// File Naming
// =============================================================================

/// "sstable_000042.sst" for id 42
pub fn table_file_name(id: u64) -> String {
    format!("sstable_{:06}.sst", id)
}

/// "sstable_000042.sst" → Some(42)
pub fn parse_table_file_name(path: &Path) -> Option<u64> {
    if path.extension()? != "sst" {
        return None;
    }
    let name = path.file_stem()?.to_string_lossy();
    let id_str = name.strip_prefix("sstable_")?;
    id_str.parse().ok()
}

// =============================================================================
// Lookup Result / Metadata
// =============================================================================

/// Outcome of a point lookup in one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableLookup {
    /// Key not in this table; keep searching older tables
    Missing,
    /// Key deleted in this table
    Deleted,
    /// Key has this value
    Found(Bytes),
}

/// Metadata of a freshly written SSTable
#[derive(Debug, Clone)]
pub struct SSTable {
    /// Path to the SSTable file
    pub path: PathBuf,
    /// Level the table was written for
    pub level: u32,
    /// Number of entries in this SSTable
    pub entry_count: u64,
    /// Smallest key (for range filtering)
    pub min_key: Vec<u8>,
    /// Largest key (for range filtering)
    pub max_key: Vec<u8>,
    /// File size in bytes
    pub file_size: u64,
}
