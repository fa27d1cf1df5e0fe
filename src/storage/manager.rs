//! Storage Manager
//!
//! Manages the SSTables of one column family.
//!
//! ## Responsibilities
//! - Discover existing SSTables on startup
//! - Search SSTables newest → oldest for reads
//! - Create new SSTables from MemTable flushes
//! - Swap file sets atomically after compaction or file deletion

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::Cache;
use crate::error::{StoreError, StoreResult};
use crate::memtable::{MemTableEntry, MemTableView};

use super::sstable::{
    parse_table_file_name, table_file_name, SSTable, SSTableBuilder, SSTableReader, TableLookup,
};

/// Immutable list of open tables, newest first
pub type TableSet = Arc<Vec<Arc<SSTableReader>>>;

/// Manages the storage layer of a single column family
///
/// ## Concurrency:
/// - `tables`: RwLock around an `Arc`'d list; readers clone the `Arc` and
///   search without holding the lock
/// - File ids are allocated by the caller, engine-wide
/// - All methods use `&self`
pub struct StorageManager {
    /// Directory where this column family's SSTables are stored
    data_dir: PathBuf,

    /// Open SSTable readers, ordered newest → oldest by file id
    tables: RwLock<TableSet>,
}

impl StorageManager {
    /// Open or create storage in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Take the live table ids from `live`, or discover them on disk
    /// 3. Open readers for each (loads indexes into RAM)
    /// 4. Order by ID descending (newest first)
    pub fn open(path: &Path, live: Option<&[u64]>, paranoid: bool) -> StoreResult<Self> {
        fs::create_dir_all(path)?;

        let mut table_ids = match live {
            Some(ids) => ids.to_vec(),
            None => Self::discover(path)?,
        };

        // Sort newest first (highest ID first)
        table_ids.sort_unstable_by(|a, b| b.cmp(a));
        table_ids.dedup();

        let mut tables = Vec::with_capacity(table_ids.len());
        for id in table_ids {
            let table_path = path.join(table_file_name(id));
            if !table_path.exists() {
                return Err(StoreError::Corruption(format!(
                    "missing table file {}",
                    table_path.display()
                )));
            }
            tables.push(Arc::new(SSTableReader::open(&table_path, id, paranoid)?));
        }

        tracing::debug!(dir = %path.display(), tables = tables.len(), "opened storage");

        Ok(Self {
            data_dir: path.to_path_buf(),
            tables: RwLock::new(Arc::new(tables)),
        })
    }

    /// Ids of every table file present in `path`
    pub fn discover(path: &Path) -> StoreResult<Vec<u64>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(path)? {
            let file_path = entry?.path();
            if file_path.is_file() {
                if let Some(id) = parse_table_file_name(&file_path) {
                    ids.push(id);
                }
            }
        }
        Ok(ids)
    }

    /// Table files on disk that are not part of the live set
    pub fn orphans(&self) -> StoreResult<Vec<PathBuf>> {
        let live: Vec<u64> = self.tables.read().iter().map(|t| t.file_id()).collect();
        Ok(Self::discover(&self.data_dir)?
            .into_iter()
            .filter(|id| !live.contains(id))
            .map(|id| self.table_path(id))
            .collect())
    }

    /// Ids of the live tables, newest first
    pub fn file_ids(&self) -> Vec<u64> {
        self.tables.read().iter().map(|t| t.file_id()).collect()
    }

    /// Get a value by key (searches all SSTables newest → oldest)
    ///
    /// Returns `Ok(None)` if the key is missing or its newest entry is a tombstone.
    pub fn get(
        &self,
        key: &[u8],
        cache: Option<&Cache>,
        fill_cache: bool,
    ) -> StoreResult<Option<bytes::Bytes>> {
        get_from(&self.tables(), key, cache, fill_cache)
    }

    /// Write a memtable view to a new level-0 SSTable and install it
    ///
    /// Returns `None` without touching disk if the view is empty.
    pub fn flush(&self, view: &MemTableView, file_id: u64) -> StoreResult<Option<SSTable>> {
        if view.is_empty() {
            return Ok(None);
        }

        let path = self.table_path(file_id);
        let mut builder = SSTableBuilder::new(&path, 0)?;
        for (key, entry) in view.iter() {
            let added = match entry {
                MemTableEntry::Value(v) => builder.add(key, v),
                MemTableEntry::Tombstone => builder.add_tombstone(key),
            };
            if let Err(e) = added {
                builder.abandon()?;
                return Err(e);
            }
        }
        let metadata = builder.finish()?;

        let reader = Arc::new(SSTableReader::open(&path, file_id, false)?);
        {
            let mut tables = self.tables.write();
            let mut next = Vec::with_capacity(tables.len() + 1);
            next.push(reader);
            next.extend(tables.iter().cloned());
            *tables = Arc::new(next);
        }

        Ok(Some(metadata))
    }

    /// Current table set (cheap clone)
    pub fn tables(&self) -> TableSet {
        Arc::clone(&self.tables.read())
    }

    /// Replace the tables whose ids are in `removed` with `added`, keeping
    /// newest-first order. Returns the readers taken out of the live set.
    pub fn replace(&self, removed: &[u64], added: Vec<Arc<SSTableReader>>) -> Vec<Arc<SSTableReader>> {
        let mut tables = self.tables.write();
        let (gone, mut kept): (Vec<_>, Vec<_>) = tables
            .iter()
            .cloned()
            .partition(|t| removed.contains(&t.file_id()));
        kept.extend(added);
        kept.sort_unstable_by(|a, b| b.file_id().cmp(&a.file_id()));
        *tables = Arc::new(kept);
        gone
    }

    /// Take every table out of the live set (used when dropping the family)
    pub fn clear(&self) -> Vec<Arc<SSTableReader>> {
        let mut tables = self.tables.write();
        let old = std::mem::replace(&mut *tables, Arc::new(Vec::new()));
        old.iter().cloned().collect()
    }

    /// Get the number of SSTables
    pub fn sstable_count(&self) -> usize {
        self.tables.read().len()
    }

    /// Highest file id on disk, or 0
    pub fn max_file_id(&self) -> u64 {
        self.tables.read().first().map_or(0, |t| t.file_id())
    }

    /// Number of tables on `level`
    pub fn files_at_level(&self, level: u32) -> usize {
        self.tables.read().iter().filter(|t| t.level() == level).count()
    }

    /// Sum of all table file sizes
    pub fn total_size(&self) -> u64 {
        self.tables.read().iter().map(|t| t.file_size()).sum()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// File path for the table with the given id
    pub fn table_path(&self, id: u64) -> PathBuf {
        self.data_dir.join(table_file_name(id))
    }
}

/// Search a table set newest → oldest
pub(crate) fn get_from(
    tables: &[Arc<SSTableReader>],
    key: &[u8],
    cache: Option<&Cache>,
    fill_cache: bool,
) -> StoreResult<Option<bytes::Bytes>> {
    for table in tables {
        // Skip SSTable if key is outside its range (O(1) check)
        if !table.might_contain(key) {
            continue;
        }
        match table.get(key, cache, fill_cache)? {
            TableLookup::Found(value) => return Ok(Some(value)),
            TableLookup::Deleted => return Ok(None),
            TableLookup::Missing => continue,
        }
    }
    Ok(None)
}
