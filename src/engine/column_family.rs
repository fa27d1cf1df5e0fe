//! Column Family State
//!
//! Everything the engine keeps per column family: its options, memtable and
//! table files.

use std::path::{Path, PathBuf};

use crate::cache::Cache;
use crate::config::Options;
use crate::memtable::MemTable;
use crate::native::ColumnFamilyId;
use crate::storage::StorageManager;

use super::view::CfView;

pub(crate) struct ColumnFamily {
    id: ColumnFamilyId,
    name: String,
    options: Options,
    pub(crate) memtable: MemTable,
    pub(crate) storage: StorageManager,
}

impl ColumnFamily {
    pub(crate) fn new(id: ColumnFamilyId, name: String, options: Options, storage: StorageManager) -> Self {
        Self {
            id,
            name,
            options,
            memtable: MemTable::new(),
            storage,
        }
    }

    /// `<db>/sstables/cf_<id>`
    pub(crate) fn dir(db_path: &Path, id: ColumnFamilyId) -> PathBuf {
        db_path.join("sstables").join(format!("cf_{}", id))
    }

    pub(crate) fn id(&self) -> ColumnFamilyId {
        self.id
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn options(&self) -> &Options {
        &self.options
    }

    pub(crate) fn cache(&self) -> Option<&Cache> {
        self.options.block_cache()
    }

    /// Consistent view: memtable first, then files, so a concurrent flush
    /// cannot hide an entry from it
    pub(crate) fn view(&self) -> CfView {
        let memtable = self.memtable.snapshot();
        let tables = self.storage.tables();
        CfView { memtable, tables }
    }
}
