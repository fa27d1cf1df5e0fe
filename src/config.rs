//! Configuration for atlasbind
//!
//! Option structs handed to the engine at open time and per call. All have
//! sensible defaults; `Options` also has a builder.

use crate::cache::Cache;
use crate::callback::{
    compaction_filter_name, register_compaction_filter, register_merge_operator, CompactionFilter,
    MergeOperator, IDENTITY_FILTER_INDEX,
};
use crate::snapshot::{Snapshot, SnapshotId};

/// Options for opening a database or creating a column family
#[derive(Debug, Clone)]
pub struct Options {
    // -------------------------------------------------------------------------
    // Open Behaviour
    // -------------------------------------------------------------------------
    /// Create the database directory if it is missing
    pub create_if_missing: bool,

    /// Fail to open if the database already exists
    pub error_if_exists: bool,

    /// Create column families named at open time that do not exist yet
    pub create_missing_column_families: bool,

    /// Verify table checksums when opening table files
    pub paranoid_checks: bool,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // MemTable / Compaction Configuration
    // -------------------------------------------------------------------------
    /// Max size of a memtable before flush (in bytes)
    pub write_buffer_size: usize,

    /// Number of level-0 files that triggers a background compaction
    pub level0_file_num_compaction_trigger: usize,

    /// Never schedule compactions on the background worker
    pub disable_auto_compactions: bool,

    // -------------------------------------------------------------------------
    // Callbacks (registry indices)
    // -------------------------------------------------------------------------
    compaction_filter: usize,
    merge_operator: Option<usize>,

    // -------------------------------------------------------------------------
    // Table Configuration
    // -------------------------------------------------------------------------
    table_options: BlockBasedTableOptions,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Options {
    fn default() -> Self {
        Self {
            create_if_missing: false,
            error_if_exists: false,
            create_missing_column_families: false,
            paranoid_checks: false,
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            write_buffer_size: 64 * 1024 * 1024, // 64 MB
            level0_file_num_compaction_trigger: 4,
            disable_auto_compactions: false,
            compaction_filter: IDENTITY_FILTER_INDEX,
            merge_operator: None,
            table_options: BlockBasedTableOptions::default(),
        }
    }
}

impl Options {
    /// Create a new options builder
    pub fn builder() -> OptionsBuilder {
        OptionsBuilder::default()
    }

    /// Install a compaction filter. The filter is registered for the process
    /// lifetime; options cloned afterwards share it.
    pub fn set_compaction_filter(&mut self, filter: impl CompactionFilter) {
        self.compaction_filter = register_compaction_filter(filter);
    }

    /// Install a merge operator. Registered for the process lifetime.
    pub fn set_merge_operator(&mut self, operator: impl MergeOperator) {
        self.merge_operator = Some(register_merge_operator(operator));
    }

    /// Install block-based table options
    pub fn set_block_based_table_factory(&mut self, table_options: &BlockBasedTableOptions) {
        self.table_options = table_options.clone();
    }

    /// Registry index of the compaction filter (identity when none was set)
    pub fn compaction_filter_index(&self) -> usize {
        self.compaction_filter
    }

    /// Name of the configured compaction filter; empty for the identity filter
    pub fn compaction_filter_name(&self) -> String {
        compaction_filter_name(self.compaction_filter).to_string()
    }

    /// Registry index of the merge operator, if any
    pub fn merge_operator_index(&self) -> Option<usize> {
        self.merge_operator
    }

    /// Block cache, if one was configured
    pub fn block_cache(&self) -> Option<&Cache> {
        self.table_options.block_cache.as_ref()
    }
}

/// Builder for Options
#[derive(Default)]
pub struct OptionsBuilder {
    options: Options,
}

impl OptionsBuilder {
    /// Create the database if missing
    pub fn create_if_missing(mut self, value: bool) -> Self {
        self.options.create_if_missing = value;
        self
    }

    /// Fail if the database already exists
    pub fn error_if_exists(mut self, value: bool) -> Self {
        self.options.error_if_exists = value;
        self
    }

    /// Create column families missing at open time
    pub fn create_missing_column_families(mut self, value: bool) -> Self {
        self.options.create_missing_column_families = value;
        self
    }

    /// Verify table checksums on open
    pub fn paranoid_checks(mut self, value: bool) -> Self {
        self.options.paranoid_checks = value;
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.options.wal_sync_strategy = strategy;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn write_buffer_size(mut self, size: usize) -> Self {
        self.options.write_buffer_size = size;
        self
    }

    /// Set the level-0 file count that triggers compaction
    pub fn level0_file_num_compaction_trigger(mut self, count: usize) -> Self {
        self.options.level0_file_num_compaction_trigger = count;
        self
    }

    /// Turn automatic compactions off
    pub fn disable_auto_compactions(mut self, value: bool) -> Self {
        self.options.disable_auto_compactions = value;
        self
    }

    /// Install a compaction filter
    pub fn compaction_filter(mut self, filter: impl CompactionFilter) -> Self {
        self.options.set_compaction_filter(filter);
        self
    }

    /// Install a merge operator
    pub fn merge_operator(mut self, operator: impl MergeOperator) -> Self {
        self.options.set_merge_operator(operator);
        self
    }

    /// Install block-based table options
    pub fn block_based_table_factory(mut self, table_options: &BlockBasedTableOptions) -> Self {
        self.options.set_block_based_table_factory(table_options);
        self
    }

    pub fn build(self) -> Options {
        self.options
    }
}

/// Table-level options
#[derive(Debug, Clone, Default)]
pub struct BlockBasedTableOptions {
    block_cache: Option<Cache>,
}

impl BlockBasedTableOptions {
    /// Default table options (no block cache)
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache values read from table files
    pub fn set_block_cache(&mut self, cache: &Cache) {
        self.block_cache = Some(cache.clone());
    }

    /// Stop caching table reads
    pub fn set_no_block_cache(&mut self) {
        self.block_cache = None;
    }
}

/// Per-read options
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Read as of this snapshot instead of the latest state
    pub snapshot: Option<SnapshotId>,

    /// Iterators skip keys below this bound
    pub iterate_lower_bound: Option<Vec<u8>>,

    /// Iterators stop before this bound
    pub iterate_upper_bound: Option<Vec<u8>>,

    /// Put values read from table files into the block cache
    pub fill_cache: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            snapshot: None,
            iterate_lower_bound: None,
            iterate_upper_bound: None,
            fill_cache: true,
        }
    }
}

impl ReadOptions {
    /// Read as of `snapshot`
    pub fn set_snapshot(&mut self, snapshot: &Snapshot) {
        self.snapshot = Some(snapshot.id());
    }

    /// Set the inclusive lower bound for iteration
    pub fn set_iterate_lower_bound(&mut self, key: impl Into<Vec<u8>>) {
        self.iterate_lower_bound = Some(key.into());
    }

    /// Set the exclusive upper bound for iteration
    pub fn set_iterate_upper_bound(&mut self, key: impl Into<Vec<u8>>) {
        self.iterate_upper_bound = Some(key.into());
    }

    /// Enable or disable block cache fill
    pub fn set_fill_cache(&mut self, value: bool) {
        self.fill_cache = value;
    }
}

/// Per-write options
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    /// fsync the WAL before acknowledging the write
    pub sync: bool,

    /// Skip the WAL; the write is lost on crash until the next flush
    pub disable_wal: bool,
}

impl WriteOptions {
    pub fn set_sync(&mut self, value: bool) {
        self.sync = value;
    }

    pub fn disable_wal(&mut self, value: bool) {
        self.disable_wal = value;
    }
}

/// Options for a manual flush
#[derive(Debug, Clone, Copy)]
pub struct FlushOptions {
    /// Block until the flush completes. When false the flush is queued on
    /// the engine's background worker.
    pub wait: bool,
}

impl Default for FlushOptions {
    fn default() -> Self {
        Self { wait: true }
    }
}

impl FlushOptions {
    pub fn set_wait(&mut self, value: bool) {
        self.wait = value;
    }
}
