//! Engine Core
//!
//! Shared state of one open database and every operation on it.
//!
//! ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
//!
//! - **Writes** (put/delete/merge/batch): serialized by `write_lock`
//! - **Maintenance** (flush/compaction/file deletion/column family changes):
//!   serialized by `maintenance`, which also makes it the only writer of the
//!   MANIFEST
//! - **Reads**: never take either lock; they clone `Arc`s of the memtable
//!   and the table set and work on those
//!
//! Lock order is `maintenance` → `write_lock` → `wal`.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use crossbeam::channel::Sender;
use fs2::FileExt;
use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};

use crate::cache::Cache;
use crate::callback::{compaction_filter_name, merge_operator_full_merge, MergeVerdict};
use crate::config::{Options, ReadOptions, WriteOptions};
use crate::error::{StoreError, StoreResult};
use crate::metadata::LiveFileMetadata;
use crate::native::{ColumnFamilyId, DEFAULT_COLUMN_FAMILY_ID, DEFAULT_COLUMN_FAMILY_NAME};
use crate::perf::{PerfMetric, PerfTimer};
use crate::range::KeyBounds;
use crate::snapshot::SnapshotId;
use crate::storage::{SSTableBuilder, SSTableReader, StorageManager};
use crate::wal::{Operation, WalRecovery, WalWriter};
use crate::write_batch::BatchOp;

use super::background::Job;
use super::column_family::ColumnFamily;
use super::compaction::{self, CompactionSeed, CompactionStats};
use super::manifest::{ColumnFamilyRecord, Manifest};
use super::properties;
use super::view::{CfView, LsmIterator};

pub(crate) const WAL_FILENAME: &str = "wal.log";
pub(crate) const LOCK_FILENAME: &str = "LOCK";
pub(crate) const SSTABLE_DIR: &str = "sstables";

/// Tables waiting for file deletions to be re-enabled
#[derive(Default)]
struct FileDeletions {
    /// `disable_file_deletions` calls not yet matched by an enable
    disabled: u32,
    pending: Vec<Arc<SSTableReader>>,
}

/// How a database is being opened
pub(crate) struct OpenRequest<'a> {
    pub path: &'a Path,
    pub options: &'a Options,
    pub column_families: &'a [(String, Options)],
    pub read_only: bool,
    pub error_if_log_file_exist: bool,
}

pub(crate) struct EngineCore {
    path: PathBuf,
    options: Options,
    read_only: bool,

    families: RwLock<BTreeMap<ColumnFamilyId, Arc<ColumnFamily>>>,
    next_column_family_id: Mutex<ColumnFamilyId>,
    next_file_id: AtomicU64,

    /// `None` when opened read-only
    wal: Option<Mutex<WalWriter>>,

    write_lock: Mutex<()>,
    maintenance: Mutex<()>,

    snapshots: Mutex<HashMap<u64, HashMap<ColumnFamilyId, CfView>>>,
    next_snapshot_id: AtomicU64,

    deletions: Mutex<FileDeletions>,
    shutting_down: AtomicBool,
    flush_scheduled: AtomicBool,
    jobs: OnceCell<Sender<Job>>,

    /// Held for the lifetime of a writable open
    _lock_file: Option<File>,
}

impl EngineCore {
    // =========================================================================
    // Open
    // =========================================================================

    /// Open or create a database
    ///
    /// On startup:
    /// 1. Check existence rules and take the LOCK file
    /// 2. Load the MANIFEST and match it against the requested families
    /// 3. Open each family's tables
    /// 4. Replay the WAL into the memtables
    /// 5. Writable only: flush what was replayed, remove orphaned files
    ///
    /// Returns the core and the id of each requested family, in order.
    pub(crate) fn open(req: OpenRequest<'_>) -> StoreResult<(Self, Vec<ColumnFamilyId>)> {
        let path = req.path;
        let opts = req.options;
        let exists = Manifest::exists(path);

        if exists && opts.error_if_exists && !req.read_only {
            return Err(StoreError::InvalidArgument(format!(
                "{}: exists (error_if_exists is true)",
                path.display()
            )));
        }
        if !exists && (req.read_only || !opts.create_if_missing) {
            return Err(StoreError::InvalidArgument(format!(
                "{}: does not exist (create_if_missing is false)",
                path.display()
            )));
        }

        let lock_file = if req.read_only {
            None
        } else {
            fs::create_dir_all(path.join(SSTABLE_DIR))?;
            Some(lock_db_dir(path)?)
        };

        let wal_path = path.join(WAL_FILENAME);
        if req.read_only && req.error_if_log_file_exist {
            let has_log = fs::metadata(&wal_path).map(|m| m.len() > 0).unwrap_or(false);
            if has_log {
                return Err(StoreError::InvalidArgument(format!(
                    "{}: wal file is not empty (error_if_log_file_exist is true)",
                    path.display()
                )));
            }
        }

        let mut manifest = if exists {
            Manifest::load(path)?
        } else {
            Manifest::new()
        };

        match_column_families(&mut manifest, req.column_families, opts, req.read_only)?;

        // Open every requested family
        let mut families = BTreeMap::new();
        let mut ids = Vec::with_capacity(req.column_families.len());
        let mut max_file_id = 0;
        for (name, cf_opts) in req.column_families {
            let Some(record) = manifest.find(name) else {
                return Err(StoreError::InvalidArgument(format!(
                    "Column family not found: {}",
                    name
                )));
            };
            let dir = ColumnFamily::dir(path, record.id);
            let storage = StorageManager::open(&dir, Some(record.files.as_slice()), opts.paranoid_checks)?;
            max_file_id = max_file_id.max(storage.max_file_id());
            ids.push(record.id);
            families.insert(
                record.id,
                Arc::new(ColumnFamily::new(record.id, name.clone(), cf_opts.clone(), storage)),
            );
        }

        // Replay the WAL
        let mut next_lsn = 1;
        if wal_path.exists() {
            let (entries, result) = if req.read_only {
                WalRecovery::replay(&wal_path, opts.paranoid_checks)?
            } else {
                WalRecovery::recover(&wal_path, opts.paranoid_checks)?
            };
            if result.entries_recovered > 0 || result.entries_corrupted > 0 {
                tracing::info!(
                    recovered = result.entries_recovered,
                    corrupted = result.entries_corrupted,
                    last_lsn = result.last_lsn,
                    "WAL recovery"
                );
            }
            next_lsn = result.last_lsn + 1;
            for entry in entries {
                for op in entry.operations {
                    let Some(cf) = families.get(&op.column_family()) else {
                        continue;
                    };
                    match op {
                        Operation::Put { key, value, .. } => cf.memtable.put(key, value),
                        Operation::Delete { key, .. } => cf.memtable.delete(key),
                    };
                }
            }
        }

        let wal = if req.read_only {
            None
        } else {
            Some(Mutex::new(WalWriter::open(&wal_path, opts.wal_sync_strategy, next_lsn)?))
        };

        let core = Self {
            path: path.to_path_buf(),
            options: opts.clone(),
            read_only: req.read_only,
            families: RwLock::new(families),
            next_column_family_id: Mutex::new(manifest.next_column_family_id),
            next_file_id: AtomicU64::new(manifest.next_file_id.max(max_file_id + 1)),
            wal,
            write_lock: Mutex::new(()),
            maintenance: Mutex::new(()),
            snapshots: Mutex::new(HashMap::new()),
            next_snapshot_id: AtomicU64::new(1),
            deletions: Mutex::new(FileDeletions::default()),
            shutting_down: AtomicBool::new(false),
            flush_scheduled: AtomicBool::new(false),
            jobs: OnceCell::new(),
            _lock_file: lock_file,
        };

        if !core.read_only {
            let _m = core.maintenance.lock();
            // Make replayed data durable in tables right away
            core.flush_locked()?;
            core.persist_manifest()?;
            core.remove_orphans(&manifest)?;
        }

        tracing::info!(
            path = %path.display(),
            read_only = core.read_only,
            column_families = ids.len(),
            "engine opened"
        );

        Ok((core, ids))
    }

    pub(crate) fn set_job_sender(&self, jobs: Sender<Job>) {
        let _ = self.jobs.set(jobs);
    }

    /// Delete table files and family directories the MANIFEST does not list
    fn remove_orphans(&self, manifest: &Manifest) -> StoreResult<()> {
        for cf in self.families_snapshot() {
            for orphan in cf.storage.orphans()? {
                tracing::info!(file = %orphan.display(), "removing orphaned table file");
                fs::remove_file(&orphan)?;
            }
        }

        let sstables = self.path.join(SSTABLE_DIR);
        for entry in fs::read_dir(&sstables)? {
            let dir = entry?.path();
            let known = manifest
                .column_families
                .iter()
                .any(|cf| ColumnFamily::dir(&self.path, cf.id) == dir);
            if dir.is_dir() && !known {
                tracing::info!(dir = %dir.display(), "removing dropped column family directory");
                fs::remove_dir_all(&dir)?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn family(&self, cf: ColumnFamilyId) -> StoreResult<Arc<ColumnFamily>> {
        self.families
            .read()
            .get(&cf)
            .cloned()
            .ok_or_else(|| StoreError::InvalidArgument(format!("Invalid column family: {}", cf)))
    }

    fn families_snapshot(&self) -> Vec<Arc<ColumnFamily>> {
        self.families.read().values().cloned().collect()
    }

    fn alloc_file_id(&self) -> u64 {
        self.next_file_id.fetch_add(1, Ordering::SeqCst)
    }

    fn check_writable(&self) -> StoreResult<()> {
        if self.read_only {
            return Err(StoreError::NotSupported(
                "Not supported operation in read only mode.".to_string(),
            ));
        }
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(StoreError::ShutdownInProgress("Database shutdown".to_string()));
        }
        Ok(())
    }

    /// View to read from: the snapshot's if one is set, else the live one
    fn read_view(&self, options: &ReadOptions, cf: ColumnFamilyId) -> StoreResult<CfView> {
        match options.snapshot {
            Some(SnapshotId(id)) => {
                let snapshots = self.snapshots.lock();
                let views = snapshots.get(&id).ok_or_else(|| {
                    StoreError::InvalidArgument(format!("snapshot {} is not held", id))
                })?;
                views.get(&cf).cloned().ok_or_else(|| {
                    StoreError::InvalidArgument(format!(
                        "column family {} did not exist when snapshot {} was taken",
                        cf, id
                    ))
                })
            }
            None => Ok(self.family(cf)?.view()),
        }
    }

    fn cache_for(&self, cf: ColumnFamilyId) -> Option<Cache> {
        self.families.read().get(&cf).and_then(|f| f.cache().cloned())
    }

    fn file_deletions_enabled(&self) -> bool {
        self.deletions.lock().disabled == 0
    }

    /// Write the MANIFEST from current state. Callers hold `maintenance`
    /// (or are still opening).
    fn persist_manifest(&self) -> StoreResult<()> {
        let column_families = self
            .families_snapshot()
            .iter()
            .map(|cf| ColumnFamilyRecord {
                id: cf.id(),
                name: cf.name().to_string(),
                files: cf.storage.file_ids(),
            })
            .collect();
        let manifest = Manifest {
            next_file_id: self.next_file_id.load(Ordering::SeqCst),
            next_column_family_id: *self.next_column_family_id.lock(),
            column_families,
        };
        manifest.store(&self.path)
    }

    /// Take tables out of service. They are deleted once nothing references
    /// them, or parked while file deletions are disabled.
    fn retire(&self, cache: Option<&Cache>, tables: Vec<Arc<SSTableReader>>) {
        let mut deletions = self.deletions.lock();
        for table in tables {
            if let Some(cache) = cache {
                cache.erase_file(table.file_id());
            }
            if deletions.disabled > 0 {
                tracing::debug!(file = %table.file_name(), "file deletion deferred");
                deletions.pending.push(table);
            } else {
                table.mark_obsolete();
            }
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub(crate) fn get(&self, options: &ReadOptions, cf: ColumnFamilyId, key: &[u8]) -> StoreResult<Option<Bytes>> {
        let view = self.read_view(options, cf)?;
        let cache = self.cache_for(cf);
        view.get(key, cache.as_ref(), options.fill_cache)
    }

    pub(crate) fn create_iterator(&self, options: &ReadOptions, cf: ColumnFamilyId) -> StoreResult<LsmIterator> {
        let view = self.read_view(options, cf)?;
        let bounds = KeyBounds::new(
            options.iterate_lower_bound.as_deref(),
            options.iterate_upper_bound.as_deref(),
        );
        Ok(LsmIterator::new(&view, bounds))
    }

    pub(crate) fn create_snapshot(&self) -> SnapshotId {
        // Under the write lock so a snapshot never sees half a batch
        let _w = self.write_lock.lock();
        let views = self
            .families_snapshot()
            .iter()
            .map(|cf| (cf.id(), cf.view()))
            .collect();
        let id = self.next_snapshot_id.fetch_add(1, Ordering::SeqCst);
        self.snapshots.lock().insert(id, views);
        SnapshotId(id)
    }

    pub(crate) fn release_snapshot(&self, snapshot: SnapshotId) {
        self.snapshots.lock().remove(&snapshot.0);
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Apply a batch atomically: one WAL entry, then every memtable.
    ///
    /// Merges are resolved here against the latest value (including earlier
    /// operations of the same batch) and logged as puts.
    pub(crate) fn write(&self, options: &WriteOptions, batch: &[BatchOp]) -> StoreResult<()> {
        self.check_writable()?;
        if batch.is_empty() {
            return Ok(());
        }

        let _w = self.write_lock.lock();

        let mut latest: HashMap<(ColumnFamilyId, &[u8]), Option<Bytes>> = HashMap::new();
        let mut operations = Vec::with_capacity(batch.len());
        let mut touched: Vec<Arc<ColumnFamily>> = Vec::new();

        for op in batch {
            let (cf_id, key) = match op {
                BatchOp::Put { cf, key, .. } | BatchOp::Delete { cf, key } | BatchOp::Merge { cf, key, .. } => {
                    (*cf, key.as_slice())
                }
            };
            let cf = self.family(cf_id)?;

            let resolved = match op {
                BatchOp::Put { value, .. } => Some(Bytes::from(value.clone())),
                BatchOp::Delete { .. } => None,
                BatchOp::Merge { value, .. } => {
                    let existing = match latest.get(&(cf_id, key)) {
                        Some(v) => v.clone(),
                        None => cf.view().get(key, cf.cache(), true)?,
                    };
                    Some(Bytes::from(self.merge_value(&cf, key, existing.as_deref(), value)?))
                }
            };

            operations.push(match &resolved {
                Some(v) => Operation::Put {
                    cf: cf_id,
                    key: key.to_vec(),
                    value: v.to_vec(),
                },
                None => Operation::Delete {
                    cf: cf_id,
                    key: key.to_vec(),
                },
            });
            latest.insert((cf_id, key), resolved);
            if !touched.iter().any(|t| t.id() == cf_id) {
                touched.push(cf);
            }
        }

        if !options.disable_wal {
            if let Some(wal) = &self.wal {
                let _timer = PerfTimer::start(PerfMetric::WriteWalTime);
                wal.lock().append(operations.clone(), options.sync)?;
            }
        }

        let mut needs_flush = false;
        {
            let _timer = PerfTimer::start(PerfMetric::WriteMemtableTime);
            for op in operations {
                let Some(cf) = touched.iter().find(|t| t.id() == op.column_family()) else {
                    continue;
                };
                let size = match op {
                    Operation::Put { key, value, .. } => cf.memtable.put(key, value),
                    Operation::Delete { key, .. } => cf.memtable.delete(key),
                };
                needs_flush |= size >= cf.options().write_buffer_size;
            }
        }

        if needs_flush {
            self.schedule_flush();
        }
        Ok(())
    }

    fn merge_value(
        &self,
        cf: &ColumnFamily,
        key: &[u8],
        existing: Option<&[u8]>,
        operand: &[u8],
    ) -> StoreResult<Vec<u8>> {
        let index = cf.options().merge_operator_index().ok_or_else(|| {
            StoreError::InvalidArgument("merge_operator is not properly initialized.".to_string())
        })?;
        match merge_operator_full_merge(index, key, existing, &[operand]) {
            MergeVerdict::Merged(value) => Ok(value),
            MergeVerdict::Failed => Err(StoreError::Corruption("Error: Could not perform merge.".to_string())),
        }
    }

    // =========================================================================
    // Flush
    // =========================================================================

    fn schedule_flush(&self) {
        if let Some(jobs) = self.jobs.get() {
            if !self.flush_scheduled.swap(true, Ordering::AcqRel) && jobs.send(Job::Flush).is_err() {
                self.flush_scheduled.store(false, Ordering::Release);
            }
        }
    }

    fn maybe_schedule_compaction(&self, cf: &ColumnFamily) {
        let trigger = cf.options().level0_file_num_compaction_trigger;
        if cf.options().disable_auto_compactions || trigger == 0 {
            return;
        }
        if cf.storage.files_at_level(0) >= trigger {
            if let Some(jobs) = self.jobs.get() {
                let _ = jobs.send(Job::Compact(cf.id()));
            }
        }
    }

    /// Flush now, or hand the flush to the background worker
    pub(crate) fn flush(&self, wait: bool) -> StoreResult<()> {
        self.check_writable()?;
        if wait {
            let _m = self.maintenance.lock();
            self.flush_locked()
        } else {
            self.schedule_flush();
            Ok(())
        }
    }

    pub(crate) fn background_flush(&self) -> StoreResult<()> {
        let _m = self.maintenance.lock();
        self.flush_locked()
    }

    /// Write every non-empty memtable to level 0 and truncate the WAL.
    /// Caller holds `maintenance`.
    fn flush_locked(&self) -> StoreResult<()> {
        // Cleared up front so a failed flush still lets the next write schedule one
        self.flush_scheduled.store(false, Ordering::Release);
        self.check_writable()?;
        let flushed = {
            let _w = self.write_lock.lock();
            let mut flushed = Vec::new();
            for cf in self.families_snapshot() {
                let view = cf.memtable.snapshot();
                if view.is_empty() {
                    continue;
                }
                let file_id = self.alloc_file_id();
                if let Some(table) = cf.storage.flush(&view, file_id)? {
                    // Table is installed before the memtable empties, so
                    // readers always find the data in one or the other
                    cf.memtable.clear();
                    tracing::info!(
                        cf = cf.name(),
                        file = file_id,
                        entries = table.entry_count,
                        bytes = table.file_size,
                        "memtable flushed"
                    );
                    flushed.push(cf);
                }
            }
            if !flushed.is_empty() {
                self.persist_manifest()?;
            }
            if let Some(wal) = &self.wal {
                wal.lock().truncate()?;
            }
            flushed
        };

        for cf in flushed {
            self.maybe_schedule_compaction(&cf);
        }
        Ok(())
    }

    // =========================================================================
    // Compaction
    // =========================================================================

    /// Flush, then compact every table overlapping `range`
    pub(crate) fn compact_range(&self, cf: ColumnFamilyId, range: KeyBounds<'_>) -> StoreResult<()> {
        self.check_writable()?;
        let _m = self.maintenance.lock();
        self.flush_locked()?;
        self.compact_locked(cf, CompactionSeed::Range(range))
    }

    pub(crate) fn background_compact(&self, cf: ColumnFamilyId) -> StoreResult<()> {
        let _m = self.maintenance.lock();
        let family = match self.family(cf) {
            Ok(family) => family,
            // Dropped since the job was queued
            Err(_) => return Ok(()),
        };
        let trigger = family.options().level0_file_num_compaction_trigger;
        if family.storage.files_at_level(0) < trigger {
            return Ok(());
        }
        self.compact_locked(cf, CompactionSeed::Level0)
    }

    /// Caller holds `maintenance`
    fn compact_locked(&self, cf: ColumnFamilyId, seed: CompactionSeed<'_>) -> StoreResult<()> {
        self.check_writable()?;
        let family = self.family(cf)?;
        let tables = family.storage.tables();
        let inputs = compaction::select_inputs(&tables, seed);
        if inputs.is_empty() {
            return Ok(());
        }

        let filter_index = family.options().compaction_filter_index();
        let filter_level = compaction::filter_level(&inputs);
        let output_level = compaction::output_level(&inputs);
        let output_id = self.alloc_file_id();

        tracing::debug!(
            cf = family.name(),
            inputs = inputs.len(),
            output_level,
            filter = %compaction_filter_name(filter_index),
            "compaction started"
        );

        let merged = compaction::merge_inputs(&inputs)?;
        let path = family.storage.table_path(output_id);
        let mut builder = SSTableBuilder::new(&path, output_level)?;
        let mut stats = CompactionStats {
            input_files: inputs.len(),
            ..Default::default()
        };

        if let Err(e) = compaction::write_output(
            &mut builder,
            &merged,
            filter_index,
            filter_level,
            &self.shutting_down,
            &mut stats,
        ) {
            builder.abandon()?;
            return Err(e);
        }

        let added = if builder.entry_count() == 0 {
            builder.abandon()?;
            Vec::new()
        } else {
            builder.finish()?;
            vec![Arc::new(SSTableReader::open(&path, output_id, false)?)]
        };

        let input_ids: Vec<u64> = inputs.iter().map(|t| t.file_id()).collect();
        drop(inputs);
        drop(tables);
        let removed = family.storage.replace(&input_ids, added);
        self.persist_manifest()?;
        self.retire(family.cache(), removed);

        tracing::info!(
            cf = family.name(),
            filter = %compaction_filter_name(filter_index),
            inputs = stats.input_files,
            output_level,
            written = stats.entries_written,
            tombstones_dropped = stats.tombstones_dropped,
            removed = stats.filter_removed,
            changed = stats.filter_changed,
            "compaction finished"
        );
        Ok(())
    }

    // =========================================================================
    // Column Families
    // =========================================================================

    pub(crate) fn create_column_family(&self, options: &Options, name: &str) -> StoreResult<ColumnFamilyId> {
        self.check_writable()?;
        let _m = self.maintenance.lock();

        if self.families.read().values().any(|cf| cf.name() == name) {
            tracing::debug!(cf = name, "column family already exists");
            return Err(StoreError::InvalidArgument(
                "Column family already exists".to_string(),
            ));
        }

        let id = {
            let mut next = self.next_column_family_id.lock();
            let id = *next;
            *next += 1;
            id
        };
        let storage = StorageManager::open(&ColumnFamily::dir(&self.path, id), Some(&[][..]), false)?;
        self.families.write().insert(
            id,
            Arc::new(ColumnFamily::new(id, name.to_string(), options.clone(), storage)),
        );
        self.persist_manifest()?;

        tracing::info!(cf = name, id, "column family created");
        Ok(id)
    }

    pub(crate) fn drop_column_family(&self, cf: ColumnFamilyId) -> StoreResult<()> {
        self.check_writable()?;
        if cf == DEFAULT_COLUMN_FAMILY_ID {
            return Err(StoreError::InvalidArgument(
                "Can't drop default column family".to_string(),
            ));
        }
        let _m = self.maintenance.lock();
        let family = {
            let _w = self.write_lock.lock();
            self.families
                .write()
                .remove(&cf)
                .ok_or_else(|| StoreError::InvalidArgument(format!("Invalid column family: {}", cf)))?
        };
        self.persist_manifest()?;
        family.memtable.clear();
        self.retire(family.cache(), family.storage.clear());

        tracing::info!(cf = family.name(), id = cf, "column family dropped");
        Ok(())
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    pub(crate) fn property_value(&self, cf: ColumnFamilyId, name: &str) -> StoreResult<Option<String>> {
        let family = self.family(cf)?;
        Ok(properties::property_value(&family, self.file_deletions_enabled(), name))
    }

    pub(crate) fn approximate_sizes(&self, cf: ColumnFamilyId, ranges: &[KeyBounds<'_>]) -> StoreResult<Vec<u64>> {
        let tables = self.family(cf)?.storage.tables();
        Ok(ranges
            .iter()
            .map(|bounds| {
                tables
                    .iter()
                    .filter(|t| bounds.overlaps(t.smallest_key(), t.largest_key()))
                    .map(|t| t.bytes_in_range(*bounds))
                    .sum()
            })
            .collect())
    }

    pub(crate) fn approximate_memtable_sizes(
        &self,
        cf: ColumnFamilyId,
        ranges: &[KeyBounds<'_>],
    ) -> StoreResult<Vec<u64>> {
        let family = self.family(cf)?;
        Ok(ranges
            .iter()
            .map(|bounds| family.memtable.approximate_stats_in(*bounds).0)
            .collect())
    }

    pub(crate) fn approximate_key_num(&self, cf: ColumnFamilyId, ranges: &[KeyBounds<'_>]) -> StoreResult<u64> {
        let family = self.family(cf)?;
        let tables = family.storage.tables();
        Ok(ranges
            .iter()
            .map(|bounds| {
                let in_tables: u64 = tables.iter().map(|t| t.keys_in_range(*bounds)).sum();
                family.memtable.approximate_stats_in(*bounds).1 + in_tables
            })
            .sum())
    }

    pub(crate) fn live_files(&self) -> Vec<LiveFileMetadata> {
        let mut files = Vec::new();
        for cf in self.families_snapshot() {
            for table in cf.storage.tables().iter() {
                files.push(LiveFileMetadata {
                    name: table.file_name(),
                    column_family_name: cf.name().to_string(),
                    level: table.level(),
                    size: table.file_size(),
                    smallest_key: table.smallest_key().to_vec(),
                    largest_key: table.largest_key().to_vec(),
                });
            }
        }
        files
    }

    // =========================================================================
    // File Deletion
    // =========================================================================

    pub(crate) fn disable_file_deletions(&self) {
        let mut deletions = self.deletions.lock();
        deletions.disabled += 1;
        tracing::debug!(disabled = deletions.disabled, "file deletions disabled");
    }

    pub(crate) fn enable_file_deletions(&self, force: bool) {
        let purged = {
            let mut deletions = self.deletions.lock();
            deletions.disabled = if force {
                0
            } else {
                deletions.disabled.saturating_sub(1)
            };
            if deletions.disabled > 0 {
                return;
            }
            std::mem::take(&mut deletions.pending)
        };
        tracing::debug!(purged = purged.len(), "file deletions enabled");
        for table in purged {
            table.mark_obsolete();
        }
    }

    /// Remove one table file from the live set by name
    pub(crate) fn delete_file(&self, name: &str) -> StoreResult<()> {
        self.check_writable()?;
        let _m = self.maintenance.lock();
        let name = name.trim_start_matches('/');

        for cf in self.families_snapshot() {
            let found = cf.storage.tables().iter().find(|t| t.file_name() == name).map(|t| t.file_id());
            if let Some(id) = found {
                let removed = cf.storage.replace(&[id], Vec::new());
                self.persist_manifest()?;
                self.retire(cf.cache(), removed);
                tracing::info!(cf = cf.name(), file = name, "file deleted");
                return Ok(());
            }
        }
        Err(StoreError::InvalidArgument(format!("File not found: {}", name)))
    }

    /// Remove every table whose keys all lie inside `range` (limit inclusive)
    pub(crate) fn delete_files_in_range(&self, cf: ColumnFamilyId, range: KeyBounds<'_>) -> StoreResult<()> {
        self.check_writable()?;
        let _m = self.maintenance.lock();
        let family = self.family(cf)?;
        let doomed: Vec<u64> = family
            .storage
            .tables()
            .iter()
            .filter(|t| range.covers_inclusive(t.smallest_key(), t.largest_key()))
            .map(|t| t.file_id())
            .collect();
        if doomed.is_empty() {
            return Ok(());
        }
        let removed = family.storage.replace(&doomed, Vec::new());
        self.persist_manifest()?;
        self.retire(family.cache(), removed);
        tracing::info!(cf = family.name(), files = doomed.len(), "files in range deleted");
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub(crate) fn begin_shutdown(&self) {
        if !self.shutting_down.swap(true, Ordering::AcqRel) {
            tracing::info!(path = %self.path.display(), "engine shutting down");
        }
    }

    pub(crate) fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Sync the WAL before the core is dropped
    pub(crate) fn sync_wal(&self) -> StoreResult<()> {
        match &self.wal {
            Some(wal) => wal.lock().sync(),
            None => Ok(()),
        }
    }
}

/// Check the requested families against the MANIFEST, creating the missing
/// ones when allowed
fn match_column_families(
    manifest: &mut Manifest,
    requested: &[(String, Options)],
    options: &Options,
    read_only: bool,
) -> StoreResult<()> {
    if !requested.iter().any(|(name, _)| name == DEFAULT_COLUMN_FAMILY_NAME) {
        return Err(StoreError::InvalidArgument(
            "Default column family not specified".to_string(),
        ));
    }

    if !read_only {
        let not_opened: Vec<&str> = manifest
            .column_families
            .iter()
            .map(|cf| cf.name.as_str())
            .filter(|name| !requested.iter().any(|(n, _)| n == name))
            .collect();
        if !not_opened.is_empty() {
            return Err(StoreError::InvalidArgument(format!(
                "Column families not opened: {}",
                not_opened.join(", ")
            )));
        }
    }

    for (name, _) in requested {
        if manifest.find(name).is_some() {
            continue;
        }
        if read_only || !options.create_missing_column_families {
            return Err(StoreError::InvalidArgument(format!(
                "Column family not found: {}",
                name
            )));
        }
        let id = manifest.next_column_family_id;
        manifest.next_column_family_id += 1;
        manifest.column_families.push(ColumnFamilyRecord {
            id,
            name: name.clone(),
            files: Vec::new(),
        });
        tracing::info!(cf = %name, id, "creating missing column family");
    }
    Ok(())
}

/// Take the exclusive LOCK file of a database directory
pub(crate) fn lock_db_dir(path: &Path) -> StoreResult<File> {
    let lock_path = path.join(LOCK_FILENAME);
    let file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(&lock_path)?;
    file.try_lock_exclusive().map_err(|e| {
        StoreError::Io(std::io::Error::new(
            e.kind(),
            format!("lock {}: {}", lock_path.display(), e),
        ))
    })?;
    Ok(file)
}

impl Drop for EngineCore {
    fn drop(&mut self) {
        // Files parked while deletions were disabled stay on disk; the next
        // open removes them as orphans
        let parked = self.deletions.get_mut().pending.len();
        if parked > 0 {
            tracing::debug!(parked, "leaving deferred files for the next open");
        }
        if let Some(wal) = &self.wal {
            if let Err(e) = wal.lock().sync() {
                tracing::warn!(error = %e, "failed to sync wal on close");
            }
        }
    }
}
