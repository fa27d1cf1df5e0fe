//! Database Handle
//!
//! [`Db`] is the host-side handle to one open engine instance. Every
//! operation runs inside the handle's [`GuardedResource`]:
//!
//! ```text
//!   get / put / iterate / flush / ...        close
//!          │ shared                            │ exclusive
//!          ▼                                   ▼
//!   ┌──────────────────────────────────────────────────┐
//!   │ GuardedResource<Box<dyn NativeEngine>>           │
//!   │   open flag  +  engine                           │
//!   └──────────────────────────────────────────────────┘
//!          │                                   │
//!          ▼                                   ▼
//!   native call, message → Error::Engine    flag cleared, engine released
//! ```
//!
//! After `close` every operation returns [`Error::Closed`]; in-flight
//! operations finish first because `close` waits for the exclusive lock.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::column_family::ColumnFamilyHandle;
use crate::config::{FlushOptions, Options, ReadOptions, WriteOptions};
use crate::engine::{self, RepairReport};
use crate::error::{invariant_violation, Error, Result};
use crate::guard::GuardedResource;
use crate::iterator::DbIterator;
use crate::metadata::LiveFileMetadata;
use crate::native::{ColumnFamilyId, NativeEngine, NativeResult, DEFAULT_COLUMN_FAMILY_ID};
use crate::range::{to_bounds, Range};
use crate::snapshot::Snapshot;
use crate::write_batch::WriteBatch;

/// Handle to an open database
pub struct Db {
    name: String,
    engine: Arc<GuardedResource<Box<dyn NativeEngine>>>,
}

impl Db {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open the database at `path` with the default column family only
    pub fn open(options: &Options, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let engine = engine::open(options, path).map_err(Error::Engine)?;
        Ok(Self::from_native(path.display().to_string(), Box::new(engine)))
    }

    /// Open read-only. With `error_if_log_file_exist`, refuse to open when
    /// the write-ahead log still holds unflushed writes.
    pub fn open_for_read_only(options: &Options, path: impl AsRef<Path>, error_if_log_file_exist: bool) -> Result<Self> {
        let path = path.as_ref();
        let engine = engine::open_for_read_only(options, path, error_if_log_file_exist).map_err(Error::Engine)?;
        Ok(Self::from_native(path.display().to_string(), Box::new(engine)))
    }

    /// Open with the named column families, one options value per name.
    ///
    /// # Panics
    /// If `names` and `cf_options` differ in length.
    pub fn open_column_families(
        options: &Options,
        path: impl AsRef<Path>,
        names: &[&str],
        cf_options: &[Options],
    ) -> Result<(Self, Vec<ColumnFamilyHandle>)> {
        let path = path.as_ref();
        let families = pair_families(names, cf_options);
        let (engine, ids) = engine::open_column_families(options, path, &families).map_err(Error::Engine)?;
        Ok((
            Self::from_native(path.display().to_string(), Box::new(engine)),
            handles(names, ids),
        ))
    }

    /// Read-only variant of [`open_column_families`](Self::open_column_families)
    ///
    /// # Panics
    /// If `names` and `cf_options` differ in length.
    pub fn open_for_read_only_column_families(
        options: &Options,
        path: impl AsRef<Path>,
        names: &[&str],
        cf_options: &[Options],
        error_if_log_file_exist: bool,
    ) -> Result<(Self, Vec<ColumnFamilyHandle>)> {
        let path = path.as_ref();
        let families = pair_families(names, cf_options);
        let (engine, ids) =
            engine::open_for_read_only_column_families(options, path, &families, error_if_log_file_exist)
                .map_err(Error::Engine)?;
        Ok((
            Self::from_native(path.display().to_string(), Box::new(engine)),
            handles(names, ids),
        ))
    }

    /// Column family names recorded for the database at `path`
    pub fn list_column_families(path: impl AsRef<Path>) -> Result<Vec<String>> {
        engine::list_column_families(path.as_ref()).map_err(Error::Engine)
    }

    /// Bind an already-open engine instance
    pub fn from_native(name: impl Into<String>, engine: Box<dyn NativeEngine>) -> Self {
        let name = name.into();
        tracing::info!(db = %name, "database opened");
        Self {
            name,
            engine: Arc::new(GuardedResource::new(engine)),
        }
    }

    /// Name given at open time (the path for the bundled engine)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Advisory only: the handle may close right after this returns true
    pub fn is_open(&self) -> bool {
        self.engine.is_open()
    }

    /// Ask the engine to stop background work and reject new writes.
    /// The handle stays open and must still be closed.
    pub fn shutdown(&self) -> Result<()> {
        tracing::info!(db = %self.name, "database shutdown requested");
        self.call(|engine| engine.shutdown())
    }

    /// Close the handle and release the engine. Waits for in-flight
    /// operations. Closing again is a no-op.
    pub fn close(&self) -> Result<()> {
        self.engine.with_exclusive(|access| match access.release() {
            Some(engine) => {
                let result = engine.close().map_err(Error::Engine);
                tracing::info!(db = %self.name, ok = result.is_ok(), "database closed");
                result
            }
            None => {
                tracing::debug!(db = %self.name, "close on an already closed database");
                Ok(())
            }
        })
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Run one native call under shared access and type its error
    fn call<R>(&self, op: impl FnOnce(&dyn NativeEngine) -> NativeResult<R>) -> Result<R> {
        self.engine
            .with_shared(|engine| op(engine.as_ref()))?
            .map_err(Error::Engine)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Value of `key` in the default column family; `None` if absent
    pub fn get(&self, options: &ReadOptions, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.get_in(options, DEFAULT_COLUMN_FAMILY_ID, key)
    }

    pub fn get_cf(&self, options: &ReadOptions, cf: &ColumnFamilyHandle, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.get_in(options, cf.id(), key)
    }

    fn get_in(&self, options: &ReadOptions, cf: ColumnFamilyId, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.call(|engine| engine.get(options, cf, key))
            .map(|value| value.map(|v| v.to_vec()))
    }

    /// Look up several keys of the default column family under one shared
    /// acquisition. One result per key, in order; all `Closed` if the
    /// handle is closed.
    pub fn multi_get(&self, options: &ReadOptions, keys: &[&[u8]]) -> Vec<Result<Option<Vec<u8>>>> {
        let keys: Vec<(ColumnFamilyId, &[u8])> = keys.iter().map(|k| (DEFAULT_COLUMN_FAMILY_ID, *k)).collect();
        self.multi_get_in(options, &keys)
    }

    pub fn multi_get_cf(
        &self,
        options: &ReadOptions,
        keys: &[(&ColumnFamilyHandle, &[u8])],
    ) -> Vec<Result<Option<Vec<u8>>>> {
        let keys: Vec<(ColumnFamilyId, &[u8])> = keys.iter().map(|(cf, k)| (cf.id(), *k)).collect();
        self.multi_get_in(options, &keys)
    }

    fn multi_get_in(&self, options: &ReadOptions, keys: &[(ColumnFamilyId, &[u8])]) -> Vec<Result<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Vec::new();
        }
        match self.engine.with_shared(|engine| engine.multi_get(options, keys)) {
            Ok(results) if results.len() != keys.len() => {
                let mismatch = Error::Engine(length_mismatch("multi_get", keys.len(), results.len()));
                keys.iter().map(|_| Err(mismatch.clone())).collect()
            }
            Ok(results) => results
                .into_iter()
                .map(|r| r.map(|v| v.map(|b| b.to_vec())).map_err(Error::Engine))
                .collect(),
            Err(closed) => keys.iter().map(|_| Err(closed.clone())).collect(),
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    pub fn put(&self, options: &WriteOptions, key: &[u8], value: &[u8]) -> Result<()> {
        self.call(|engine| engine.put(options, DEFAULT_COLUMN_FAMILY_ID, key, value))
    }

    pub fn put_cf(&self, options: &WriteOptions, cf: &ColumnFamilyHandle, key: &[u8], value: &[u8]) -> Result<()> {
        self.call(|engine| engine.put(options, cf.id(), key, value))
    }

    pub fn delete(&self, options: &WriteOptions, key: &[u8]) -> Result<()> {
        self.call(|engine| engine.delete(options, DEFAULT_COLUMN_FAMILY_ID, key))
    }

    pub fn delete_cf(&self, options: &WriteOptions, cf: &ColumnFamilyHandle, key: &[u8]) -> Result<()> {
        self.call(|engine| engine.delete(options, cf.id(), key))
    }

    /// Merge `value` into `key` with the column family's merge operator
    pub fn merge(&self, options: &WriteOptions, key: &[u8], value: &[u8]) -> Result<()> {
        self.call(|engine| engine.merge(options, DEFAULT_COLUMN_FAMILY_ID, key, value))
    }

    pub fn merge_cf(&self, options: &WriteOptions, cf: &ColumnFamilyHandle, key: &[u8], value: &[u8]) -> Result<()> {
        self.call(|engine| engine.merge(options, cf.id(), key, value))
    }

    /// Apply a batch atomically
    pub fn write(&self, options: &WriteOptions, batch: &WriteBatch) -> Result<()> {
        self.call(|engine| engine.write(options, batch))
    }

    // =========================================================================
    // Iteration / Snapshots
    // =========================================================================

    /// Iterator over the default column family. Positioned nowhere: call a
    /// seek first.
    pub fn iterator(&self, options: &ReadOptions) -> Result<DbIterator> {
        self.iterator_in(options, DEFAULT_COLUMN_FAMILY_ID)
    }

    pub fn iterator_cf(&self, options: &ReadOptions, cf: &ColumnFamilyHandle) -> Result<DbIterator> {
        self.iterator_in(options, cf.id())
    }

    fn iterator_in(&self, options: &ReadOptions, cf: ColumnFamilyId) -> Result<DbIterator> {
        self.call(|engine| engine.create_iterator(options, cf))
            .map(DbIterator::new)
    }

    /// Pin the current state. Released when the snapshot is dropped.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let id = self.call(|engine| engine.create_snapshot())?;
        Ok(Snapshot::new(id, Arc::clone(&self.engine)))
    }

    // =========================================================================
    // Column Families
    // =========================================================================

    pub fn create_column_family(&self, options: &Options, name: &str) -> Result<ColumnFamilyHandle> {
        let id = self.call(|engine| engine.create_column_family(options, name))?;
        Ok(ColumnFamilyHandle::new(id, name))
    }

    pub fn drop_column_family(&self, cf: &ColumnFamilyHandle) -> Result<()> {
        self.call(|engine| engine.drop_column_family(cf.id()))
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Write in-memory data to table files
    pub fn flush(&self, options: &FlushOptions) -> Result<()> {
        self.call(|engine| engine.flush(options))
    }

    /// Compact the default column family over `range`. Empty bounds are
    /// unbounded, so `Range::full()` compacts everything.
    pub fn compact_range(&self, range: &Range) -> Result<()> {
        self.call(|engine| engine.compact_range(DEFAULT_COLUMN_FAMILY_ID, range.bounds()))
    }

    pub fn compact_range_cf(&self, cf: &ColumnFamilyHandle, range: &Range) -> Result<()> {
        self.call(|engine| engine.compact_range(cf.id(), range.bounds()))
    }

    /// Remove one table file (by the name [`live_files_metadata`](Self::live_files_metadata) reports)
    pub fn delete_file(&self, name: &str) -> Result<()> {
        self.call(|engine| engine.delete_file(name))
    }

    /// Remove every table file of `cf` whose keys all lie in `range`.
    /// Both bounds are inclusive here.
    pub fn delete_files_in_range(&self, cf: &ColumnFamilyHandle, range: &Range) -> Result<()> {
        self.call(|engine| engine.delete_files_in_range(cf.id(), range.bounds()))
    }

    pub fn disable_file_deletions(&self) -> Result<()> {
        self.call(|engine| engine.disable_file_deletions())
    }

    /// Undo one `disable_file_deletions`, or all of them with `force`
    pub fn enable_file_deletions(&self, force: bool) -> Result<()> {
        self.call(|engine| engine.enable_file_deletions(force))
    }

    // =========================================================================
    // Introspection
    // =========================================================================

    /// Approximate bytes per range in the default column family.
    /// `include_mem` adds what is still in memory.
    pub fn approximate_sizes(&self, ranges: &[Range], include_mem: bool) -> Result<Vec<u64>> {
        self.approximate_sizes_in(DEFAULT_COLUMN_FAMILY_ID, ranges, include_mem)
    }

    pub fn approximate_sizes_cf(&self, cf: &ColumnFamilyHandle, ranges: &[Range], include_mem: bool) -> Result<Vec<u64>> {
        self.approximate_sizes_in(cf.id(), ranges, include_mem)
    }

    fn approximate_sizes_in(&self, cf: ColumnFamilyId, ranges: &[Range], include_mem: bool) -> Result<Vec<u64>> {
        if ranges.is_empty() {
            return Ok(Vec::new());
        }
        let bounds = to_bounds(ranges);
        self.call(|engine| {
            let mut sizes = engine.approximate_sizes(cf, &bounds)?;
            if sizes.len() != bounds.len() {
                return Err(length_mismatch("approximate_sizes", bounds.len(), sizes.len()));
            }
            if include_mem {
                let in_memory = engine.approximate_memtable_sizes(cf, &bounds)?;
                if in_memory.len() != bounds.len() {
                    return Err(length_mismatch("approximate_memtable_sizes", bounds.len(), in_memory.len()));
                }
                for (size, mem) in sizes.iter_mut().zip(in_memory) {
                    *size += mem;
                }
            }
            Ok(sizes)
        })
    }

    /// Approximate number of keys across `ranges` in `cf`
    pub fn approximate_key_num(&self, cf: &ColumnFamilyHandle, ranges: &[Range]) -> Result<u64> {
        if ranges.is_empty() {
            return Ok(0);
        }
        let bounds = to_bounds(ranges);
        self.call(|engine| engine.approximate_key_num(cf.id(), &bounds))
    }

    /// Metadata of every live table file, across column families
    pub fn live_files_metadata(&self) -> Result<Vec<LiveFileMetadata>> {
        self.call(|engine| engine.live_files())
    }

    /// Named property of the default column family; `None` if unknown
    pub fn property(&self, name: &str) -> Result<Option<String>> {
        self.call(|engine| engine.property_value(DEFAULT_COLUMN_FAMILY_ID, name))
    }

    pub fn property_cf(&self, cf: &ColumnFamilyHandle, name: &str) -> Result<Option<String>> {
        self.call(|engine| engine.property_value(cf.id(), name))
    }

    /// Handle for the default column family
    pub fn default_column_family(&self) -> ColumnFamilyHandle {
        ColumnFamilyHandle::default_family()
    }
}

impl fmt::Debug for Db {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Db")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Drop for Db {
    fn drop(&mut self) {
        if !self.engine.is_open() {
            return;
        }
        if let Err(e) = self.close() {
            tracing::warn!(db = %self.name, error = %e, "close on drop failed");
        }
    }
}

/// Delete the database at `path`. It must not be open for writing.
pub fn destroy_db(path: impl AsRef<Path>) -> Result<()> {
    engine::destroy(path.as_ref()).map_err(Error::Engine)
}

/// Rebuild the database catalogue at `path` from the files on disk
pub fn repair_db(path: impl AsRef<Path>) -> Result<RepairReport> {
    engine::repair(path.as_ref()).map_err(Error::Engine)
}

fn pair_families(names: &[&str], cf_options: &[Options]) -> Vec<(String, Options)> {
    if names.len() != cf_options.len() {
        invariant_violation(format!(
            "must provide the same number of column family names and options ({} names, {} options)",
            names.len(),
            cf_options.len()
        ));
    }
    names
        .iter()
        .zip(cf_options)
        .map(|(name, options)| (name.to_string(), options.clone()))
        .collect()
}

fn handles(names: &[&str], ids: Vec<ColumnFamilyId>) -> Vec<ColumnFamilyHandle> {
    names
        .iter()
        .zip(ids)
        .map(|(name, id)| ColumnFamilyHandle::new(id, *name))
        .collect()
}

fn length_mismatch(call: &str, expected: usize, got: usize) -> String {
    format!("engine returned {} results from {} for {} inputs", got, call, expected)
}
