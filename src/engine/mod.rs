//! Bundled Engine
//!
//! A small LSM engine that implements [`NativeEngine`]. It is what
//! [`Db::open`](crate::Db::open) binds to.
//!
//! ## On-Disk Layout
//! ```text
//! <db>/
//! ├── LOCK                      exclusive while open for writing
//! ├── MANIFEST                  column families + live table ids
//! ├── wal.log                   one record per write or batch
//! ├── lost/                     tables quarantined by repair
//! └── sstables/
//!     └── cf_<id>/
//!         └── sstable_<file-id>.sst
//! ```
//!
//! ## Write Path
//! ```text
//!   write ──▶ WAL append ──▶ memtable ──(full)──▶ background flush ──▶ L0 table
//!                                                                      │
//!                                     compaction filter ◀── compaction ◀┘
//! ```

mod background;
mod column_family;
mod compaction;
mod core;
pub mod manifest;
mod properties;
mod repair;
mod view;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;

use crate::config::{FlushOptions, Options, ReadOptions, WriteOptions};
use crate::error::StoreResult;
use crate::metadata::LiveFileMetadata;
use crate::native::{ColumnFamilyId, NativeEngine, NativeIterator, NativeResult, DEFAULT_COLUMN_FAMILY_NAME};
use crate::range::KeyBounds;
use crate::snapshot::SnapshotId;
use crate::write_batch::{BatchOp, WriteBatch};

use self::background::BackgroundWorker;
use self::core::{lock_db_dir, EngineCore, OpenRequest, LOCK_FILENAME, SSTABLE_DIR, WAL_FILENAME};
use self::manifest::{Manifest, MANIFEST_FILENAME};

pub use self::repair::RepairReport;
pub use self::view::LsmIterator;

/// Render an engine error as the message that crosses the native boundary
fn native<T>(result: StoreResult<T>) -> NativeResult<T> {
    result.map_err(|e| e.to_string())
}

/// An open instance of the bundled engine
pub struct LsmEngine {
    core: Arc<EngineCore>,
    /// `None` for read-only instances and after shutdown
    worker: Mutex<Option<BackgroundWorker>>,
}

impl LsmEngine {
    fn start(core: EngineCore) -> StoreResult<Self> {
        let core = Arc::new(core);
        let worker = if core.is_read_only() {
            None
        } else {
            let worker = BackgroundWorker::spawn(&core)?;
            core.set_job_sender(worker.sender());
            Some(worker)
        };
        Ok(Self {
            core,
            worker: Mutex::new(worker),
        })
    }

    fn stop_worker(&self) {
        if let Some(mut worker) = self.worker.lock().take() {
            worker.stop();
        }
    }
}

// =============================================================================
// Lifecycle Entry Points
// =============================================================================

/// Open the database at `path` with only the default column family
pub fn open(options: &Options, path: &Path) -> NativeResult<LsmEngine> {
    let families = [(DEFAULT_COLUMN_FAMILY_NAME.to_string(), options.clone())];
    open_column_families(options, path, &families).map(|(engine, _)| engine)
}

/// Open read-only. Nothing on disk is modified.
pub fn open_for_read_only(options: &Options, path: &Path, error_if_log_file_exist: bool) -> NativeResult<LsmEngine> {
    let families = [(DEFAULT_COLUMN_FAMILY_NAME.to_string(), options.clone())];
    open_for_read_only_column_families(options, path, &families, error_if_log_file_exist).map(|(engine, _)| engine)
}

/// Open with the named column families. Every family in the database must be
/// named, and `default` must be among them. Returns one id per name, in order.
pub fn open_column_families(
    options: &Options,
    path: &Path,
    column_families: &[(String, Options)],
) -> NativeResult<(LsmEngine, Vec<ColumnFamilyId>)> {
    open_with(OpenRequest {
        path,
        options,
        column_families,
        read_only: false,
        error_if_log_file_exist: false,
    })
}

/// Read-only open of a subset of the column families (`default` included)
pub fn open_for_read_only_column_families(
    options: &Options,
    path: &Path,
    column_families: &[(String, Options)],
    error_if_log_file_exist: bool,
) -> NativeResult<(LsmEngine, Vec<ColumnFamilyId>)> {
    open_with(OpenRequest {
        path,
        options,
        column_families,
        read_only: true,
        error_if_log_file_exist,
    })
}

fn open_with(request: OpenRequest<'_>) -> NativeResult<(LsmEngine, Vec<ColumnFamilyId>)> {
    let (core, ids) = native(EngineCore::open(request))?;
    let engine = native(LsmEngine::start(core))?;
    Ok((engine, ids))
}

/// Names of the column families recorded for the database at `path`
pub fn list_column_families(path: &Path) -> NativeResult<Vec<String>> {
    if !Manifest::exists(path) {
        return Err(format!(
            "Invalid argument: {}: does not exist (create_if_missing is false)",
            path.display()
        ));
    }
    native(Manifest::load(path)).map(|m| m.names())
}

/// Delete every file the engine owns under `path`. The database must not be
/// open for writing. A missing directory is not an error.
pub fn destroy(path: &Path) -> NativeResult<()> {
    native(destroy_files(path))
}

fn destroy_files(path: &Path) -> StoreResult<()> {
    if !path.exists() {
        return Ok(());
    }
    let lock = lock_db_dir(path)?;

    for dir in [SSTABLE_DIR, "lost"] {
        let dir = path.join(dir);
        if dir.is_dir() {
            fs::remove_dir_all(&dir)?;
        }
    }
    for file in [MANIFEST_FILENAME, "MANIFEST.tmp", WAL_FILENAME] {
        let file = path.join(file);
        if file.is_file() {
            fs::remove_file(&file)?;
        }
    }
    drop(lock);
    fs::remove_file(path.join(LOCK_FILENAME))?;

    // Leave the directory if it holds anything we did not create
    if fs::remove_dir(path).is_err() {
        tracing::debug!(path = %path.display(), "database directory not empty after destroy");
    }
    tracing::info!(path = %path.display(), "database destroyed");
    Ok(())
}

/// Rebuild the MANIFEST from the table files on disk
pub fn repair(path: &Path) -> NativeResult<RepairReport> {
    native(repair::repair(path))
}

// =============================================================================
// NativeEngine
// =============================================================================

impl NativeEngine for LsmEngine {
    fn get(&self, options: &ReadOptions, cf: ColumnFamilyId, key: &[u8]) -> NativeResult<Option<Bytes>> {
        native(self.core.get(options, cf, key))
    }

    fn put(&self, options: &WriteOptions, cf: ColumnFamilyId, key: &[u8], value: &[u8]) -> NativeResult<()> {
        let op = BatchOp::Put {
            cf,
            key: key.to_vec(),
            value: value.to_vec(),
        };
        native(self.core.write(options, std::slice::from_ref(&op)))
    }

    fn delete(&self, options: &WriteOptions, cf: ColumnFamilyId, key: &[u8]) -> NativeResult<()> {
        let op = BatchOp::Delete { cf, key: key.to_vec() };
        native(self.core.write(options, std::slice::from_ref(&op)))
    }

    fn merge(&self, options: &WriteOptions, cf: ColumnFamilyId, key: &[u8], value: &[u8]) -> NativeResult<()> {
        let op = BatchOp::Merge {
            cf,
            key: key.to_vec(),
            value: value.to_vec(),
        };
        native(self.core.write(options, std::slice::from_ref(&op)))
    }

    fn write(&self, options: &WriteOptions, batch: &WriteBatch) -> NativeResult<()> {
        native(self.core.write(options, batch.ops()))
    }

    fn create_iterator(&self, options: &ReadOptions, cf: ColumnFamilyId) -> NativeResult<Box<dyn NativeIterator>> {
        let iter = native(self.core.create_iterator(options, cf))?;
        Ok(Box::new(iter))
    }

    fn create_snapshot(&self) -> NativeResult<SnapshotId> {
        Ok(self.core.create_snapshot())
    }

    fn release_snapshot(&self, snapshot: SnapshotId) {
        self.core.release_snapshot(snapshot);
    }

    fn create_column_family(&self, options: &Options, name: &str) -> NativeResult<ColumnFamilyId> {
        native(self.core.create_column_family(options, name))
    }

    fn drop_column_family(&self, cf: ColumnFamilyId) -> NativeResult<()> {
        native(self.core.drop_column_family(cf))
    }

    fn property_value(&self, cf: ColumnFamilyId, name: &str) -> NativeResult<Option<String>> {
        native(self.core.property_value(cf, name))
    }

    fn approximate_sizes(&self, cf: ColumnFamilyId, ranges: &[KeyBounds<'_>]) -> NativeResult<Vec<u64>> {
        native(self.core.approximate_sizes(cf, ranges))
    }

    fn approximate_memtable_sizes(&self, cf: ColumnFamilyId, ranges: &[KeyBounds<'_>]) -> NativeResult<Vec<u64>> {
        native(self.core.approximate_memtable_sizes(cf, ranges))
    }

    fn approximate_key_num(&self, cf: ColumnFamilyId, ranges: &[KeyBounds<'_>]) -> NativeResult<u64> {
        native(self.core.approximate_key_num(cf, ranges))
    }

    fn live_files(&self) -> NativeResult<Vec<LiveFileMetadata>> {
        Ok(self.core.live_files())
    }

    fn compact_range(&self, cf: ColumnFamilyId, range: KeyBounds<'_>) -> NativeResult<()> {
        native(self.core.compact_range(cf, range))
    }

    fn flush(&self, options: &FlushOptions) -> NativeResult<()> {
        native(self.core.flush(options.wait))
    }

    fn disable_file_deletions(&self) -> NativeResult<()> {
        self.core.disable_file_deletions();
        Ok(())
    }

    fn enable_file_deletions(&self, force: bool) -> NativeResult<()> {
        self.core.enable_file_deletions(force);
        Ok(())
    }

    fn delete_file(&self, name: &str) -> NativeResult<()> {
        native(self.core.delete_file(name))
    }

    fn delete_files_in_range(&self, cf: ColumnFamilyId, range: KeyBounds<'_>) -> NativeResult<()> {
        native(self.core.delete_files_in_range(cf, range))
    }

    fn shutdown(&self) -> NativeResult<()> {
        self.core.begin_shutdown();
        self.stop_worker();
        Ok(())
    }

    fn close(self: Box<Self>) -> NativeResult<()> {
        self.stop_worker();
        native(self.core.sync_wal())
    }
}
