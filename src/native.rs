//! Native Boundary
//!
//! The narrow entry-point surface between the binding and a storage engine.
//! Everything that crosses it is either plain data or an opaque id:
//!
//! - column families are [`ColumnFamilyId`]s, snapshots are [`SnapshotId`]s
//! - keys and values are byte slices in, owned buffers out
//! - every failure is a human-readable message ([`NativeResult`])
//!
//! [`Db`](crate::Db) wraps an engine behind this trait and never looks past
//! it. The bundled [`LsmEngine`](crate::engine::LsmEngine) implements it; so
//! can any other engine, via [`Db::from_native`](crate::Db::from_native).

use bytes::Bytes;

use crate::config::{FlushOptions, Options, ReadOptions, WriteOptions};
use crate::metadata::LiveFileMetadata;
use crate::range::KeyBounds;
use crate::snapshot::SnapshotId;
use crate::write_batch::WriteBatch;

/// Result of a call across the boundary. The error is the engine's message.
pub type NativeResult<T> = std::result::Result<T, String>;

/// Opaque column family handle
pub type ColumnFamilyId = u32;

/// Id of the column family every database has
pub const DEFAULT_COLUMN_FAMILY_ID: ColumnFamilyId = 0;

/// Name of the column family every database has
pub const DEFAULT_COLUMN_FAMILY_NAME: &str = "default";

/// Message for an entry point an engine does not provide
pub fn not_supported(operation: &str) -> String {
    format!("Not supported: {}", operation)
}

/// Cursor over one column family
pub trait NativeIterator: Send {
    fn seek_to_first(&mut self);
    fn seek_to_last(&mut self);
    /// Position at the first key `>= key`
    fn seek(&mut self, key: &[u8]);
    /// Position at the last key `<= key`
    fn seek_for_prev(&mut self, key: &[u8]);
    fn next(&mut self);
    fn prev(&mut self);
    fn valid(&self) -> bool;
    fn key(&self) -> Option<&[u8]>;
    fn value(&self) -> Option<&[u8]>;
    /// Error hit while positioning, if any
    fn status(&self) -> NativeResult<()>;
}

/// Entry points of a storage engine instance.
///
/// Only the point operations, batch write and `close` are required; every
/// other entry point defaults to a "Not supported" error so small engines
/// stay small.
pub trait NativeEngine: Send + Sync {
    // -------------------------------------------------------------------------
    // Data
    // -------------------------------------------------------------------------
    fn get(&self, options: &ReadOptions, cf: ColumnFamilyId, key: &[u8]) -> NativeResult<Option<Bytes>>;

    /// Look up several keys. One result per key, in order.
    fn multi_get(
        &self,
        options: &ReadOptions,
        keys: &[(ColumnFamilyId, &[u8])],
    ) -> Vec<NativeResult<Option<Bytes>>> {
        keys.iter().map(|(cf, key)| self.get(options, *cf, key)).collect()
    }

    fn put(&self, options: &WriteOptions, cf: ColumnFamilyId, key: &[u8], value: &[u8]) -> NativeResult<()>;

    fn delete(&self, options: &WriteOptions, cf: ColumnFamilyId, key: &[u8]) -> NativeResult<()>;

    fn merge(&self, _options: &WriteOptions, _cf: ColumnFamilyId, _key: &[u8], _value: &[u8]) -> NativeResult<()> {
        Err(not_supported("merge"))
    }

    /// Apply every operation in `batch` atomically
    fn write(&self, options: &WriteOptions, batch: &WriteBatch) -> NativeResult<()>;

    // -------------------------------------------------------------------------
    // Iteration / Snapshots
    // -------------------------------------------------------------------------
    fn create_iterator(&self, _options: &ReadOptions, _cf: ColumnFamilyId) -> NativeResult<Box<dyn NativeIterator>> {
        Err(not_supported("iterators"))
    }

    fn create_snapshot(&self) -> NativeResult<SnapshotId> {
        Err(not_supported("snapshots"))
    }

    /// Release a snapshot. Unknown ids are ignored.
    fn release_snapshot(&self, _snapshot: SnapshotId) {}

    // -------------------------------------------------------------------------
    // Column Families
    // -------------------------------------------------------------------------
    fn create_column_family(&self, _options: &Options, _name: &str) -> NativeResult<ColumnFamilyId> {
        Err(not_supported("column families"))
    }

    fn drop_column_family(&self, _cf: ColumnFamilyId) -> NativeResult<()> {
        Err(not_supported("column families"))
    }

    // -------------------------------------------------------------------------
    // Introspection
    // -------------------------------------------------------------------------
    /// Value of a named property; `None` if the engine does not know it
    fn property_value(&self, _cf: ColumnFamilyId, _name: &str) -> NativeResult<Option<String>> {
        Ok(None)
    }

    /// Bytes on disk per range
    fn approximate_sizes(&self, _cf: ColumnFamilyId, _ranges: &[KeyBounds<'_>]) -> NativeResult<Vec<u64>> {
        Err(not_supported("approximate sizes"))
    }

    /// Bytes held in memory per range
    fn approximate_memtable_sizes(&self, _cf: ColumnFamilyId, _ranges: &[KeyBounds<'_>]) -> NativeResult<Vec<u64>> {
        Err(not_supported("approximate memtable sizes"))
    }

    /// Estimated number of keys across all ranges
    fn approximate_key_num(&self, _cf: ColumnFamilyId, _ranges: &[KeyBounds<'_>]) -> NativeResult<u64> {
        Err(not_supported("approximate key count"))
    }

    fn live_files(&self) -> NativeResult<Vec<LiveFileMetadata>> {
        Err(not_supported("live files"))
    }

    // -------------------------------------------------------------------------
    // Maintenance
    // -------------------------------------------------------------------------
    fn compact_range(&self, _cf: ColumnFamilyId, _range: KeyBounds<'_>) -> NativeResult<()> {
        Err(not_supported("compaction"))
    }

    fn flush(&self, _options: &FlushOptions) -> NativeResult<()> {
        Err(not_supported("flush"))
    }

    fn disable_file_deletions(&self) -> NativeResult<()> {
        Err(not_supported("file deletion control"))
    }

    fn enable_file_deletions(&self, _force: bool) -> NativeResult<()> {
        Err(not_supported("file deletion control"))
    }

    fn delete_file(&self, _name: &str) -> NativeResult<()> {
        Err(not_supported("delete file"))
    }

    /// Delete every file whose keys all fall inside `range` (limit inclusive)
    fn delete_files_in_range(&self, _cf: ColumnFamilyId, _range: KeyBounds<'_>) -> NativeResult<()> {
        Err(not_supported("delete files in range"))
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------
    /// Stop background work and reject new writes. The instance stays usable
    /// for reads and must still be closed.
    fn shutdown(&self) -> NativeResult<()> {
        Ok(())
    }

    /// Release the instance
    fn close(self: Box<Self>) -> NativeResult<()>;
}
