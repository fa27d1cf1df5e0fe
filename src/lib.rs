//! # atlasbind
//!
//! Safe handles over a disk-backed key-value engine, with:
//! - A guarded engine handle: operations racing a close either finish or get
//!   a typed "closed" error, never a freed handle
//! - Compaction filters and merge operators written in Rust and reached by
//!   the engine through integer indices
//! - A bundled LSM engine (WAL, memtables, SSTables, compaction)
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Db                                 │
//! │          (GuardedResource: shared ops / exclusive close)     │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ NativeEngine (ids, byte slices, messages)
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                        LsmEngine                             │
//! └──────┬──────────────────┬─────────────────────┬─────────────┘
//!        │                  │                     │
//!        ▼                  ▼                     ▼
//!   ┌─────────┐      ┌─────────────┐       ┌─────────────┐
//!   │   WAL   │      │  MemTable   │       │   Storage   │
//!   │(Append) │      │ (per CF)    │       │  (SSTable)  │
//!   └─────────┘      └─────────────┘       └──────┬──────┘
//!                                                 │ compaction
//!                                                 ▼
//!                                  ┌──────────────────────────┐
//!                                  │ callback dispatch shim   │
//!                                  │  → CallbackRegistry      │
//!                                  │  → host CompactionFilter │
//!                                  └──────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;
pub mod guard;
pub mod callback;

pub mod range;
pub mod metadata;
pub mod column_family;
pub mod write_batch;
pub mod snapshot;
pub mod iterator;

pub mod native;
pub mod cache;
pub mod perf;

pub mod wal;
pub mod memtable;
pub mod storage;
pub mod engine;
pub mod db;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{Error, Result};
pub use config::{BlockBasedTableOptions, FlushOptions, Options, ReadOptions, WalSyncStrategy, WriteOptions};
pub use guard::GuardedResource;
pub use callback::{CallbackRegistry, CompactionFilter, FilterDecision, MergeOperator};
pub use range::Range;
pub use metadata::LiveFileMetadata;
pub use column_family::ColumnFamilyHandle;
pub use write_batch::WriteBatch;
pub use snapshot::Snapshot;
pub use iterator::DbIterator;
pub use native::{NativeEngine, NativeIterator};
pub use cache::Cache;
pub use perf::{set_perf_level, PerfContext, PerfLevel};
pub use db::{destroy_db, repair_db, Db};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of atlasbind
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
