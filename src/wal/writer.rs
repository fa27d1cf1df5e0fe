//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::StoreResult;

use super::{Operation, WalEntry};

/// Writes entries to the WAL file
pub struct WalWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    /// LSN the next append gets
    next_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries appended since the last fsync
    unsynced: usize,
}

impl WalWriter {
    /// Open or create a WAL file, appending after any existing content.
    /// `next_lsn` continues the sequence left by recovery.
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy, next_lsn: u64) -> StoreResult<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            next_lsn: next_lsn.max(1),
            sync_strategy,
            unsynced: 0,
        })
    }

    /// Append one batch and return its LSN.
    ///
    /// The entry is always flushed to the OS; it is fsynced when
    /// `force_sync` is set or the sync strategy says so.
    pub fn append(&mut self, operations: Vec<Operation>, force_sync: bool) -> StoreResult<u64> {
        let lsn = self.next_lsn;
        let bytes = WalEntry::new(lsn, operations).serialize()?;

        self.writer.write_all(&bytes)?;
        self.writer.flush()?;
        self.next_lsn += 1;
        self.unsynced += 1;

        let due = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.unsynced >= count.max(1),
        };
        if force_sync || due {
            self.sync()?;
        }

        Ok(lsn)
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> StoreResult<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        self.unsynced = 0;
        Ok(())
    }

    /// Drop every entry. Called once the memtables they cover are on disk.
    pub fn truncate(&mut self) -> StoreResult<()> {
        self.writer.flush()?;
        let file = self.writer.get_mut();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.sync_all()?;
        self.unsynced = 0;
        tracing::debug!(wal = %self.path.display(), next_lsn = self.next_lsn, "wal truncated");
        Ok(())
    }
}
