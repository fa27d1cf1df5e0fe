//! WAL Recovery
//!
//! Handles crash recovery by replaying the WAL.

use std::fs::OpenOptions;
use std::path::Path;

use crate::error::StoreResult;

use super::reader::{ReadOutcome, WalReader};
use super::WalEntry;

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the WAL was truncated (partial writes removed)
    pub was_truncated: bool,
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Skip complete entries whose checksum fails
    /// 3. Truncate a partial write at the end
    /// 4. Return all valid entries in order
    ///
    /// With `paranoid` set, a checksum failure fails recovery instead of
    /// being skipped. A torn tail is always tolerated.
    pub fn recover(path: &Path, paranoid: bool) -> StoreResult<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, result, valid_len) = Self::scan(path, paranoid)?;

        if result.was_truncated {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_len)?;
            file.sync_all()?;
            tracing::warn!(
                wal = %path.display(),
                valid_len,
                last_lsn = result.last_lsn,
                "truncated damaged wal tail"
            );
        }

        Ok((entries, result))
    }

    /// Same as [`recover`](Self::recover) but never modifies the file
    pub fn replay(path: &Path, paranoid: bool) -> StoreResult<(Vec<WalEntry>, RecoveryResult)> {
        Self::scan(path, paranoid).map(|(entries, result, _)| (entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> StoreResult<RecoveryResult> {
        Self::scan(path, false).map(|(_, result, _)| result)
    }

    fn scan(path: &Path, paranoid: bool) -> StoreResult<(Vec<WalEntry>, RecoveryResult, u64)> {
        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();

        loop {
            match reader.read_next()? {
                ReadOutcome::Entry(entry) => {
                    result.entries_recovered += 1;
                    result.last_lsn = entry.lsn;
                    entries.push(entry);
                }
                ReadOutcome::End => break,
                ReadOutcome::TornTail => {
                    result.entries_corrupted += 1;
                    result.was_truncated = true;
                    break;
                }
                ReadOutcome::Corrupt(e) => {
                    if paranoid {
                        return Err(e);
                    }
                    tracing::warn!(wal = %path.display(), error = %e, "skipping corrupt wal entry");
                    result.entries_corrupted += 1;
                }
            }
        }

        Ok((entries, result, reader.position()))
    }
}
