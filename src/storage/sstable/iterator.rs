//! SSTable Iterator
//!
//! Sequential iteration over a span of entries in an SSTable.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};

use parking_lot::MutexGuard;

use crate::error::{StoreError, StoreResult};

use super::TOMBSTONE_MARKER;

/// Iterator over SSTable entries in sorted key order.
///
/// Holds the reader's file lock for its whole lifetime; point lookups on the
/// same table wait until it is dropped.
pub struct SSTableIterator<'a> {
    file: MutexGuard<'a, BufReader<File>>,
    /// Stop reading when we reach this offset
    end_offset: u64,
    /// Current position in file
    current_offset: u64,
}

impl<'a> SSTableIterator<'a> {
    /// Create an iterator over `[start_offset, end_offset)` of the data block
    pub(super) fn new(
        mut file: MutexGuard<'a, BufReader<File>>,
        start_offset: u64,
        end_offset: u64,
    ) -> StoreResult<Self> {
        file.seek(SeekFrom::Start(start_offset))?;
        Ok(Self {
            file,
            end_offset,
            current_offset: start_offset,
        })
    }

    fn read_entry(&mut self) -> StoreResult<(Vec<u8>, Option<Vec<u8>>)> {
        let mut header = [0u8; 8];
        self.file.read_exact(&mut header)?;

        let key_len = u32::from_le_bytes([header[0], header[1], header[2], header[3]]) as usize;
        let val_len = u32::from_le_bytes([header[4], header[5], header[6], header[7]]);

        let mut entry_size = 8 + key_len as u64;
        if self.current_offset + entry_size > self.end_offset {
            return Err(StoreError::Corruption(format!(
                "sstable entry at offset {} runs past the data block",
                self.current_offset
            )));
        }

        let mut key = vec![0u8; key_len];
        self.file.read_exact(&mut key)?;

        let value = if val_len == TOMBSTONE_MARKER {
            None
        } else {
            let mut v = vec![0u8; val_len as usize];
            self.file.read_exact(&mut v)?;
            entry_size += val_len as u64;
            Some(v)
        };

        self.current_offset += entry_size;
        Ok((key, value))
    }
}

impl<'a> Iterator for SSTableIterator<'a> {
    /// (key, Option<value>); a None value is a tombstone
    type Item = StoreResult<(Vec<u8>, Option<Vec<u8>>)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_offset >= self.end_offset {
            return None;
        }

        match self.read_entry() {
            Ok(entry) => Some(Ok(entry)),
            Err(e) => {
                // Stop after the first error
                self.current_offset = self.end_offset;
                Some(Err(e))
            }
        }
    }
}
