//! WAL Reader
//!
//! Handles reading entries from the WAL file.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{StoreError, StoreResult};

use super::entry::EntryHeader;
use super::{WalEntry, HEADER_SIZE};

/// Reads entries from the WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// Offset of the next unread entry
    position: u64,
    file_len: u64,
}

/// What the reader found at the current position
#[derive(Debug)]
pub enum ReadOutcome {
    /// A complete, valid entry
    Entry(WalEntry),
    /// Clean end of file
    End,
    /// A partial entry at the end of the file (crash mid-write)
    TornTail,
    /// A complete entry that fails validation; the reader has moved past it
    Corrupt(StoreError),
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> StoreResult<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            file_len,
        })
    }

    /// Read the next entry, classifying anything that is not a valid entry
    pub fn read_next(&mut self) -> StoreResult<ReadOutcome> {
        let remaining = self.file_len - self.position;
        if remaining == 0 {
            return Ok(ReadOutcome::End);
        }
        if remaining < HEADER_SIZE as u64 {
            return Ok(ReadOutcome::TornTail);
        }

        let mut header_bytes = [0u8; HEADER_SIZE];
        self.reader.read_exact(&mut header_bytes)?;
        let header = EntryHeader::parse(&header_bytes)?;

        if remaining < (HEADER_SIZE + header.len) as u64 {
            return Ok(ReadOutcome::TornTail);
        }

        let mut payload = vec![0u8; header.len];
        self.reader.read_exact(&mut payload)?;

        self.position += (HEADER_SIZE + header.len) as u64;
        match WalEntry::from_payload(&header, &payload) {
            Ok(entry) => Ok(ReadOutcome::Entry(entry)),
            Err(e) => Ok(ReadOutcome::Corrupt(e)),
        }
    }

    /// Offset just past the last complete entry read
    pub fn position(&self) -> u64 {
        self.position
    }
}
