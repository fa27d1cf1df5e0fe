//! WAL Entry definitions
//!
//! One entry per committed write batch.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// Operations of one write batch, applied together on replay
    pub operations: Vec<Operation>,

    /// Timestamp (unix millis) when entry was created
    pub timestamp: u64,
}

/// Operations that can be logged. Merges are resolved before logging and
/// land here as puts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    /// Put a key-value pair into a column family
    Put { cf: u32, key: Vec<u8>, value: Vec<u8> },

    /// Delete a key from a column family
    Delete { cf: u32, key: Vec<u8> },
}

impl Operation {
    /// Column family the operation targets
    pub fn column_family(&self) -> u32 {
        match self {
            Operation::Put { cf, .. } | Operation::Delete { cf, .. } => *cf,
        }
    }
}

impl WalEntry {
    /// Create an entry stamped with the current time
    pub fn new(lsn: u64, operations: Vec<Operation>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            lsn,
            operations,
            timestamp,
        }
    }

    /// Encode as `[lsn(8)][crc(4)][len(4)][payload]`
    pub fn serialize(&self) -> StoreResult<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let crc = crc32fast::hash(&payload);

        let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
        bytes.extend_from_slice(&self.lsn.to_le_bytes());
        bytes.extend_from_slice(&crc.to_le_bytes());
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Decode one entry from the start of `bytes`
    pub fn deserialize(bytes: &[u8]) -> StoreResult<Self> {
        let header = EntryHeader::parse(bytes)?;
        let end = HEADER_SIZE + header.len;
        if bytes.len() < end {
            return Err(StoreError::Corruption(format!(
                "wal entry {} truncated: need {} bytes, have {}",
                header.lsn,
                end,
                bytes.len()
            )));
        }
        Self::from_payload(&header, &bytes[HEADER_SIZE..end])
    }

    pub(crate) fn from_payload(header: &EntryHeader, payload: &[u8]) -> StoreResult<Self> {
        let actual = crc32fast::hash(payload);
        if actual != header.crc {
            return Err(StoreError::Corruption(format!(
                "wal entry {} checksum mismatch: expected {:#010x}, got {:#010x}",
                header.lsn, header.crc, actual
            )));
        }

        let entry: WalEntry = bincode::deserialize(payload)?;
        if entry.lsn != header.lsn {
            return Err(StoreError::Corruption(format!(
                "wal entry header lsn {} does not match payload lsn {}",
                header.lsn, entry.lsn
            )));
        }
        Ok(entry)
    }

    /// Size of the encoded entry, header included
    pub fn serialized_size(&self) -> StoreResult<usize> {
        Ok(HEADER_SIZE + bincode::serialized_size(self)? as usize)
    }

    /// CRC32 of the encoded payload
    pub fn compute_crc(&self) -> StoreResult<u32> {
        Ok(crc32fast::hash(&bincode::serialize(self)?))
    }
}

/// Decoded fixed-size entry header
#[derive(Debug, Clone, Copy)]
pub(crate) struct EntryHeader {
    pub lsn: u64,
    pub crc: u32,
    pub len: usize,
}

impl EntryHeader {
    pub(crate) fn parse(bytes: &[u8]) -> StoreResult<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(StoreError::Corruption(format!(
                "wal entry header truncated: {} bytes",
                bytes.len()
            )));
        }
        let mut lsn = [0u8; 8];
        let mut crc = [0u8; 4];
        let mut len = [0u8; 4];
        lsn.copy_from_slice(&bytes[0..8]);
        crc.copy_from_slice(&bytes[8..12]);
        len.copy_from_slice(&bytes[12..16]);
        Ok(Self {
            lsn: u64::from_le_bytes(lsn),
            crc: u32::from_le_bytes(crc),
            len: u32::from_le_bytes(len) as usize,
        })
    }
}
