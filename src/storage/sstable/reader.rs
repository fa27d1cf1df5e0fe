//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups via in-memory index.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::cache::Cache;
use crate::error::{StoreError, StoreResult};
use crate::perf::{self, PerfMetric};
use crate::range::KeyBounds;

use super::iterator::SSTableIterator;
use super::{TableLookup, FOOTER_SIZE, HEADER_SIZE, MAGIC, TOMBSTONE_MARKER, VERSION};

/// Reader for SSTable files with in-memory index for O(log n) lookups.
///
/// Shared as `Arc<SSTableReader>` between the live file list, snapshots and
/// iterators. Once marked obsolete, the file is deleted when the last
/// reference goes away.
#[derive(Debug)]
pub struct SSTableReader {
    path: PathBuf,
    /// Engine-wide unique file number
    file_id: u64,
    /// Level recorded in the header
    level: u32,
    /// File handle for reading entries
    file: Mutex<BufReader<File>>,
    /// In-memory index: key → file offset
    index: BTreeMap<Vec<u8>, u64>,
    entry_count: u64,
    /// Index block starting offset, i.e. end of the data block
    index_offset: u64,
    data_crc: u32,
    file_size: u64,
    obsolete: AtomicBool,
}

fn le_u16(bytes: &[u8]) -> u16 {
    let mut raw = [0u8; 2];
    raw.copy_from_slice(&bytes[..2]);
    u16::from_le_bytes(raw)
}

fn le_u32(bytes: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[..4]);
    u32::from_le_bytes(raw)
}

fn le_u64(bytes: &[u8]) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[..8]);
    u64::from_le_bytes(raw)
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Loads the entire index into memory for fast lookups. With `paranoid`
    /// set, the data block checksum is verified before returning.
    pub fn open(path: &Path, file_id: u64, paranoid: bool) -> StoreResult<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(StoreError::Corruption(format!(
                "{}: file too short to be an sstable ({} bytes)",
                path.display(),
                file_size
            )));
        }

        // Read and validate header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(StoreError::Corruption(format!(
                "{}: bad sstable magic {:?}",
                path.display(),
                &header[0..4]
            )));
        }

        let version = le_u16(&header[4..6]);
        if version != VERSION {
            return Err(StoreError::Corruption(format!(
                "{}: unsupported sstable version {}",
                path.display(),
                version
            )));
        }

        let level = le_u16(&header[6..8]) as u32;
        let entry_count = le_u64(&header[8..16]);

        // Read footer to get index offset
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = le_u64(&footer[0..8]);
        let data_crc = le_u32(&footer[8..12]);

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(StoreError::Corruption(format!(
                "{}: index offset {} out of bounds",
                path.display(),
                index_offset
            )));
        }

        // Load index into memory
        file.seek(SeekFrom::Start(index_offset))?;
        let index_block_size = file_size - FOOTER_SIZE - index_offset;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.read_exact(&mut index_data)?;

        // Parse index entries: [key_len(4)][offset(8)][key]
        let mut index = BTreeMap::new();
        let mut pos = 0;
        while pos < index_data.len() {
            if pos + 12 > index_data.len() {
                return Err(StoreError::Corruption(format!(
                    "{}: truncated index entry",
                    path.display()
                )));
            }
            let key_len = le_u32(&index_data[pos..]) as usize;
            let offset = le_u64(&index_data[pos + 4..]);
            pos += 12;

            if pos + key_len > index_data.len() {
                return Err(StoreError::Corruption(format!(
                    "{}: truncated index key",
                    path.display()
                )));
            }
            index.insert(index_data[pos..pos + key_len].to_vec(), offset);
            pos += key_len;
        }

        if index.len() as u64 != entry_count {
            return Err(StoreError::Corruption(format!(
                "{}: header says {} entries, index has {}",
                path.display(),
                entry_count,
                index.len()
            )));
        }

        let reader = Self {
            path: path.to_path_buf(),
            file_id,
            level,
            file: Mutex::new(BufReader::new(file)),
            index,
            entry_count,
            index_offset,
            data_crc,
            file_size,
            obsolete: AtomicBool::new(false),
        };

        if paranoid {
            reader.verify_checksum()?;
        }

        Ok(reader)
    }

    /// Point lookup: O(log n) via the in-memory index, then one seek.
    ///
    /// Live values are served from `cache` when present, and inserted into
    /// it after a disk read when `fill_cache` is set.
    pub fn get(&self, key: &[u8], cache: Option<&Cache>, fill_cache: bool) -> StoreResult<TableLookup> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Ok(TableLookup::Missing),
        };

        if let Some(cache) = cache {
            if let Some(value) = cache.lookup(self.file_id, key) {
                perf::record(PerfMetric::BlockCacheHitCount, 1);
                perf::record(PerfMetric::GetReadBytes, value.len() as u64);
                return Ok(TableLookup::Found(value));
            }
        }

        let value = {
            let mut file = self.file.lock();
            file.seek(SeekFrom::Start(offset))?;

            let mut header = [0u8; 8];
            file.read_exact(&mut header)?;

            let key_len = le_u32(&header[0..4]) as usize;
            let val_len = le_u32(&header[4..8]);

            // Skip the key (we already know it matches)
            file.seek_relative(key_len as i64)?;

            if val_len == TOMBSTONE_MARKER {
                perf::record(PerfMetric::BlockReadCount, 1);
                perf::record(PerfMetric::BlockReadByte, 8 + key_len as u64);
                return Ok(TableLookup::Deleted);
            }

            let mut value = vec![0u8; val_len as usize];
            file.read_exact(&mut value)?;
            perf::record(PerfMetric::BlockReadCount, 1);
            perf::record(PerfMetric::BlockReadByte, 8 + key_len as u64 + val_len as u64);
            Bytes::from(value)
        };

        perf::record(PerfMetric::GetReadBytes, value.len() as u64);
        if let (Some(cache), true) = (cache, fill_cache) {
            cache.insert(self.file_id, key, value.clone());
        }
        Ok(TableLookup::Found(value))
    }

    /// Iterate over every entry (tombstones included)
    pub fn iter(&self) -> StoreResult<SSTableIterator<'_>> {
        SSTableIterator::new(self.file.lock(), HEADER_SIZE, self.index_offset)
    }

    /// Iterate over the entries whose keys fall inside `bounds`
    pub fn iter_range(&self, bounds: KeyBounds<'_>) -> StoreResult<SSTableIterator<'_>> {
        let (start, end) = self.offset_span(bounds);
        SSTableIterator::new(self.file.lock(), start, end)
    }

    /// Collect the entries inside `bounds`
    pub fn scan(&self, bounds: KeyBounds<'_>) -> StoreResult<Vec<(Vec<u8>, Option<Bytes>)>> {
        self.iter_range(bounds)?
            .map(|entry| entry.map(|(k, v)| (k, v.map(Bytes::from))))
            .collect()
    }

    /// Re-read the data block and compare against the footer checksum
    pub fn verify_checksum(&self) -> StoreResult<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(HEADER_SIZE))?;

        let mut hasher = crc32fast::Hasher::new();
        let mut remaining = self.index_offset - HEADER_SIZE;
        let mut buf = vec![0u8; 64 * 1024];
        while remaining > 0 {
            let chunk = remaining.min(buf.len() as u64) as usize;
            file.read_exact(&mut buf[..chunk])?;
            hasher.update(&buf[..chunk]);
            remaining -= chunk as u64;
        }

        let actual = hasher.finalize();
        if actual != self.data_crc {
            return Err(StoreError::Corruption(format!(
                "{}: block checksum mismatch: expected {:#010x}, got {:#010x}",
                self.path.display(),
                self.data_crc,
                actual
            )));
        }
        Ok(())
    }

    /// Bytes of the data block holding keys inside `bounds`
    pub fn bytes_in_range(&self, bounds: KeyBounds<'_>) -> u64 {
        let (start, end) = self.offset_span(bounds);
        end - start
    }

    /// Number of index entries inside `bounds` (tombstones included)
    pub fn keys_in_range(&self, bounds: KeyBounds<'_>) -> u64 {
        match bounds.as_range() {
            Some(range) => self.index.range::<[u8], _>(range).count() as u64,
            None => 0,
        }
    }

    /// Data block offsets `[start, end)` covering `bounds`
    fn offset_span(&self, bounds: KeyBounds<'_>) -> (u64, u64) {
        let range = match bounds.as_range() {
            Some(range) => range,
            None => return (self.index_offset, self.index_offset),
        };
        let mut in_range = self.index.range::<[u8], _>(range);
        let start = match in_range.next() {
            Some((_, &off)) => off,
            None => return (self.index_offset, self.index_offset),
        };
        let end = match bounds.limit {
            Some(limit) => self
                .index
                .range::<[u8], _>((Bound::Included(limit), Bound::Unbounded))
                .next()
                .map_or(self.index_offset, |(_, &off)| off),
            None => self.index_offset,
        };
        (start, end)
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Smallest key in this table
    pub fn smallest_key(&self) -> &[u8] {
        self.index.keys().next().map(|k| k.as_slice()).unwrap_or_default()
    }

    /// Largest key in this table
    pub fn largest_key(&self) -> &[u8] {
        self.index.keys().next_back().map(|k| k.as_slice()).unwrap_or_default()
    }

    /// Quick check if a key might be in this SSTable (range check)
    pub fn might_contain(&self, key: &[u8]) -> bool {
        !self.index.is_empty() && key >= self.smallest_key() && key <= self.largest_key()
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn file_id(&self) -> u64 {
        self.file_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bare file name, e.g. `sstable_000007.sst`. Unique across the database.
    pub fn file_name(&self) -> String {
        super::table_file_name(self.file_id)
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    /// Delete the file once the last reference is dropped
    pub fn mark_obsolete(&self) {
        self.obsolete.store(true, Ordering::Release);
    }

    pub fn is_obsolete(&self) -> bool {
        self.obsolete.load(Ordering::Acquire)
    }
}

impl Drop for SSTableReader {
    fn drop(&mut self) {
        if !self.is_obsolete() {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(file = %self.path.display(), "deleted obsolete sstable"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(file = %self.path.display(), error = %e, "failed to delete obsolete sstable")
            }
        }
    }
}
