//! Read Views
//!
//! A [`CfView`] is a pinned memtable version plus a pinned table set. Reads
//! with a snapshot and every iterator go through one, so neither flushes
//! nor compactions change what they see.

use std::collections::BTreeMap;

use bytes::Bytes;

use crate::cache::Cache;
use crate::error::StoreResult;
use crate::memtable::{MemTableEntry, MemTableView};
use crate::native::{NativeIterator, NativeResult};
use crate::perf::{self, PerfMetric, PerfTimer};
use crate::range::KeyBounds;
use crate::storage::{get_from, TableSet};

#[derive(Clone)]
pub(crate) struct CfView {
    pub memtable: MemTableView,
    pub tables: TableSet,
}

impl CfView {
    /// Point lookup: memtable, then tables newest → oldest
    pub fn get(&self, key: &[u8], cache: Option<&Cache>, fill_cache: bool) -> StoreResult<Option<Bytes>> {
        if let Some(entry) = self.memtable.get(key) {
            perf::record(PerfMetric::GetFromMemtableCount, 1);
            return Ok(match entry {
                MemTableEntry::Value(v) => {
                    perf::record(PerfMetric::GetReadBytes, v.len() as u64);
                    Some(v.clone())
                }
                MemTableEntry::Tombstone => None,
            });
        }
        let _timer = PerfTimer::start(PerfMetric::GetFromOutputFilesTime);
        get_from(&self.tables, key, cache, fill_cache)
    }

    /// Every live entry inside `bounds`, in key order
    pub fn scan(&self, bounds: KeyBounds<'_>) -> StoreResult<Vec<(Vec<u8>, Bytes)>> {
        let range = match bounds.as_range() {
            Some(range) => range,
            None => return Ok(Vec::new()),
        };

        // Oldest first so newer versions overwrite older ones
        let mut merged: BTreeMap<Vec<u8>, Option<Bytes>> = BTreeMap::new();
        for table in self.tables.iter().rev() {
            if !bounds.overlaps(table.smallest_key(), table.largest_key()) {
                continue;
            }
            for (key, value) in table.scan(bounds)? {
                merged.insert(key, value);
            }
        }
        for (key, entry) in self.memtable.range::<[u8], _>(range) {
            let value = match entry {
                MemTableEntry::Value(v) => Some(v.clone()),
                MemTableEntry::Tombstone => None,
            };
            merged.insert(key.clone(), value);
        }

        Ok(merged
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect())
    }
}

/// Iterator over a materialized view.
///
/// The entries inside the read bounds are collected when the iterator is
/// created; it holds no locks afterwards.
pub struct LsmIterator {
    entries: Vec<(Vec<u8>, Bytes)>,
    pos: Option<usize>,
    status: NativeResult<()>,
}

impl LsmIterator {
    pub(crate) fn new(view: &CfView, bounds: KeyBounds<'_>) -> Self {
        match view.scan(bounds) {
            Ok(entries) => Self {
                entries,
                pos: None,
                status: Ok(()),
            },
            Err(e) => Self {
                entries: Vec::new(),
                pos: None,
                status: Err(e.to_string()),
            },
        }
    }

    fn position_at(&mut self, index: usize) {
        self.pos = if index < self.entries.len() { Some(index) } else { None };
    }
}

impl NativeIterator for LsmIterator {
    fn seek_to_first(&mut self) {
        self.position_at(0);
    }

    fn seek_to_last(&mut self) {
        self.pos = self.entries.len().checked_sub(1);
    }

    fn seek(&mut self, key: &[u8]) {
        let index = self.entries.partition_point(|(k, _)| k.as_slice() < key);
        self.position_at(index);
    }

    fn seek_for_prev(&mut self, key: &[u8]) {
        let index = self.entries.partition_point(|(k, _)| k.as_slice() <= key);
        self.pos = index.checked_sub(1);
    }

    fn next(&mut self) {
        if let Some(p) = self.pos {
            self.position_at(p + 1);
        }
    }

    fn prev(&mut self) {
        if let Some(p) = self.pos {
            self.pos = p.checked_sub(1);
        }
    }

    fn valid(&self) -> bool {
        self.pos.is_some()
    }

    fn key(&self) -> Option<&[u8]> {
        self.pos.map(|p| self.entries[p].0.as_slice())
    }

    fn value(&self) -> Option<&[u8]> {
        self.pos.map(|p| self.entries[p].1.as_ref())
    }

    fn status(&self) -> NativeResult<()> {
        self.status.clone()
    }
}
