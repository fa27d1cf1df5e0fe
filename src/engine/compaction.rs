//! Compaction
//!
//! Rewrites a set of tables into one, newest version of each key wins.
//!
//! ## Steps
//! 1. Seed: level-0 files (automatic) or files overlapping a range (manual)
//! 2. Close the set over key overlap, so no table outside it holds any key
//!    the inputs hold
//! 3. Merge oldest → newest
//! 4. Drop tombstones, run the rest through the compaction filter
//! 5. Write one output table one level below the deepest input
//!
//! Step 2 is what makes dropping tombstones safe and lets the output take a
//! fresh, higher file id without shadowing newer data.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::callback::{compaction_filter_filter, FilterVerdict};
use crate::error::{StoreError, StoreResult};
use crate::range::KeyBounds;
use crate::storage::{SSTableBuilder, SSTableReader, NUM_LEVELS};

/// Which tables start a compaction
#[derive(Debug, Clone, Copy)]
pub(crate) enum CompactionSeed<'a> {
    /// Every level-0 table
    Level0,
    /// Every table overlapping the range
    Range(KeyBounds<'a>),
}

/// What one compaction did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CompactionStats {
    pub input_files: usize,
    pub entries_written: u64,
    pub tombstones_dropped: u64,
    pub filter_removed: u64,
    pub filter_changed: u64,
}

/// Pick the input tables, oldest first. Empty if nothing matches the seed.
pub(crate) fn select_inputs(
    tables: &[Arc<SSTableReader>],
    seed: CompactionSeed<'_>,
) -> Vec<Arc<SSTableReader>> {
    let mut inputs: Vec<Arc<SSTableReader>> = tables
        .iter()
        .filter(|t| match seed {
            CompactionSeed::Level0 => t.level() == 0,
            CompactionSeed::Range(bounds) => bounds.overlaps(t.smallest_key(), t.largest_key()),
        })
        .cloned()
        .collect();

    if inputs.is_empty() {
        return inputs;
    }

    loop {
        let (lo, hi) = key_span(&inputs);
        let extra: Vec<Arc<SSTableReader>> = tables
            .iter()
            .filter(|t| !inputs.iter().any(|i| i.file_id() == t.file_id()))
            .filter(|t| t.smallest_key() <= hi.as_slice() && t.largest_key() >= lo.as_slice())
            .cloned()
            .collect();
        if extra.is_empty() {
            break;
        }
        inputs.extend(extra);
    }

    inputs.sort_unstable_by_key(|t| t.file_id());
    inputs
}

/// Closed span `[smallest, largest]` covered by `tables`
fn key_span(tables: &[Arc<SSTableReader>]) -> (Vec<u8>, Vec<u8>) {
    let lo = tables.iter().map(|t| t.smallest_key()).min().unwrap_or_default();
    let hi = tables.iter().map(|t| t.largest_key()).max().unwrap_or_default();
    (lo.to_vec(), hi.to_vec())
}

/// Level the output table goes to
pub(crate) fn output_level(inputs: &[Arc<SSTableReader>]) -> u32 {
    let deepest = inputs.iter().map(|t| t.level()).max().unwrap_or(0);
    (deepest + 1).min(NUM_LEVELS - 1)
}

/// Level reported to the compaction filter: the shallowest input level
pub(crate) fn filter_level(inputs: &[Arc<SSTableReader>]) -> u32 {
    inputs.iter().map(|t| t.level()).min().unwrap_or(0)
}

/// Merge inputs (oldest first) so that later tables override earlier ones.
/// `None` values are tombstones.
pub(crate) fn merge_inputs(inputs: &[Arc<SSTableReader>]) -> StoreResult<BTreeMap<Vec<u8>, Option<Vec<u8>>>> {
    let mut merged = BTreeMap::new();
    for table in inputs {
        for entry in table.iter()? {
            let (key, value) = entry?;
            merged.insert(key, value);
        }
    }
    Ok(merged)
}

/// Write merged entries through the filter into `builder`.
///
/// Checks `shutting_down` before every entry and stops with a shutdown
/// error when it is set.
pub(crate) fn write_output(
    builder: &mut SSTableBuilder,
    merged: &BTreeMap<Vec<u8>, Option<Vec<u8>>>,
    filter_index: usize,
    level: u32,
    shutting_down: &AtomicBool,
    stats: &mut CompactionStats,
) -> StoreResult<()> {
    for (key, value) in merged {
        if shutting_down.load(Ordering::Acquire) {
            return Err(StoreError::ShutdownInProgress("compaction aborted".to_string()));
        }

        let Some(value) = value else {
            stats.tombstones_dropped += 1;
            continue;
        };

        match compaction_filter_filter(filter_index, level, key, value) {
            FilterVerdict::Keep => builder.add(key, value)?,
            FilterVerdict::Remove => {
                stats.filter_removed += 1;
                continue;
            }
            FilterVerdict::ChangeValue(new_value) => {
                stats.filter_changed += 1;
                builder.add(key, &new_value)?;
            }
        }
        stats.entries_written += 1;
    }
    Ok(())
}
