//! Perf Context
//!
//! Per-thread counters the engine bumps on its hot paths, gated by a
//! process-wide [`PerfLevel`]. Counting is off by default.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;

/// How much the engine records
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum PerfLevel {
    Unknown = 0,
    Disable = 1,
    EnableCount = 2,
    EnableTimeExceptForMutex = 3,
    EnableTime = 4,
}

impl PerfLevel {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => PerfLevel::Disable,
            2 => PerfLevel::EnableCount,
            3 => PerfLevel::EnableTimeExceptForMutex,
            4 => PerfLevel::EnableTime,
            _ => PerfLevel::Unknown,
        }
    }
}

static PERF_LEVEL: AtomicU8 = AtomicU8::new(PerfLevel::Disable as u8);

/// Set the perf level for every thread
pub fn set_perf_level(level: PerfLevel) {
    PERF_LEVEL.store(level as u8, Ordering::Relaxed);
}

/// Current perf level
pub fn perf_level() -> PerfLevel {
    PerfLevel::from_u8(PERF_LEVEL.load(Ordering::Relaxed))
}

/// Counter slots, in report order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerfMetric {
    GetFromMemtableCount,
    GetReadBytes,
    BlockReadCount,
    BlockReadByte,
    BlockCacheHitCount,
    WriteWalTime,
    WriteMemtableTime,
    GetFromOutputFilesTime,
}

impl PerfMetric {
    const ALL: [PerfMetric; 8] = [
        PerfMetric::GetFromMemtableCount,
        PerfMetric::GetReadBytes,
        PerfMetric::BlockReadCount,
        PerfMetric::BlockReadByte,
        PerfMetric::BlockCacheHitCount,
        PerfMetric::WriteWalTime,
        PerfMetric::WriteMemtableTime,
        PerfMetric::GetFromOutputFilesTime,
    ];

    fn name(self) -> &'static str {
        match self {
            PerfMetric::GetFromMemtableCount => "get_from_memtable_count",
            PerfMetric::GetReadBytes => "get_read_bytes",
            PerfMetric::BlockReadCount => "block_read_count",
            PerfMetric::BlockReadByte => "block_read_byte",
            PerfMetric::BlockCacheHitCount => "block_cache_hit_count",
            PerfMetric::WriteWalTime => "write_wal_time",
            PerfMetric::WriteMemtableTime => "write_memtable_time",
            PerfMetric::GetFromOutputFilesTime => "get_from_output_files_time",
        }
    }

    fn is_timer(self) -> bool {
        matches!(
            self,
            PerfMetric::WriteWalTime
                | PerfMetric::WriteMemtableTime
                | PerfMetric::GetFromOutputFilesTime
        )
    }
}

thread_local! {
    static COUNTERS: RefCell<[u64; 8]> = const { RefCell::new([0; 8]) };
}

/// Add `amount` to a counter on the current thread, if the level allows it
pub(crate) fn record(metric: PerfMetric, amount: u64) {
    if perf_level() < PerfLevel::EnableCount {
        return;
    }
    COUNTERS.with(|c| c.borrow_mut()[metric as usize] += amount);
}

/// Starts a timer if the perf level records times
pub(crate) struct PerfTimer {
    metric: PerfMetric,
    started: Option<Instant>,
}

impl PerfTimer {
    pub(crate) fn start(metric: PerfMetric) -> Self {
        let started = if perf_level() >= PerfLevel::EnableTimeExceptForMutex {
            Some(Instant::now())
        } else {
            None
        };
        Self { metric, started }
    }
}

impl Drop for PerfTimer {
    fn drop(&mut self) {
        if let Some(started) = self.started {
            let nanos = started.elapsed().as_nanos() as u64;
            COUNTERS.with(|c| c.borrow_mut()[self.metric as usize] += nanos);
        }
    }
}

/// View of the current thread's counters. Not `Send`: the counters belong to
/// the thread that created it.
pub struct PerfContext {
    _thread_bound: PhantomData<*const ()>,
}

impl PerfContext {
    /// Attach to the current thread's counters
    pub fn new() -> Self {
        Self {
            _thread_bound: PhantomData,
        }
    }

    /// Zero every counter
    pub fn reset(&self) {
        COUNTERS.with(|c| *c.borrow_mut() = [0; 8]);
    }

    /// Read one counter
    pub fn metric(&self, metric: PerfMetric) -> u64 {
        COUNTERS.with(|c| c.borrow()[metric as usize])
    }

    /// Render as `name = value` pairs separated by `, `
    pub fn report(&self, exclude_zero: bool) -> String {
        let values = COUNTERS.with(|c| *c.borrow());
        PerfMetric::ALL
            .iter()
            .filter(|m| !(exclude_zero && values[**m as usize] == 0))
            .map(|m| {
                let unit = if m.is_timer() { " ns" } else { "" };
                format!("{} = {}{}", m.name(), values[*m as usize], unit)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for PerfContext {
    fn default() -> Self {
        Self::new()
    }
}
