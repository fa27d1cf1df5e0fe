//! Property Queries
//!
//! Named, string-valued introspection answered by the engine.
//!
//! | Property                              | Value                               |
//! |---------------------------------------|-------------------------------------|
//! | `atlas.num-files-at-level<N>`         | table count on level N              |
//! | `atlas.estimate-num-keys`             | memtable + table entries (approx.)  |
//! | `atlas.num-entries-active-mem-table`  | memtable entries, tombstones too    |
//! | `atlas.cur-size-active-mem-table`     | memtable bytes                      |
//! | `atlas.total-sst-files-size`          | bytes of all tables                 |
//! | `atlas.is-file-deletions-enabled`     | `1` or `0`                          |
//! | `atlas.stats`                         | multi-line summary                  |

use std::fmt::Write;

use crate::storage::NUM_LEVELS;

use super::column_family::ColumnFamily;

const NUM_FILES_AT_LEVEL_PREFIX: &str = "atlas.num-files-at-level";

/// Answer `name` for one column family; `None` if the property is unknown
pub(crate) fn property_value(cf: &ColumnFamily, file_deletions_enabled: bool, name: &str) -> Option<String> {
    if let Some(level) = name.strip_prefix(NUM_FILES_AT_LEVEL_PREFIX) {
        let level: u32 = level.parse().ok()?;
        if level >= NUM_LEVELS {
            return None;
        }
        return Some(cf.storage.files_at_level(level).to_string());
    }

    match name {
        "atlas.estimate-num-keys" => {
            let in_tables: u64 = cf.storage.tables().iter().map(|t| t.entry_count()).sum();
            Some((cf.memtable.entry_count() as u64 + in_tables).to_string())
        }
        "atlas.num-entries-active-mem-table" => Some(cf.memtable.entry_count().to_string()),
        "atlas.cur-size-active-mem-table" => Some(cf.memtable.size().to_string()),
        "atlas.total-sst-files-size" => Some(cf.storage.total_size().to_string()),
        "atlas.is-file-deletions-enabled" => Some(if file_deletions_enabled { "1" } else { "0" }.to_string()),
        "atlas.stats" => Some(stats(cf, file_deletions_enabled)),
        _ => None,
    }
}

fn stats(cf: &ColumnFamily, file_deletions_enabled: bool) -> String {
    let tables = cf.storage.tables();
    let mut out = String::new();

    // Writing to a String cannot fail
    let _ = writeln!(out, "** Column family: {} **", cf.name());
    let _ = writeln!(out, "Level  Files  Size(B)  Entries");
    for level in 0..NUM_LEVELS {
        let on_level = tables.iter().filter(|t| t.level() == level);
        let (files, size, entries) = on_level.fold((0usize, 0u64, 0u64), |(f, s, e), t| {
            (f + 1, s + t.file_size(), e + t.entry_count())
        });
        if files > 0 {
            let _ = writeln!(out, "L{:<5} {:<6} {:<8} {}", level, files, size, entries);
        }
    }
    let _ = writeln!(
        out,
        "Memtable: {} entries, {} bytes",
        cf.memtable.entry_count(),
        cf.memtable.size()
    );
    let _ = writeln!(
        out,
        "File deletions: {}",
        if file_deletions_enabled { "enabled" } else { "disabled" }
    );
    out
}
