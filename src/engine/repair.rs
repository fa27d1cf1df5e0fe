//! Repair
//!
//! Rebuilds the MANIFEST from what is actually on disk.
//!
//! ## Steps
//! 1. Walk `sstables/cf_<id>/` and open every table with checksum checks
//! 2. Move tables that fail into `lost/`
//! 3. Name each family from the old MANIFEST when it is still readable
//! 4. Truncate a torn WAL tail
//! 5. Write a fresh MANIFEST

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::error::{StoreError, StoreResult};
use crate::native::{ColumnFamilyId, DEFAULT_COLUMN_FAMILY_ID, DEFAULT_COLUMN_FAMILY_NAME};
use crate::storage::sstable::table_file_name;
use crate::storage::{SSTableReader, StorageManager};
use crate::wal::WalRecovery;

use super::core::{lock_db_dir, SSTABLE_DIR, WAL_FILENAME};
use super::manifest::{ColumnFamilyRecord, Manifest};

const LOST_DIR: &str = "lost";
const CF_DIR_PREFIX: &str = "cf_";

/// What a repair run found
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RepairReport {
    pub column_families: usize,
    pub tables_kept: usize,
    pub tables_quarantined: usize,
    pub wal_entries_recovered: u64,
    pub wal_truncated: bool,
}

pub(crate) fn repair(path: &Path) -> StoreResult<RepairReport> {
    let sstables = path.join(SSTABLE_DIR);
    if !sstables.is_dir() {
        return Err(StoreError::InvalidArgument(format!(
            "{}: does not exist (create_if_missing is false)",
            path.display()
        )));
    }
    let _lock = lock_db_dir(path)?;

    // Names survive only if the old catalogue is still readable
    let previous = match Manifest::load(path) {
        Ok(manifest) => Some(manifest),
        Err(e) => {
            tracing::warn!(error = %e, "MANIFEST unreadable, naming families by id");
            None
        }
    };

    let mut report = RepairReport::default();
    let mut families: BTreeMap<ColumnFamilyId, Vec<u64>> = BTreeMap::new();
    let mut max_file_id = 0;

    for entry in fs::read_dir(&sstables)? {
        let dir = entry?.path();
        let id = dir
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(CF_DIR_PREFIX))
            .and_then(|n| n.parse::<ColumnFamilyId>().ok());
        let Some(id) = id.filter(|_| dir.is_dir()) else {
            continue;
        };

        let mut live = Vec::new();
        for file_id in StorageManager::discover(&dir)? {
            let table_path = dir.join(table_file_name(file_id));
            match SSTableReader::open(&table_path, file_id, true) {
                Ok(_) => {
                    live.push(file_id);
                    max_file_id = max_file_id.max(file_id);
                    report.tables_kept += 1;
                }
                Err(e) => {
                    tracing::warn!(file = %table_path.display(), error = %e, "quarantining table");
                    let lost = path.join(LOST_DIR);
                    fs::create_dir_all(&lost)?;
                    let target = lost.join(format!(
                        "{}{}_{}",
                        CF_DIR_PREFIX,
                        id,
                        table_file_name(file_id)
                    ));
                    fs::rename(&table_path, target)?;
                    report.tables_quarantined += 1;
                }
            }
        }
        live.sort_unstable();
        families.insert(id, live);
    }
    families.entry(DEFAULT_COLUMN_FAMILY_ID).or_default();

    let name_of = |id: ColumnFamilyId| -> String {
        if id == DEFAULT_COLUMN_FAMILY_ID {
            return DEFAULT_COLUMN_FAMILY_NAME.to_string();
        }
        previous
            .as_ref()
            .and_then(|m| m.column_families.iter().find(|cf| cf.id == id))
            .map(|cf| cf.name.clone())
            .unwrap_or_else(|| format!("{}{}", CF_DIR_PREFIX, id))
    };

    let next_column_family_id = families.keys().max().map_or(1, |id| id + 1);
    let manifest = Manifest {
        next_file_id: (max_file_id + 1).max(previous.as_ref().map_or(1, |m| m.next_file_id)),
        next_column_family_id: next_column_family_id
            .max(previous.as_ref().map_or(1, |m| m.next_column_family_id)),
        column_families: families
            .into_iter()
            .map(|(id, files)| ColumnFamilyRecord {
                id,
                name: name_of(id),
                files,
            })
            .collect(),
    };
    report.column_families = manifest.column_families.len();

    let wal_path = path.join(WAL_FILENAME);
    if wal_path.exists() {
        let (_, result) = WalRecovery::recover(&wal_path, false)?;
        report.wal_entries_recovered = result.entries_recovered;
        report.wal_truncated = result.was_truncated;
    }

    manifest.store(path)?;

    tracing::info!(
        path = %path.display(),
        column_families = report.column_families,
        kept = report.tables_kept,
        quarantined = report.tables_quarantined,
        "repair finished"
    );
    Ok(report)
}
