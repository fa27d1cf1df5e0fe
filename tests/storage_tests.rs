//! Tests for table files and the per-family storage manager
//!
//! These tests verify:
//! - SSTable build / open / lookup, tombstones included
//! - Out-of-order keys are rejected
//! - Checksum verification and damaged files
//! - Range scans and range statistics
//! - Storage manager flush ordering, replace and orphan discovery

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use atlasbind::memtable::MemTableEntry;
use atlasbind::range::KeyBounds;
use atlasbind::storage::sstable::{parse_table_file_name, table_file_name};
use atlasbind::storage::{SSTableBuilder, SSTableReader, StorageManager, TableLookup};
use atlasbind::Cache;
use bytes::Bytes;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

/// Build a table from `(key, Some(value) | None)` pairs in key order
fn build_table(path: &Path, level: u32, entries: &[(&str, Option<&str>)]) {
    let mut builder = SSTableBuilder::new(path, level).unwrap();
    for (key, value) in entries {
        match value {
            Some(v) => builder.add(key.as_bytes(), v.as_bytes()).unwrap(),
            None => builder.add_tombstone(key.as_bytes()).unwrap(),
        }
    }
    builder.finish().unwrap();
}

fn memtable_view(pairs: &[(&str, &str)]) -> Arc<BTreeMap<Vec<u8>, MemTableEntry>> {
    let map = pairs
        .iter()
        .map(|(k, v)| (k.as_bytes().to_vec(), MemTableEntry::Value(Bytes::from(v.as_bytes().to_vec()))))
        .collect();
    Arc::new(map)
}

fn found(value: &str) -> TableLookup {
    TableLookup::Found(Bytes::from(value.as_bytes().to_vec()))
}

// =============================================================================
// File Naming Tests
// =============================================================================

#[test]
fn test_table_file_names() {
    assert_eq!(table_file_name(42), "sstable_000042.sst");
    assert_eq!(parse_table_file_name(Path::new("/x/sstable_000042.sst")), Some(42));
    assert_eq!(parse_table_file_name(Path::new("/x/sstable_000042.tmp")), None);
    assert_eq!(parse_table_file_name(Path::new("/x/other.sst")), None);
}

// =============================================================================
// SSTable Tests
// =============================================================================

#[test]
fn test_build_and_lookup() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(table_file_name(1));
    build_table(&path, 2, &[("apple", Some("red")), ("banana", None), ("cherry", Some("dark"))]);

    let reader = SSTableReader::open(&path, 1, true).unwrap();

    assert_eq!(reader.level(), 2);
    assert_eq!(reader.entry_count(), 3);
    assert_eq!(reader.smallest_key(), b"apple");
    assert_eq!(reader.largest_key(), b"cherry");
    assert_eq!(reader.file_name(), "sstable_000001.sst");
    assert_eq!(reader.file_size(), fs::metadata(&path).unwrap().len());

    assert_eq!(reader.get(b"apple", None, false).unwrap(), found("red"));
    assert_eq!(reader.get(b"banana", None, false).unwrap(), TableLookup::Deleted);
    assert_eq!(reader.get(b"blueberry", None, false).unwrap(), TableLookup::Missing);
    assert!(reader.might_contain(b"blueberry"));
    assert!(!reader.might_contain(b"zucchini"));
}

#[test]
fn test_out_of_order_keys_rejected() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(table_file_name(1));
    let mut builder = SSTableBuilder::new(&path, 0).unwrap();
    builder.add(b"b", b"1").unwrap();

    assert!(builder.add(b"a", b"2").is_err());
    assert!(builder.add(b"b", b"3").is_err());

    builder.abandon().unwrap();
    assert!(!path.exists());
}

#[test]
fn test_checksum_detects_damage() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(table_file_name(1));
    build_table(&path, 0, &[("key", Some("value-value-value"))]);

    let mut bytes = fs::read(&path).unwrap();
    // First value byte: header(16) + entry header(8) + "key"(3)
    bytes[16 + 8 + 3] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    // Structure is intact, so a plain open succeeds
    let reader = SSTableReader::open(&path, 1, false).unwrap();
    let err = reader.verify_checksum().unwrap_err();
    assert!(err.to_string().contains("block checksum mismatch"));
    drop(reader);

    assert!(SSTableReader::open(&path, 1, true).is_err());
}

#[test]
fn test_not_a_table() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(table_file_name(1));
    fs::write(&path, b"short").unwrap();

    let err = SSTableReader::open(&path, 1, false).unwrap_err();

    assert!(err.to_string().starts_with("Corruption: "));
}

#[test]
fn test_scan_and_range_stats() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(table_file_name(1));
    build_table(&path, 0, &[("a", Some("1")), ("b", None), ("c", Some("3")), ("d", Some("4"))]);
    let reader = SSTableReader::open(&path, 1, false).unwrap();

    let scanned = reader.scan(KeyBounds::new(Some(&b"b"[..]), Some(&b"d"[..]))).unwrap();
    assert_eq!(
        scanned,
        vec![(b"b".to_vec(), None), (b"c".to_vec(), Some(Bytes::from_static(b"3")))]
    );

    let all: Vec<_> = reader.iter().unwrap().collect::<Result<Vec<_>, _>>().unwrap();
    assert_eq!(all.len(), 4);

    assert_eq!(reader.keys_in_range(KeyBounds::unbounded()), 4);
    assert_eq!(reader.keys_in_range(KeyBounds::new(Some(&b"b"[..]), Some(&b"d"[..]))), 2);
    // Entry "b" is a tombstone (8 + 1) and "c" a value (8 + 1 + 1)
    assert_eq!(reader.bytes_in_range(KeyBounds::new(Some(&b"b"[..]), Some(&b"d"[..]))), 19);
    assert_eq!(reader.bytes_in_range(KeyBounds::new(Some(&b"x"[..]), None)), 0);
}

#[test]
fn test_lookup_fills_cache() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(table_file_name(7));
    build_table(&path, 0, &[("k", Some("cached"))]);
    let reader = SSTableReader::open(&path, 7, false).unwrap();
    let cache = Cache::new_lru(1024);

    reader.get(b"k", Some(&cache), false).unwrap();
    assert_eq!(cache.usage(), 0);

    reader.get(b"k", Some(&cache), true).unwrap();
    assert_eq!(cache.lookup(7, b"k"), Some(Bytes::from_static(b"cached")));
    assert_eq!(reader.get(b"k", Some(&cache), true).unwrap(), found("cached"));
}

#[test]
fn test_obsolete_table_deleted_on_drop() {
    let temp = TempDir::new().unwrap();
    let kept = temp.path().join(table_file_name(1));
    let doomed = temp.path().join(table_file_name(2));
    build_table(&kept, 0, &[("a", Some("1"))]);
    build_table(&doomed, 0, &[("a", Some("1"))]);

    drop(SSTableReader::open(&kept, 1, false).unwrap());
    let reader = Arc::new(SSTableReader::open(&doomed, 2, false).unwrap());
    let other_ref = Arc::clone(&reader);
    reader.mark_obsolete();
    drop(reader);
    assert!(doomed.exists());
    drop(other_ref);

    assert!(kept.exists());
    assert!(!doomed.exists());
}

// =============================================================================
// Storage Manager Tests
// =============================================================================

#[test]
fn test_flush_installs_newest_first() {
    let temp = TempDir::new().unwrap();
    let storage = StorageManager::open(&temp.path().join("cf_0"), None, false).unwrap();

    assert!(storage.flush(&memtable_view(&[]), 1).unwrap().is_none());
    let first = storage.flush(&memtable_view(&[("a", "1"), ("b", "1")]), 3).unwrap().unwrap();
    storage.flush(&memtable_view(&[("a", "2")]), 8).unwrap();

    assert_eq!(first.entry_count, 2);
    assert_eq!(first.min_key, b"a".to_vec());
    assert_eq!(storage.file_ids(), vec![8, 3]);
    assert_eq!(storage.max_file_id(), 8);
    assert_eq!(storage.files_at_level(0), 2);
    assert_eq!(storage.get(b"a", None, false).unwrap(), Some(Bytes::from_static(b"2")));
    assert_eq!(storage.get(b"b", None, false).unwrap(), Some(Bytes::from_static(b"1")));
}

#[test]
fn test_open_with_live_list_and_orphans() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("cf_0");
    {
        let storage = StorageManager::open(&dir, None, false).unwrap();
        storage.flush(&memtable_view(&[("a", "1")]), 1).unwrap();
        storage.flush(&memtable_view(&[("b", "2")]), 2).unwrap();
    }

    let storage = StorageManager::open(&dir, Some(&[2][..]), true).unwrap();

    assert_eq!(storage.file_ids(), vec![2]);
    assert_eq!(storage.orphans().unwrap(), vec![dir.join(table_file_name(1))]);
    let mut on_disk = StorageManager::discover(&dir).unwrap();
    on_disk.sort_unstable();
    assert_eq!(on_disk, vec![1, 2]);

    assert!(StorageManager::open(&dir, Some(&[2, 5][..]), false).is_err());
}

#[test]
fn test_replace_and_clear() {
    let temp = TempDir::new().unwrap();
    let storage = StorageManager::open(&temp.path().join("cf_0"), None, false).unwrap();
    storage.flush(&memtable_view(&[("a", "1")]), 1).unwrap();
    storage.flush(&memtable_view(&[("b", "2")]), 2).unwrap();

    let merged_path = storage.table_path(3);
    build_table(&merged_path, 1, &[("a", Some("1")), ("b", Some("2"))]);
    let merged = Arc::new(SSTableReader::open(&merged_path, 3, false).unwrap());

    let removed = storage.replace(&[1, 2], vec![merged]);

    let mut removed_ids: Vec<u64> = removed.iter().map(|t| t.file_id()).collect();
    removed_ids.sort_unstable();
    assert_eq!(removed_ids, vec![1, 2]);
    assert_eq!(storage.file_ids(), vec![3]);
    assert_eq!(storage.files_at_level(1), 1);
    assert_eq!(storage.sstable_count(), 1);
    assert_eq!(storage.total_size(), fs::metadata(&merged_path).unwrap().len());

    let cleared = storage.clear();
    assert_eq!(cleared.len(), 1);
    assert_eq!(storage.sstable_count(), 0);
    assert_eq!(storage.get(b"a", None, false).unwrap(), None);
}
