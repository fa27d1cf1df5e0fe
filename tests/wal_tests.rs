//! Tests for the write-ahead log
//!
//! These tests verify:
//! - Entries round trip through writer and reader in LSN order
//! - LSNs continue across reopen
//! - Truncation after a flush
//! - Recovery of torn tails and corrupt entries
//! - Replay never modifies the file

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use atlasbind::wal::{Operation, ReadOutcome, WalEntry, WalReader, WalRecovery, WalWriter, HEADER_SIZE};
use atlasbind::WalSyncStrategy;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("wal.log");
    (temp_dir, path)
}

fn put(cf: u32, key: &str, value: &str) -> Operation {
    Operation::Put {
        cf,
        key: key.as_bytes().to_vec(),
        value: value.as_bytes().to_vec(),
    }
}

fn write_entries(path: &Path, count: usize) {
    let mut writer = WalWriter::open(path, WalSyncStrategy::EveryWrite, 1).unwrap();
    for i in 0..count {
        writer.append(vec![put(0, &format!("key{}", i), "v")], false).unwrap();
    }
}

/// Length in bytes of the entry starting at `offset`
fn entry_len(bytes: &[u8], offset: usize) -> usize {
    let mut len = [0u8; 4];
    len.copy_from_slice(&bytes[offset + 12..offset + 16]);
    HEADER_SIZE + u32::from_le_bytes(len) as usize
}

// =============================================================================
// Entry Tests
// =============================================================================

#[test]
fn test_entry_encoding_layout() {
    let entry = WalEntry::new(7, vec![put(1, "k", "v"), Operation::Delete { cf: 2, key: b"d".to_vec() }]);

    let bytes = entry.serialize().unwrap();

    assert_eq!(bytes.len(), entry.serialized_size().unwrap());
    assert_eq!(&bytes[0..8], &7u64.to_le_bytes());
    assert_eq!(&bytes[8..12], &entry.compute_crc().unwrap().to_le_bytes());
    assert_eq!(WalEntry::deserialize(&bytes).unwrap(), entry);
    assert_eq!(entry.operations[1].column_family(), 2);
}

#[test]
fn test_entry_checksum_mismatch() {
    let mut bytes = WalEntry::new(1, vec![put(0, "k", "v")]).serialize().unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0x01;

    let err = WalEntry::deserialize(&bytes).unwrap_err();

    assert!(err.to_string().contains("checksum mismatch"));
}

// =============================================================================
// Writer / Reader Tests
// =============================================================================

#[test]
fn test_append_and_read_back() {
    let (_temp, path) = setup_wal();
    let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryNEntries { count: 2 }, 1).unwrap();

    assert_eq!(writer.append(vec![put(0, "a", "1")], false).unwrap(), 1);
    assert_eq!(writer.append(vec![put(0, "b", "2"), put(3, "c", "3")], false).unwrap(), 2);

    let mut reader = WalReader::open(&path).unwrap();
    let mut entries: Vec<WalEntry> = Vec::new();
    while let ReadOutcome::Entry(entry) = reader.read_next().unwrap() {
        entries.push(entry);
    }

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].lsn, 1);
    assert_eq!(entries[1].operations, vec![put(0, "b", "2"), put(3, "c", "3")]);
}

#[test]
fn test_reopen_continues_lsn() {
    let (_temp, path) = setup_wal();
    write_entries(&path, 3);

    let (_, result) = WalRecovery::replay(&path, false).unwrap();
    let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite, result.last_lsn + 1).unwrap();
    let lsn = writer.append(vec![put(0, "later", "v")], true).unwrap();

    assert_eq!(lsn, 4);
    let (entries, _) = WalRecovery::replay(&path, false).unwrap();
    let lsns: Vec<u64> = entries.iter().map(|e| e.lsn).collect();
    assert_eq!(lsns, vec![1, 2, 3, 4]);
}

#[test]
fn test_truncate_empties_log() {
    let (_temp, path) = setup_wal();
    let mut writer = WalWriter::open(&path, WalSyncStrategy::EveryWrite, 1).unwrap();
    writer.append(vec![put(0, "a", "1")], false).unwrap();

    writer.truncate().unwrap();
    assert_eq!(fs::metadata(&path).unwrap().len(), 0);

    // Sequence keeps going after a truncate
    assert_eq!(writer.append(vec![put(0, "b", "2")], false).unwrap(), 2);
    let (entries, _) = WalRecovery::replay(&path, false).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].lsn, 2);
}

// =============================================================================
// Recovery Tests
// =============================================================================

#[test]
fn test_recover_truncates_torn_tail() {
    let (_temp, path) = setup_wal();
    write_entries(&path, 3);
    let full_len = fs::metadata(&path).unwrap().len();
    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(full_len - 3).unwrap();
    drop(file);

    let (entries, result) = WalRecovery::recover(&path, true).unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(result.entries_recovered, 2);
    assert_eq!(result.last_lsn, 2);
    assert!(result.was_truncated);
    let bytes = fs::read(&path).unwrap();
    assert_eq!(bytes.len(), entry_len(&bytes, 0) * 2);
}

#[test]
fn test_replay_leaves_torn_tail() {
    let (_temp, path) = setup_wal();
    write_entries(&path, 2);
    let full_len = fs::metadata(&path).unwrap().len();
    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(full_len - 1).unwrap();
    drop(file);

    let (entries, result) = WalRecovery::replay(&path, false).unwrap();

    assert_eq!(entries.len(), 1);
    assert!(result.was_truncated);
    assert_eq!(fs::metadata(&path).unwrap().len(), full_len - 1);
}

#[test]
fn test_corrupt_entry_skipped_unless_paranoid() {
    let (_temp, path) = setup_wal();
    write_entries(&path, 3);
    let mut bytes = fs::read(&path).unwrap();
    let second = entry_len(&bytes, 0);
    bytes[second + HEADER_SIZE] ^= 0xFF;
    fs::write(&path, &bytes).unwrap();

    let result = WalRecovery::verify(&path).unwrap();
    assert_eq!(result.entries_recovered, 2);
    assert_eq!(result.entries_corrupted, 1);
    assert!(!result.was_truncated);

    let (entries, _) = WalRecovery::recover(&path, false).unwrap();
    let lsns: Vec<u64> = entries.iter().map(|e| e.lsn).collect();
    assert_eq!(lsns, vec![1, 3]);

    assert!(WalRecovery::recover(&path, true).is_err());
}

#[test]
fn test_reader_classifies_outcomes() {
    let (_temp, path) = setup_wal();
    write_entries(&path, 1);
    let full_len = fs::metadata(&path).unwrap().len();

    let mut reader = WalReader::open(&path).unwrap();
    assert!(matches!(reader.read_next().unwrap(), ReadOutcome::Entry(e) if e.lsn == 1));
    assert_eq!(reader.position(), full_len);
    assert!(matches!(reader.read_next().unwrap(), ReadOutcome::End));

    let file = OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(HEADER_SIZE as u64 - 1).unwrap();
    drop(file);
    let mut reader = WalReader::open(&path).unwrap();
    assert!(matches!(reader.read_next().unwrap(), ReadOutcome::TornTail));
}
