//! Tests for Db
//!
//! These tests verify:
//! - End-to-end put/get/delete through the guarded handle
//! - Close idempotence and closed-handle errors
//! - Concurrent operations racing a single close
//! - Batch reads and writes
//! - Iterators and snapshots
//! - Merge operators
//! - Persistence across reopen (flush and WAL replay)
//! - Approximate sizes, key counts and properties
//! - Shutdown and read-only mode

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use atlasbind::{
    Db, Error, FlushOptions, MergeOperator, Options, Range, ReadOptions, WalSyncStrategy, WriteBatch, WriteOptions,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn test_options() -> Options {
    Options::builder()
        .create_if_missing(true)
        .wal_sync_strategy(WalSyncStrategy::EveryWrite)
        .write_buffer_size(1024 * 1024) // 1 MB
        .build()
}

/// Engine logs go to the test output; filter with RUST_LOG
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn setup_temp_db() -> (TempDir, Db) {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let db = Db::open(&test_options(), temp_dir.path().join("testdb")).unwrap();
    (temp_dir, db)
}

fn reopen(path: &Path) -> Db {
    Db::open(&test_options(), path).unwrap()
}

fn engine_message(result: Result<impl std::fmt::Debug, Error>) -> String {
    match result {
        Err(Error::Engine(msg)) => msg,
        other => panic!("expected an engine error, got {:?}", other),
    }
}

fn ro() -> ReadOptions {
    ReadOptions::default()
}

fn wo() -> WriteOptions {
    WriteOptions::default()
}

struct ConcatOperator;

impl MergeOperator for ConcatOperator {
    fn full_merge(&self, _key: &[u8], existing: Option<&[u8]>, operands: &[&[u8]]) -> Option<Vec<u8>> {
        let mut out = existing.map(|e| e.to_vec()).unwrap_or_default();
        for op in operands {
            if !out.is_empty() {
                out.push(b',');
            }
            out.extend_from_slice(op);
        }
        Some(out)
    }

    fn name(&self) -> &str {
        "concat"
    }
}

struct FailingOperator;

impl MergeOperator for FailingOperator {
    fn full_merge(&self, _key: &[u8], _existing: Option<&[u8]>, _operands: &[&[u8]]) -> Option<Vec<u8>> {
        None
    }

    fn name(&self) -> &str {
        "failing"
    }
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_end_to_end_testdb() {
    let (_temp, db) = setup_temp_db();
    assert!(db.name().ends_with("testdb"));

    db.put(&wo(), b"a", b"1").unwrap();
    assert_eq!(db.get(&ro(), b"a").unwrap(), Some(b"1".to_vec()));

    db.delete(&wo(), b"a").unwrap();
    assert_eq!(db.get(&ro(), b"a").unwrap(), None);

    db.close().unwrap();
}

#[test]
fn test_open_creates_layout() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("mydb");

    let _db = Db::open(&test_options(), &path).unwrap();

    assert!(path.join("sstables").exists());
    assert!(path.join("wal.log").exists());
    assert!(path.join("MANIFEST").exists());
    assert!(path.join("LOCK").exists());
}

#[test]
fn test_open_missing_without_create() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("absent");

    let msg = engine_message(Db::open(&Options::default(), &path));

    assert!(msg.starts_with("Invalid argument: "));
    assert!(msg.ends_with("does not exist (create_if_missing is false)"));
}

#[test]
fn test_open_error_if_exists() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("db");
    Db::open(&test_options(), &path).unwrap().close().unwrap();

    let options = Options::builder().create_if_missing(true).error_if_exists(true).build();
    let msg = engine_message(Db::open(&options, &path));

    assert!(msg.ends_with("exists (error_if_exists is true)"));
}

#[test]
fn test_second_writable_open_is_locked_out() {
    let (temp, db) = setup_temp_db();

    let second = Db::open(&test_options(), temp.path().join("testdb"));
    assert!(engine_message(second).starts_with("IO error: "));

    db.close().unwrap();
    // Lock released on close
    reopen(&temp.path().join("testdb")).close().unwrap();
}

#[test]
fn test_overwrite_and_empty_value() {
    let (_temp, db) = setup_temp_db();

    db.put(&wo(), b"k", b"v1").unwrap();
    db.put(&wo(), b"k", b"v2").unwrap();
    db.put(&wo(), b"empty", b"").unwrap();

    assert_eq!(db.get(&ro(), b"k").unwrap(), Some(b"v2".to_vec()));
    assert_eq!(db.get(&ro(), b"empty").unwrap(), Some(Vec::new()));
    assert_eq!(db.get(&ro(), b"missing").unwrap(), None);
}

// =============================================================================
// Close Tests
// =============================================================================

#[test]
fn test_close_twice_is_noop() {
    let (_temp, db) = setup_temp_db();

    db.close().unwrap();
    db.close().unwrap();

    assert!(!db.is_open());
}

#[test]
fn test_operations_after_close_return_closed() {
    let (_temp, db) = setup_temp_db();
    db.put(&wo(), b"a", b"1").unwrap();
    db.close().unwrap();

    assert_eq!(db.get(&ro(), b"a"), Err(Error::Closed));
    assert_eq!(db.put(&wo(), b"a", b"2"), Err(Error::Closed));
    assert_eq!(db.delete(&wo(), b"a"), Err(Error::Closed));
    assert_eq!(db.write(&wo(), &WriteBatch::new()), Err(Error::Closed));
    assert_eq!(db.flush(&FlushOptions::default()), Err(Error::Closed));
    assert_eq!(db.compact_range(&Range::full()), Err(Error::Closed));
    assert_eq!(db.property("atlas.stats"), Err(Error::Closed));
    assert_eq!(db.live_files_metadata(), Err(Error::Closed));
    assert_eq!(db.shutdown(), Err(Error::Closed));
    assert!(matches!(db.iterator(&ro()), Err(Error::Closed)));
    assert!(matches!(db.snapshot(), Err(Error::Closed)));
}

#[test]
fn test_concurrent_operations_with_single_close() {
    let (_temp, db) = setup_temp_db();
    let db = Arc::new(db);
    let mut handles = vec![];

    for t in 0..4 {
        let db = Arc::clone(&db);
        handles.push(thread::spawn(move || {
            let mut closed_seen = false;
            for i in 0..200 {
                let key = format!("t{}_k{}", t, i);
                let results = [
                    db.put(&wo(), key.as_bytes(), b"v").map(|_| ()),
                    db.get(&ro(), key.as_bytes()).map(|_| ()),
                    db.iterator(&ro()).map(|_| ()),
                ];
                for result in results {
                    match result {
                        Ok(()) => assert!(!closed_seen || db.is_open()),
                        Err(Error::Closed) => closed_seen = true,
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                }
            }
        }));
    }

    thread::sleep(Duration::from_millis(5));
    db.close().unwrap();

    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(db.get(&ro(), b"t0_k0"), Err(Error::Closed));
}

#[test]
fn test_drop_closes_and_releases_lock() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("db");
    {
        let db = Db::open(&test_options(), &path).unwrap();
        db.put(&wo(), b"a", b"1").unwrap();
    }

    let db = reopen(&path);
    assert_eq!(db.get(&ro(), b"a").unwrap(), Some(b"1".to_vec()));
}

// =============================================================================
// Batch Tests
// =============================================================================

#[test]
fn test_multi_get() {
    let (_temp, db) = setup_temp_db();
    db.put(&wo(), b"a", b"1").unwrap();
    db.put(&wo(), b"b", b"2").unwrap();

    let results = db.multi_get(&ro(), &[&b"a"[..], &b"missing"[..], &b"b"[..]]);

    let expected: Vec<Result<Option<Vec<u8>>, Error>> =
        vec![Ok(Some(b"1".to_vec())), Ok(None), Ok(Some(b"2".to_vec()))];
    assert_eq!(results, expected);
}

#[test]
fn test_multi_get_empty() {
    let (_temp, db) = setup_temp_db();

    assert!(db.multi_get(&ro(), &[]).is_empty());

    db.close().unwrap();
    assert!(db.multi_get(&ro(), &[]).is_empty());
}

#[test]
fn test_multi_get_after_close_fails_every_key() {
    let (_temp, db) = setup_temp_db();
    db.close().unwrap();

    let results = db.multi_get(&ro(), &[&b"a"[..], &b"b"[..], &b"c"[..]]);

    let expected: Vec<Result<Option<Vec<u8>>, Error>> = vec![Err(Error::Closed); 3];
    assert_eq!(results, expected);
}

#[test]
fn test_write_batch() {
    let (_temp, db) = setup_temp_db();
    db.put(&wo(), b"old", b"x").unwrap();

    let mut batch = WriteBatch::new();
    batch.put(b"a", b"1");
    batch.put(b"b", b"2");
    batch.delete(b"old");
    batch.put(b"a", b"3");
    assert_eq!(batch.len(), 4);

    db.write(&wo(), &batch).unwrap();

    assert_eq!(db.get(&ro(), b"a").unwrap(), Some(b"3".to_vec()));
    assert_eq!(db.get(&ro(), b"b").unwrap(), Some(b"2".to_vec()));
    assert_eq!(db.get(&ro(), b"old").unwrap(), None);
}

#[test]
fn test_write_batch_is_atomic_on_error() {
    let (_temp, db) = setup_temp_db();

    // No merge operator configured: the whole batch is rejected
    let mut batch = WriteBatch::new();
    batch.put(b"a", b"1");
    batch.merge(b"b", b"x");

    assert!(db.write(&wo(), &batch).is_err());
    assert_eq!(db.get(&ro(), b"a").unwrap(), None);
}

// =============================================================================
// Iterator / Snapshot Tests
// =============================================================================

#[test]
fn test_iterator_forward_and_backward() {
    let (_temp, db) = setup_temp_db();
    for key in ["c", "a", "e", "b", "d"] {
        db.put(&wo(), key.as_bytes(), key.to_uppercase().as_bytes()).unwrap();
    }
    db.delete(&wo(), b"d").unwrap();

    let mut iter = db.iterator(&ro()).unwrap();
    assert!(!iter.valid());

    iter.seek_to_first();
    let forward: Vec<Vec<u8>> = iter.collect_remaining().into_iter().map(|(k, _)| k).collect();
    assert_eq!(forward, vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec(), b"e".to_vec()]);

    iter.seek_to_last();
    assert_eq!(iter.key(), Some(&b"e"[..]));
    assert_eq!(iter.value(), Some(&b"E"[..]));
    iter.prev();
    assert_eq!(iter.key(), Some(&b"c"[..]));

    iter.seek(b"bb");
    assert_eq!(iter.key(), Some(&b"c"[..]));
    iter.seek_for_prev(b"d");
    assert_eq!(iter.key(), Some(&b"c"[..]));
    iter.seek(b"z");
    assert!(!iter.valid());
    assert!(iter.status().is_ok());
}

#[test]
fn test_iterator_bounds_span_memtable_and_tables() {
    let (_temp, db) = setup_temp_db();
    db.put(&wo(), b"k1", b"old").unwrap();
    db.put(&wo(), b"k2", b"v2").unwrap();
    db.flush(&FlushOptions::default()).unwrap();
    db.put(&wo(), b"k1", b"new").unwrap();
    db.put(&wo(), b"k3", b"v3").unwrap();
    db.put(&wo(), b"k4", b"v4").unwrap();

    let mut options = ro();
    options.set_iterate_lower_bound(b"k1".to_vec());
    options.set_iterate_upper_bound(b"k4".to_vec());
    let mut iter = db.iterator(&options).unwrap();
    iter.seek_to_first();

    assert_eq!(
        iter.collect_remaining(),
        vec![
            (b"k1".to_vec(), b"new".to_vec()),
            (b"k2".to_vec(), b"v2".to_vec()),
            (b"k3".to_vec(), b"v3".to_vec()),
        ]
    );
}

#[test]
fn test_iterator_outlives_close() {
    let (_temp, db) = setup_temp_db();
    db.put(&wo(), b"a", b"1").unwrap();
    let mut iter = db.iterator(&ro()).unwrap();

    db.close().unwrap();

    iter.seek_to_first();
    assert_eq!(iter.key(), Some(&b"a"[..]));
}

#[test]
fn test_snapshot_isolation() {
    let (_temp, db) = setup_temp_db();
    db.put(&wo(), b"a", b"1").unwrap();
    db.put(&wo(), b"b", b"1").unwrap();

    let snapshot = db.snapshot().unwrap();
    db.put(&wo(), b"a", b"2").unwrap();
    db.delete(&wo(), b"b").unwrap();
    db.put(&wo(), b"c", b"new").unwrap();

    let mut at_snapshot = ro();
    at_snapshot.set_snapshot(&snapshot);

    assert_eq!(db.get(&at_snapshot, b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(db.get(&at_snapshot, b"b").unwrap(), Some(b"1".to_vec()));
    assert_eq!(db.get(&at_snapshot, b"c").unwrap(), None);
    assert_eq!(db.get(&ro(), b"a").unwrap(), Some(b"2".to_vec()));

    let mut iter = db.iterator(&at_snapshot).unwrap();
    iter.seek_to_first();
    assert_eq!(iter.collect_remaining().len(), 2);
}

#[test]
fn test_snapshot_survives_flush_and_compaction() {
    let (_temp, db) = setup_temp_db();
    db.put(&wo(), b"a", b"1").unwrap();
    db.flush(&FlushOptions::default()).unwrap();

    let snapshot = db.snapshot().unwrap();
    db.put(&wo(), b"a", b"2").unwrap();
    db.compact_range(&Range::full()).unwrap();

    let mut at_snapshot = ro();
    at_snapshot.set_snapshot(&snapshot);
    assert_eq!(db.get(&at_snapshot, b"a").unwrap(), Some(b"1".to_vec()));
    assert_eq!(db.get(&ro(), b"a").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn test_released_snapshot_is_rejected() {
    let (_temp, db) = setup_temp_db();
    let snapshot = db.snapshot().unwrap();
    let mut options = ro();
    options.set_snapshot(&snapshot);
    drop(snapshot);

    let msg = engine_message(db.get(&options, b"a"));
    assert!(msg.starts_with("Invalid argument: "));
}

#[test]
fn test_snapshot_dropped_after_close() {
    let (_temp, db) = setup_temp_db();
    let snapshot = db.snapshot().unwrap();

    db.close().unwrap();
    drop(snapshot);
}

// =============================================================================
// Merge Tests
// =============================================================================

#[test]
fn test_merge_with_operator() {
    let temp = TempDir::new().unwrap();
    let options = Options::builder()
        .create_if_missing(true)
        .merge_operator(ConcatOperator)
        .build();
    let db = Db::open(&options, temp.path().join("db")).unwrap();

    db.merge(&wo(), b"list", b"a").unwrap();
    db.merge(&wo(), b"list", b"b").unwrap();
    db.flush(&FlushOptions::default()).unwrap();
    db.merge(&wo(), b"list", b"c").unwrap();

    assert_eq!(db.get(&ro(), b"list").unwrap(), Some(b"a,b,c".to_vec()));
}

#[test]
fn test_merge_within_batch_sees_earlier_ops() {
    let temp = TempDir::new().unwrap();
    let options = Options::builder()
        .create_if_missing(true)
        .merge_operator(ConcatOperator)
        .build();
    let db = Db::open(&options, temp.path().join("db")).unwrap();

    let mut batch = WriteBatch::new();
    batch.put(b"k", b"x");
    batch.merge(b"k", b"y");
    batch.delete(b"k");
    batch.merge(b"k", b"z");
    db.write(&wo(), &batch).unwrap();

    assert_eq!(db.get(&ro(), b"k").unwrap(), Some(b"z".to_vec()));
}

#[test]
fn test_merge_without_operator() {
    let (_temp, db) = setup_temp_db();

    let msg = engine_message(db.merge(&wo(), b"k", b"v"));

    assert_eq!(msg, "Invalid argument: merge_operator is not properly initialized.");
}

#[test]
fn test_merge_operator_failure() {
    let temp = TempDir::new().unwrap();
    let options = Options::builder()
        .create_if_missing(true)
        .merge_operator(FailingOperator)
        .build();
    let db = Db::open(&options, temp.path().join("db")).unwrap();

    let msg = engine_message(db.merge(&wo(), b"k", b"v"));

    assert_eq!(msg, "Corruption: Error: Could not perform merge.");
}

// =============================================================================
// Persistence Tests
// =============================================================================

#[test]
fn test_reopen_after_flush() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("db");
    {
        let db = reopen(&path);
        for i in 0..50 {
            db.put(&wo(), format!("key{:02}", i).as_bytes(), format!("v{}", i).as_bytes()).unwrap();
        }
        db.flush(&FlushOptions::default()).unwrap();
        db.close().unwrap();
    }

    let db = reopen(&path);
    for i in 0..50 {
        assert_eq!(
            db.get(&ro(), format!("key{:02}", i).as_bytes()).unwrap(),
            Some(format!("v{}", i).into_bytes())
        );
    }
}

#[test]
fn test_reopen_replays_wal() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("db");
    {
        let db = reopen(&path);
        db.put(&wo(), b"a", b"1").unwrap();
        db.put(&wo(), b"b", b"2").unwrap();
        db.delete(&wo(), b"a").unwrap();
        db.close().unwrap();
    }

    let db = reopen(&path);
    assert_eq!(db.get(&ro(), b"a").unwrap(), None);
    assert_eq!(db.get(&ro(), b"b").unwrap(), Some(b"2".to_vec()));
    // Replayed writes are flushed at open
    assert_eq!(db.property("atlas.num-files-at-level0").unwrap(), Some("1".to_string()));
}

#[test]
fn test_disable_wal_loses_nothing_after_flush() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("db");
    {
        let db = reopen(&path);
        let mut options = wo();
        options.disable_wal(true);
        db.put(&options, b"a", b"1").unwrap();
        db.flush(&FlushOptions::default()).unwrap();
    }

    let db = reopen(&path);
    assert_eq!(db.get(&ro(), b"a").unwrap(), Some(b"1".to_vec()));
}

#[test]
fn test_memtable_full_triggers_background_flush() {
    let temp = TempDir::new().unwrap();
    let options = Options::builder()
        .create_if_missing(true)
        .write_buffer_size(256)
        .disable_auto_compactions(true)
        .build();
    let db = Db::open(&options, temp.path().join("db")).unwrap();

    for i in 0..20 {
        db.put(&wo(), format!("key{:02}", i).as_bytes(), &[b'x'; 32]).unwrap();
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let files = db.property("atlas.num-files-at-level0").unwrap().unwrap();
        if files != "0" {
            break;
        }
        assert!(Instant::now() < deadline, "no background flush happened");
        thread::sleep(Duration::from_millis(10));
    }

    for i in 0..20 {
        assert!(db.get(&ro(), format!("key{:02}", i).as_bytes()).unwrap().is_some());
    }
}

#[test]
fn test_background_flush_recovers_after_failure() {
    init_tracing();
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("db");
    let options = Options::builder()
        .create_if_missing(true)
        .write_buffer_size(1024)
        .disable_auto_compactions(true)
        .build();
    let db = Db::open(&options, &path).unwrap();

    // Without its table directory the first flush cannot create a file
    let table_dir = path.join("sstables").join("cf_0");
    std::fs::remove_dir_all(&table_dir).unwrap();
    db.put(&wo(), b"big", &[b'x'; 2048]).unwrap();
    thread::sleep(Duration::from_millis(200));
    std::fs::create_dir_all(&table_dir).unwrap();

    for i in 0..20 {
        db.put(&wo(), format!("key{:02}", i).as_bytes(), &[b'y'; 100]).unwrap();
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while db.property("atlas.num-files-at-level0").unwrap() == Some("0".to_string()) {
        assert!(Instant::now() < deadline, "automatic flush stopped after a failed flush");
        thread::sleep(Duration::from_millis(10));
    }

    assert_eq!(db.get(&ro(), b"big").unwrap(), Some(vec![b'x'; 2048]));
    for i in 0..20 {
        assert!(db.get(&ro(), format!("key{:02}", i).as_bytes()).unwrap().is_some());
    }
}

#[test]
fn test_flush_without_wait() {
    let (_temp, db) = setup_temp_db();
    db.put(&wo(), b"a", b"1").unwrap();

    let mut options = FlushOptions::default();
    options.set_wait(false);
    db.flush(&options).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    while db.property("atlas.num-entries-active-mem-table").unwrap() != Some("0".to_string()) {
        assert!(Instant::now() < deadline, "queued flush never ran");
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(db.get(&ro(), b"a").unwrap(), Some(b"1".to_vec()));
}

// =============================================================================
// Introspection Tests
// =============================================================================

#[test]
fn test_approximate_sizes_empty_ranges() {
    let (_temp, db) = setup_temp_db();

    assert_eq!(db.approximate_sizes(&[], true).unwrap(), Vec::<u64>::new());
    assert_eq!(db.approximate_key_num(&db.default_column_family(), &[]).unwrap(), 0);

    db.close().unwrap();
    assert_eq!(db.approximate_sizes(&[], false).unwrap(), Vec::<u64>::new());
}

#[test]
fn test_approximate_sizes() {
    let (_temp, db) = setup_temp_db();
    for i in 0..100 {
        db.put(&wo(), format!("a{:03}", i).as_bytes(), &[b'v'; 100]).unwrap();
    }

    let ranges = [Range::new("a", "b"), Range::new("x", "z")];

    // Everything is still in memory
    assert_eq!(db.approximate_sizes(&ranges, false).unwrap(), vec![0, 0]);
    let with_mem = db.approximate_sizes(&ranges, true).unwrap();
    assert!(with_mem[0] >= 100 * 100);
    assert_eq!(with_mem[1], 0);

    db.flush(&FlushOptions::default()).unwrap();

    let on_disk = db.approximate_sizes(&ranges, false).unwrap();
    assert!(on_disk[0] >= 100 * 100);
    assert_eq!(on_disk[1], 0);
}

#[test]
fn test_approximate_key_num() {
    let (_temp, db) = setup_temp_db();
    for i in 0..10 {
        db.put(&wo(), format!("k{}", i).as_bytes(), b"v").unwrap();
    }
    db.flush(&FlushOptions::default()).unwrap();
    for i in 0..5 {
        db.put(&wo(), format!("m{}", i).as_bytes(), b"v").unwrap();
    }

    let cf = db.default_column_family();
    assert_eq!(db.approximate_key_num(&cf, &[Range::new("k", "l")]).unwrap(), 10);
    assert_eq!(db.approximate_key_num(&cf, &[Range::new("m", "n")]).unwrap(), 5);
    assert_eq!(db.approximate_key_num(&cf, &[Range::full()]).unwrap(), 15);
}

#[test]
fn test_properties() {
    let (_temp, db) = setup_temp_db();
    db.put(&wo(), b"a", b"1").unwrap();
    db.put(&wo(), b"b", b"2").unwrap();
    db.delete(&wo(), b"c").unwrap();

    assert_eq!(db.property("atlas.num-entries-active-mem-table").unwrap(), Some("3".to_string()));
    assert_eq!(db.property("atlas.num-files-at-level0").unwrap(), Some("0".to_string()));
    assert_eq!(db.property("atlas.is-file-deletions-enabled").unwrap(), Some("1".to_string()));
    assert_eq!(db.property("atlas.no-such-property").unwrap(), None);
    assert_eq!(db.property("atlas.num-files-at-level9").unwrap(), None);

    db.flush(&FlushOptions::default()).unwrap();

    assert_eq!(db.property("atlas.num-files-at-level0").unwrap(), Some("1".to_string()));
    assert_eq!(db.property("atlas.num-entries-active-mem-table").unwrap(), Some("0".to_string()));
    assert_eq!(db.property("atlas.estimate-num-keys").unwrap(), Some("3".to_string()));
    let total: u64 = db.property("atlas.total-sst-files-size").unwrap().unwrap().parse().unwrap();
    assert!(total > 0);
    assert!(db.property("atlas.stats").unwrap().unwrap().contains("default"));
}

// =============================================================================
// Shutdown / Read-Only Tests
// =============================================================================

#[test]
fn test_shutdown_rejects_writes_keeps_reads() {
    let (_temp, db) = setup_temp_db();
    db.put(&wo(), b"a", b"1").unwrap();

    db.shutdown().unwrap();

    assert!(db.is_open());
    assert_eq!(
        engine_message(db.put(&wo(), b"b", b"2")),
        "Shutdown in progress: Database shutdown"
    );
    assert!(engine_message(db.flush(&FlushOptions::default())).starts_with("Shutdown in progress"));
    assert_eq!(db.get(&ro(), b"a").unwrap(), Some(b"1".to_vec()));

    db.close().unwrap();
    assert!(!db.is_open());
}

#[test]
fn test_read_only_open() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("db");
    {
        let db = reopen(&path);
        db.put(&wo(), b"flushed", b"1").unwrap();
        db.flush(&FlushOptions::default()).unwrap();
        db.put(&wo(), b"logged", b"2").unwrap();
        db.close().unwrap();
    }

    let db = Db::open_for_read_only(&Options::default(), &path, false).unwrap();

    assert_eq!(db.get(&ro(), b"flushed").unwrap(), Some(b"1".to_vec()));
    assert_eq!(db.get(&ro(), b"logged").unwrap(), Some(b"2".to_vec()));
    assert_eq!(
        engine_message(db.put(&wo(), b"x", b"y")),
        "Not supported: Not supported operation in read only mode."
    );
    assert!(engine_message(db.flush(&FlushOptions::default())).starts_with("Not supported"));

    // A second read-only open does not need the lock
    let other = Db::open_for_read_only(&Options::default(), &path, false).unwrap();
    assert_eq!(other.get(&ro(), b"logged").unwrap(), Some(b"2".to_vec()));
}

#[test]
fn test_read_only_error_if_log_file_exist() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("db");
    {
        let db = reopen(&path);
        db.put(&wo(), b"logged", b"1").unwrap();
        db.close().unwrap();
    }

    let msg = engine_message(Db::open_for_read_only(&Options::default(), &path, true));
    assert!(msg.contains("error_if_log_file_exist"));

    // Once flushed, the log is empty and the open succeeds
    reopen(&path).close().unwrap();
    Db::open_for_read_only(&Options::default(), &path, true).unwrap();
}

#[test]
fn test_read_only_missing_db() {
    let temp = TempDir::new().unwrap();

    let msg = engine_message(Db::open_for_read_only(&test_options(), temp.path().join("nope"), false));

    assert!(msg.ends_with("does not exist (create_if_missing is false)"));
}
