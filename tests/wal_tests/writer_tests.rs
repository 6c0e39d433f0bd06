//! Tests for WAL appends
//!
//! These tests verify:
//! - Header creation on first load
//! - Log id generation and sequencing
//! - Record layout on disk (length, id, payload, trailing offset)
//! - Reset and lazy header rewrite
//! - Init edge cases

use std::fs;
use std::path::Path;

use bytes::Buf;
use minikv::entry::Entry;
use minikv::mempool::MemPool;
use minikv::wal::{
    LogEntry, SimpleWal, WalEntry, WriteAheadLog, RECORD_OVERHEAD, WAL_HEADER_LEN, WAL_MAGIC,
};
use minikv::KvError;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn open_wal(dir: &Path) -> (SimpleWal<Entry>, Vec<WalEntry<Entry>>) {
    let mut wal: SimpleWal<Entry> = SimpleWal::new(dir, MemPool::default());
    wal.init().unwrap();
    let mut loaded = Vec::new();
    wal.load(&mut |entries| loaded = entries).unwrap();
    (wal, loaded)
}

fn record_size(entry: &Entry) -> u64 {
    (entry.encoded_len().unwrap() + RECORD_OVERHEAD) as u64
}

// =============================================================================
// Basic Writing Tests
// =============================================================================

#[test]
fn test_load_creates_header_only_file() {
    let temp = TempDir::new().unwrap();
    let (wal, loaded) = open_wal(temp.path());

    assert!(loaded.is_empty());
    assert!(wal.is_loaded());
    assert_eq!(wal.file_size(), WAL_HEADER_LEN as u64);

    let bytes = fs::read(wal.path()).unwrap();
    assert_eq!(bytes, WAL_MAGIC.to_be_bytes());
}

#[test]
fn test_append_assigns_sequential_ids() {
    let temp = TempDir::new().unwrap();
    let (mut wal, _) = open_wal(temp.path());

    for expected in 0..5u64 {
        let id = wal
            .append_entry(&Entry::put(format!("key{}", expected), "value"))
            .unwrap();
        assert_eq!(id, expected);
    }

    assert_eq!(wal.next_id(), 5);
    assert_eq!(wal.record_count(), 5);
}

#[test]
fn test_append_grows_file_by_record_size() {
    let temp = TempDir::new().unwrap();
    let (mut wal, _) = open_wal(temp.path());

    let first = Entry::put("k1", "v1");
    let second = Entry::put("k2", "v2");

    wal.append_entry(&first).unwrap();
    let after_first = WAL_HEADER_LEN as u64 + record_size(&first);
    assert_eq!(wal.file_size(), after_first);
    assert_eq!(fs::metadata(wal.path()).unwrap().len(), after_first);

    wal.append_entry(&second).unwrap();
    assert_eq!(wal.file_size(), after_first + record_size(&second));
}

#[test]
fn test_record_layout_on_disk() {
    let temp = TempDir::new().unwrap();
    let (mut wal, _) = open_wal(temp.path());

    let entry = Entry::put("hello", "world");
    wal.append_entry(&entry).unwrap();

    let bytes = fs::read(wal.path()).unwrap();
    let mut cursor = &bytes[..];

    assert_eq!(cursor.get_u32(), WAL_MAGIC);
    let len = cursor.get_u32() as usize;
    assert_eq!(len, entry.encoded_len().unwrap());
    assert_eq!(cursor.get_u64(), 0);

    let decoded = Entry::decode(&cursor[..len]).unwrap();
    assert_eq!(decoded, entry);
    cursor.advance(len);

    assert_eq!(cursor.get_u32(), WAL_HEADER_LEN);
    assert!(cursor.is_empty());
}

#[test]
fn test_index_tracks_record_end_offsets() {
    let temp = TempDir::new().unwrap();
    let (mut wal, _) = open_wal(temp.path());

    let entry = Entry::put("k", "v");
    let size = record_size(&entry) as u32;

    wal.append_entry(&entry).unwrap();
    wal.append_entry(&entry).unwrap();

    assert_eq!(wal.end_offset(0), Some(WAL_HEADER_LEN + size - 1));
    assert_eq!(wal.end_offset(1), Some(WAL_HEADER_LEN + 2 * size - 1));
    assert_eq!(wal.end_offset(2), None);
}

#[test]
fn test_append_before_load_fails() {
    let temp = TempDir::new().unwrap();
    let mut wal: SimpleWal<Entry> = SimpleWal::new(temp.path(), MemPool::default());
    wal.init().unwrap();

    let result = wal.append_entry(&Entry::put("k", "v"));
    assert!(matches!(result, Err(KvError::WalNotLoaded)));
}

#[test]
fn test_append_releases_pool_buffers() {
    let temp = TempDir::new().unwrap();
    let pool = MemPool::new(256, 8);
    let mut wal: SimpleWal<Entry> = SimpleWal::new(temp.path(), pool.clone());
    wal.init().unwrap();
    wal.load(&mut |_| {}).unwrap();

    for i in 0..10 {
        wal.append_entry(&Entry::put(format!("k{}", i), vec![7u8; 100]))
            .unwrap();
    }
    // Oversized payloads take a one-off allocation, which must be released too
    wal.append_entry(&Entry::put("big", vec![1u8; 4096])).unwrap();

    assert_eq!(pool.outstanding(), 0);
    assert!(pool.cached() > 0);
}

// =============================================================================
// Reset Tests
// =============================================================================

#[test]
fn test_reset_empties_file_and_restarts_ids() {
    let temp = TempDir::new().unwrap();
    let (mut wal, _) = open_wal(temp.path());

    wal.append_entry(&Entry::put("a", "1")).unwrap();
    wal.append_entry(&Entry::put("b", "2")).unwrap();

    wal.reset().unwrap();

    assert_eq!(fs::metadata(wal.path()).unwrap().len(), 0);
    assert_eq!(wal.file_size(), 0);
    assert_eq!(wal.next_id(), 0);
    assert_eq!(wal.record_count(), 0);
}

#[test]
fn test_resume_ids_only_moves_forward() {
    let temp = TempDir::new().unwrap();
    let (mut wal, _) = open_wal(temp.path());

    wal.resume_ids(10);
    assert_eq!(wal.append_entry(&Entry::put("a", "1")).unwrap(), 10);

    wal.resume_ids(3);
    assert_eq!(wal.append_entry(&Entry::put("b", "2")).unwrap(), 11);
    assert_eq!(wal.next_id(), 12);
}

#[test]
fn test_append_after_reset_rewrites_header() {
    let temp = TempDir::new().unwrap();
    let (mut wal, _) = open_wal(temp.path());

    wal.append_entry(&Entry::put("a", "1")).unwrap();
    wal.reset().unwrap();

    let id = wal.append_entry(&Entry::put("b", "2")).unwrap();
    assert_eq!(id, 0);
    wal.close().unwrap();

    let (_wal, loaded) = open_wal(temp.path());
    assert_eq!(
        loaded,
        vec![WalEntry {
            id: 0,
            entry: Entry::put("b", "2"),
        }]
    );
}

#[test]
fn test_zero_length_file_loads_empty() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(SimpleWal::<Entry>::FILE_NAME), b"").unwrap();

    let (mut wal, loaded) = open_wal(temp.path());
    assert!(loaded.is_empty());
    assert_eq!(wal.file_size(), 0);

    assert_eq!(wal.append_entry(&Entry::delete("gone")).unwrap(), 0);
    assert!(wal.file_size() > WAL_HEADER_LEN as u64);
}

// =============================================================================
// Init Tests
// =============================================================================

#[test]
fn test_init_creates_missing_directory() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("nested").join("wal");

    let (wal, _) = open_wal(&dir);

    assert!(dir.is_dir());
    assert!(wal.path().exists());
}

#[test]
fn test_init_rejects_directory_in_place_of_log() {
    let temp = TempDir::new().unwrap();
    fs::create_dir(temp.path().join(SimpleWal::<Entry>::FILE_NAME)).unwrap();

    let mut wal: SimpleWal<Entry> = SimpleWal::new(temp.path(), MemPool::default());
    let result = wal.init();

    assert!(matches!(result, Err(KvError::Config(_))));
}

#[test]
fn test_creation_after_crash_mid_header() {
    let temp = TempDir::new().unwrap();

    // The log was being created; only half of its header reached the disk
    let staging = temp.path().join(SimpleWal::<Entry>::COMPACT_FILE_NAME);
    fs::write(&staging, &WAL_MAGIC.to_be_bytes()[..2]).unwrap();

    let (wal, loaded) = open_wal(temp.path());

    assert!(loaded.is_empty());
    assert!(!staging.exists());
    assert_eq!(fs::read(wal.path()).unwrap(), WAL_MAGIC.to_be_bytes());
}

#[test]
fn test_creation_leaves_no_staging_file() {
    let temp = TempDir::new().unwrap();
    let (mut wal, _) = open_wal(temp.path());

    assert!(!temp
        .path()
        .join(SimpleWal::<Entry>::COMPACT_FILE_NAME)
        .exists());
    assert_eq!(wal.append_entry(&Entry::put("a", "1")).unwrap(), 0);
}

#[test]
fn test_close_then_reload() {
    let temp = TempDir::new().unwrap();
    let (mut wal, _) = open_wal(temp.path());

    wal.append_entry(&Entry::put("a", "1")).unwrap();
    wal.close().unwrap();
    assert!(!wal.is_loaded());

    let mut loaded = Vec::new();
    wal.load(&mut |entries| loaded = entries).unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(wal.append_entry(&Entry::put("b", "2")).unwrap(), 1);
}
