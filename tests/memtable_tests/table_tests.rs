//! MemTable Tests
//!
//! Tests verify:
//! - Basic CRUD operations
//! - Size tracking
//! - Tombstone handling and purging
//! - Ordered range batches
//! - Idempotent replay
//! - Concurrent access patterns

use std::ops::Bound;
use std::sync::Arc;
use std::thread;

use minikv::entry::Entry;
use minikv::memtable::{MemTable, MemTableEntry};

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_new_memtable_is_empty() {
    let memtable = MemTable::new();
    assert_eq!(memtable.entry_count(), 0);
    assert_eq!(memtable.size(), 0);
    assert!(memtable.is_empty());
}

#[test]
fn test_put_and_get() {
    let memtable = MemTable::new();

    memtable.put(b"key1".to_vec(), b"value1".to_vec());

    assert_eq!(
        memtable.get(b"key1"),
        Some(MemTableEntry::Value(b"value1".to_vec()))
    );
    assert_eq!(memtable.get_value(b"key1"), Some(b"value1".to_vec()));
}

#[test]
fn test_get_nonexistent_key() {
    let memtable = MemTable::new();
    assert_eq!(memtable.get(b"nonexistent"), None);
    assert_eq!(memtable.get_value(b"nonexistent"), None);
}

#[test]
fn test_put_overwrites_existing() {
    let memtable = MemTable::new();

    memtable.put(b"key".to_vec(), b"old".to_vec());
    memtable.put(b"key".to_vec(), b"new".to_vec());

    assert_eq!(memtable.entry_count(), 1);
    assert_eq!(memtable.get_value(b"key"), Some(b"new".to_vec()));
}

#[test]
fn test_delete_leaves_tombstone() {
    let memtable = MemTable::new();

    memtable.put(b"key".to_vec(), b"value".to_vec());
    memtable.delete(b"key".to_vec());

    assert_eq!(memtable.get(b"key"), Some(MemTableEntry::Tombstone));
    assert_eq!(memtable.get_value(b"key"), None);
    assert_eq!(memtable.entry_count(), 1);
    assert_eq!(memtable.live_count(), 0);
}

#[test]
fn test_put_after_delete_revives_key() {
    let memtable = MemTable::new();

    memtable.put(b"key".to_vec(), b"v1".to_vec());
    memtable.delete(b"key".to_vec());
    memtable.put(b"key".to_vec(), b"v2".to_vec());

    assert_eq!(memtable.get_value(b"key"), Some(b"v2".to_vec()));
    assert_eq!(memtable.live_count(), 1);
}

// =============================================================================
// Size Tracking Tests
// =============================================================================

#[test]
fn test_size_tracks_keys_and_values() {
    let memtable = MemTable::new();

    assert_eq!(memtable.put(b"ab".to_vec(), b"1234".to_vec()), 6);
    assert_eq!(memtable.put(b"ab".to_vec(), b"12".to_vec()), 4);
    assert_eq!(memtable.put(b"cd".to_vec(), b"x".to_vec()), 7);
    assert_eq!(memtable.delete(b"cd".to_vec()), 6);
    assert_eq!(memtable.size(), 6);
}

#[test]
fn test_purge_tombstones_frees_keys() {
    let memtable = MemTable::new();

    memtable.put(b"live".to_vec(), b"v".to_vec());
    memtable.put(b"dead".to_vec(), b"v".to_vec());
    memtable.delete(b"dead".to_vec());

    assert_eq!(memtable.purge_tombstones(), 1);
    assert_eq!(memtable.entry_count(), 1);
    assert_eq!(memtable.get(b"dead"), None);
    assert_eq!(memtable.size(), 5);
}

#[test]
fn test_clear() {
    let memtable = MemTable::new();
    memtable.put(b"a".to_vec(), b"1".to_vec());
    memtable.delete(b"b".to_vec());

    memtable.clear();

    assert!(memtable.is_empty());
    assert_eq!(memtable.size(), 0);
}

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_iter_is_sorted_bytewise() {
    let memtable = MemTable::new();

    memtable.put(b"b".to_vec(), b"2".to_vec());
    memtable.put(b"a".to_vec(), b"1".to_vec());
    memtable.put(b"ab".to_vec(), b"3".to_vec());
    memtable.put(vec![0xFF], b"4".to_vec());
    memtable.put(Vec::new(), b"0".to_vec());

    let keys: Vec<Vec<u8>> = memtable.iter().into_iter().map(|(k, _)| k).collect();
    assert_eq!(
        keys,
        vec![
            Vec::new(),
            b"a".to_vec(),
            b"ab".to_vec(),
            b"b".to_vec(),
            vec![0xFF]
        ]
    );
}

#[test]
fn test_live_entries_skip_tombstones() {
    let memtable = MemTable::new();
    memtable.put(b"a".to_vec(), b"1".to_vec());
    memtable.put(b"b".to_vec(), b"2".to_vec());
    memtable.delete(b"a".to_vec());

    assert_eq!(
        memtable.live_entries(),
        vec![(b"b".to_vec(), b"2".to_vec())]
    );
}

#[test]
fn test_range_batch_bounds_and_limit() {
    let memtable = MemTable::new();
    for c in b'a'..=b'j' {
        memtable.put(vec![c], vec![c]);
    }
    memtable.delete(b"c".to_vec());

    let batch = memtable.range_batch(
        Bound::Included(b"b".as_slice()),
        Bound::Excluded(b"g".as_slice()),
        3,
    );
    let keys: Vec<Vec<u8>> = batch.into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![b"b".to_vec(), b"d".to_vec(), b"e".to_vec()]);

    let rest = memtable.range_batch(
        Bound::Excluded(b"e".as_slice()),
        Bound::Excluded(b"g".as_slice()),
        10,
    );
    assert_eq!(rest.len(), 1);
}

#[test]
fn test_range_batch_inverted_bounds_is_empty() {
    let memtable = MemTable::new();
    memtable.put(b"m".to_vec(), b"1".to_vec());

    let batch = memtable.range_batch(
        Bound::Included(b"z".as_slice()),
        Bound::Included(b"a".as_slice()),
        10,
    );
    assert!(batch.is_empty());

    let batch = memtable.range_batch(
        Bound::Excluded(b"m".as_slice()),
        Bound::Excluded(b"m".as_slice()),
        10,
    );
    assert!(batch.is_empty());
}

// =============================================================================
// Replay Tests
// =============================================================================

#[test]
fn test_replay_is_idempotent() {
    let entries = vec![
        Entry::put("a", "1"),
        Entry::put("b", "2"),
        Entry::delete("a"),
        Entry::put("c", "3"),
        Entry::put("b", "4"),
    ];

    let once = MemTable::new();
    for entry in entries.iter().cloned() {
        once.apply(entry);
    }

    let twice = MemTable::new();
    for _ in 0..2 {
        for entry in entries.iter().cloned() {
            twice.apply(entry);
        }
    }

    assert_eq!(once.iter(), twice.iter());
    assert_eq!(once.size(), twice.size());
}

#[test]
fn test_restore_replaces_content() {
    let memtable = MemTable::new();
    memtable.put(b"old".to_vec(), b"x".to_vec());

    memtable.restore(vec![
        (b"a".to_vec(), b"1".to_vec()),
        (b"b".to_vec(), b"22".to_vec()),
    ]);

    assert_eq!(memtable.get(b"old"), None);
    assert_eq!(memtable.live_count(), 2);
    assert_eq!(memtable.size(), 5);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_readers_with_writer() {
    let memtable = Arc::new(MemTable::new());
    for i in 0..100 {
        memtable.put(format!("key{:03}", i).into_bytes(), b"v".to_vec());
    }

    let writer = {
        let memtable = Arc::clone(&memtable);
        thread::spawn(move || {
            for i in 100..200 {
                memtable.put(format!("key{:03}", i).into_bytes(), b"v".to_vec());
            }
        })
    };

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let memtable = Arc::clone(&memtable);
            thread::spawn(move || {
                for i in 0..100 {
                    let key = format!("key{:03}", i);
                    assert_eq!(memtable.get_value(key.as_bytes()), Some(b"v".to_vec()));
                }
            })
        })
        .collect();

    writer.join().unwrap();
    for reader in readers {
        reader.join().unwrap();
    }
    assert_eq!(memtable.live_count(), 200);
}
