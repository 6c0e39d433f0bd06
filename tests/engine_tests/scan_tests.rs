//! Tests for Engine::scan
//!
//! These tests verify:
//! - Key ordering and range bounds
//! - Tombstones are skipped
//! - Scans spanning several internal batches
//! - Restart and concurrent writes

use minikv::config::{CheckpointMode, Config};
use minikv::engine::Engine;
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_engine_with_keys(count: usize) -> (TempDir, Engine) {
    let temp_dir = TempDir::new().unwrap();
    let config = Config::builder()
        .data_dir(temp_dir.path())
        .checkpoint(CheckpointMode::Disabled)
        .build();
    let engine = Engine::open(config).unwrap();
    for i in 0..count {
        engine
            .put(format!("key{:04}", i).as_bytes(), format!("value{}", i).as_bytes())
            .unwrap();
    }
    (temp_dir, engine)
}

fn key(i: usize) -> Vec<u8> {
    format!("key{:04}", i).into_bytes()
}

fn keys(pairs: impl Iterator<Item = (Vec<u8>, Vec<u8>)>) -> Vec<Vec<u8>> {
    pairs.map(|(k, _)| k).collect()
}

// =============================================================================
// Range Tests
// =============================================================================

#[test]
fn test_scan_all_in_key_order() {
    let (_temp, engine) = setup_engine_with_keys(0);
    engine.put(b"banana", b"2").unwrap();
    engine.put(b"apple", b"1").unwrap();
    engine.put(b"cherry", b"3").unwrap();

    let pairs: Vec<_> = engine.scan(..).collect();

    assert_eq!(
        pairs,
        vec![
            (b"apple".to_vec(), b"1".to_vec()),
            (b"banana".to_vec(), b"2".to_vec()),
            (b"cherry".to_vec(), b"3".to_vec()),
        ]
    );
}

#[test]
fn test_scan_half_open_range() {
    let (_temp, engine) = setup_engine_with_keys(10);

    let found = keys(engine.scan(key(3)..key(6)));

    assert_eq!(found, vec![key(3), key(4), key(5)]);
}

#[test]
fn test_scan_inclusive_and_open_ended_ranges() {
    let (_temp, engine) = setup_engine_with_keys(10);

    assert_eq!(keys(engine.scan(key(7)..=key(8))), vec![key(7), key(8)]);
    assert_eq!(keys(engine.scan(key(8)..)), vec![key(8), key(9)]);
    assert_eq!(keys(engine.scan(..key(2))), vec![key(0), key(1)]);
    assert_eq!(keys(engine.scan(..=key(0))), vec![key(0)]);
}

#[test]
fn test_scan_empty_and_inverted_ranges() {
    let (_temp, engine) = setup_engine_with_keys(10);

    assert_eq!(engine.scan(key(5)..key(5)).count(), 0);
    assert_eq!(engine.scan(key(9)..key(1)).count(), 0);
    assert_eq!(engine.scan(b"zzz".to_vec()..).count(), 0);
}

#[test]
fn test_scan_skips_deleted_keys() {
    let (_temp, engine) = setup_engine_with_keys(5);
    engine.delete(&key(1)).unwrap();
    engine.delete(&key(3)).unwrap();

    assert_eq!(keys(engine.scan(..)), vec![key(0), key(2), key(4)]);
}

// =============================================================================
// Iterator Behavior Tests
// =============================================================================

#[test]
fn test_scan_spans_many_batches() {
    let (_temp, engine) = setup_engine_with_keys(1000);

    let found = keys(engine.scan(..));

    assert_eq!(found.len(), 1000);
    assert!(found.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(found.first(), Some(&key(0)));
    assert_eq!(found.last(), Some(&key(999)));
}

#[test]
fn test_scan_is_lazy() {
    let (_temp, engine) = setup_engine_with_keys(500);

    let first_three = keys(engine.scan(..).take(3));

    assert_eq!(first_three, vec![key(0), key(1), key(2)]);
}

#[test]
fn test_scan_restart() {
    let (_temp, engine) = setup_engine_with_keys(300);
    let mut scan = engine.scan(..);

    for _ in 0..200 {
        scan.next().unwrap();
    }
    scan.restart();

    assert_eq!(scan.next().map(|(k, _)| k), Some(key(0)));
    assert_eq!(scan.count(), 299);
}

#[test]
fn test_exhausted_scan_stays_exhausted() {
    let (_temp, engine) = setup_engine_with_keys(2);
    let mut scan = engine.scan(..);

    assert!(scan.next().is_some());
    assert!(scan.next().is_some());
    assert!(scan.next().is_none());
    assert!(scan.next().is_none());
}

#[test]
fn test_scan_sees_writes_ahead_of_cursor() {
    let (_temp, engine) = setup_engine_with_keys(300);
    let mut scan = engine.scan(..);

    assert_eq!(scan.next().map(|(k, _)| k), Some(key(0)));
    engine.put(&key(299), b"rewritten").unwrap();
    engine.delete(&key(298)).unwrap();

    let rest: Vec<_> = scan.collect();
    assert_eq!(rest.len(), 298);
    assert_eq!(rest.last(), Some(&(key(299), b"rewritten".to_vec())));
}
