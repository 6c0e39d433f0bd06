//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::entry::{Entry, EntryKind};

use super::MemTableEntry;

/// In-memory ordered map of the engine's current state
pub struct MemTable {
    data: RwLock<BTreeMap<Vec<u8>, MemTableEntry>>,

    /// Approximate size in bytes (keys + values)
    size: AtomicUsize,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
        }
    }

    /// Get the entry for a key, tombstones included (read lock)
    pub fn get(&self, key: &[u8]) -> Option<MemTableEntry> {
        self.data.read().get(key).cloned()
    }

    /// Get the live value for a key (read lock)
    pub fn get_value(&self, key: &[u8]) -> Option<Vec<u8>> {
        match self.data.read().get(key) {
            Some(MemTableEntry::Value(value)) => Some(value.clone()),
            Some(MemTableEntry::Tombstone) | None => None,
        }
    }

    /// Put a key-value pair (write lock). Returns the new approximate size.
    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> usize {
        self.upsert(key, MemTableEntry::Value(value))
    }

    /// Delete a key (write lock, inserts tombstone). Returns the new approximate size.
    pub fn delete(&self, key: Vec<u8>) -> usize {
        self.upsert(key, MemTableEntry::Tombstone)
    }

    /// Apply a logged mutation with the same semantics as live traffic
    pub fn apply(&self, entry: Entry) -> usize {
        match entry.kind {
            EntryKind::Put => self.put(entry.key, entry.value),
            EntryKind::Delete => self.delete(entry.key),
        }
    }

    fn upsert(&self, key: Vec<u8>, entry: MemTableEntry) -> usize {
        let added = key.len() + entry_size(&entry);
        let mut data = self.data.write();

        let removed = match data.get(&key) {
            Some(old) => key.len() + entry_size(old),
            None => 0,
        };
        data.insert(key, entry);

        let size = self.size.load(Ordering::Relaxed) + added - removed;
        self.size.store(size, Ordering::Relaxed);
        size
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Get entry count (tombstones included)
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    /// Number of keys holding a live value
    pub fn live_count(&self) -> usize {
        self.data
            .read()
            .values()
            .filter(|entry| matches!(entry, MemTableEntry::Value(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Snapshot of all entries in sorted key order
    pub fn iter(&self) -> Vec<(Vec<u8>, MemTableEntry)> {
        self.data
            .read()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    /// Live pairs in key order (what a checkpoint persists)
    pub fn live_entries(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.data
            .read()
            .iter()
            .filter_map(|(key, entry)| match entry {
                MemTableEntry::Value(value) => Some((key.clone(), value.clone())),
                MemTableEntry::Tombstone => None,
            })
            .collect()
    }

    /// Up to `limit` live pairs within the bounds, in key order (read lock)
    pub fn range_batch(
        &self,
        lower: Bound<&[u8]>,
        upper: Bound<&[u8]>,
        limit: usize,
    ) -> Vec<(Vec<u8>, Vec<u8>)> {
        if range_is_empty(lower, upper) {
            return Vec::new();
        }

        self.data
            .read()
            .range::<[u8], _>((lower, upper))
            .filter_map(|(key, entry)| match entry {
                MemTableEntry::Value(value) => Some((key.clone(), value.clone())),
                MemTableEntry::Tombstone => None,
            })
            .take(limit)
            .collect()
    }

    /// Replace the whole content with a checkpoint's pairs
    pub fn restore(&self, entries: Vec<(Vec<u8>, Vec<u8>)>) {
        let mut data = self.data.write();
        data.clear();

        let mut size = 0;
        for (key, value) in entries {
            size += key.len() + value.len();
            data.insert(key, MemTableEntry::Value(value));
        }
        self.size.store(size, Ordering::Relaxed);
    }

    /// Remove tombstones once no log record depends on them. Returns how many went.
    pub fn purge_tombstones(&self) -> usize {
        let mut data = self.data.write();
        let before = data.len();

        let mut freed = 0;
        data.retain(|key, entry| match entry {
            MemTableEntry::Tombstone => {
                freed += key.len();
                false
            }
            MemTableEntry::Value(_) => true,
        });

        self.size.fetch_sub(freed, Ordering::Relaxed);
        before - data.len()
    }

    /// Clear all entries
    pub fn clear(&self) {
        self.data.write().clear();
        self.size.store(0, Ordering::Relaxed);
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}

fn entry_size(entry: &MemTableEntry) -> usize {
    match entry {
        MemTableEntry::Value(value) => value.len(),
        MemTableEntry::Tombstone => 0,
    }
}

/// Bounds that `BTreeMap::range` would reject (start past end)
fn range_is_empty(lower: Bound<&[u8]>, upper: Bound<&[u8]>) -> bool {
    match (lower, upper) {
        (Bound::Included(start), Bound::Included(end)) => start > end,
        (Bound::Included(start), Bound::Excluded(end))
        | (Bound::Excluded(start), Bound::Included(end))
        | (Bound::Excluded(start), Bound::Excluded(end)) => start >= end,
        _ => false,
    }
}
