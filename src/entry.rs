//! Entry codec
//!
//! A single key-value mutation and its wire representation. The WAL never
//! looks inside an entry; it only needs [`LogEntry::encode`] and
//! [`LogEntry::decode`] to succeed and to produce a byte length.

use bincode::Options;
use serde::{Deserialize, Serialize};

use crate::error::{KvError, Result};
use crate::mempool::{MemPool, PooledBuffer};
use crate::wal::LogEntry;

/// Upper bound on an encoded entry (the WAL addresses records with u32 offsets)
pub const MAX_ENCODED_ENTRY_SIZE: u64 = u32::MAX as u64 / 2;

/// Kind of mutation an entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    /// Insert or overwrite the key
    Put,

    /// Remove the key (tombstone)
    Delete,
}

/// One key-value mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub kind: EntryKind,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Entry {
    /// A put of `value` under `key`
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: EntryKind::Put,
            key: key.into(),
            value: value.into(),
        }
    }

    /// A tombstone for `key`
    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: EntryKind::Delete,
            key: key.into(),
            value: Vec::new(),
        }
    }

    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn is_tombstone(&self) -> bool {
        self.kind == EntryKind::Delete
    }

    /// Size of the encoded form in bytes
    pub fn encoded_len(&self) -> Result<usize> {
        let size = codec_options().serialized_size(self)?;
        Ok(size as usize)
    }
}

/// Fixed-width integers, bounded size, trailing bytes rejected
fn codec_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_limit(MAX_ENCODED_ENTRY_SIZE)
}

impl LogEntry for Entry {
    fn encode(&self, pool: &MemPool) -> Result<PooledBuffer> {
        let size = self.encoded_len()?;
        let mut buffer = pool.acquire(size);
        codec_options().serialize_into(&mut buffer, self)?;
        Ok(buffer)
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(KvError::Codec("empty entry payload".to_string()));
        }
        let entry: Entry = codec_options().deserialize(bytes)?;
        if entry.kind == EntryKind::Delete && !entry.value.is_empty() {
            return Err(KvError::Codec("tombstone carries a value".to_string()));
        }
        Ok(entry)
    }
}
