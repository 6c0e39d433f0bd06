//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through append-only logging.
//!
//! ## Responsibilities
//! - Append a record and fsync it before acknowledging the mutation
//! - Self-validating records (trailing start offset) for corruption detection
//! - Monotonic, gap-free log ids
//! - Full-log replay on startup
//! - Crash-safe compaction of the prefix covered by a checkpoint
//!
//! ## File Format
//! All integers are big-endian.
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Magic (4)                                                │
//! ├──────────────────────────────────────────────────────────┤
//! │ Record 0                                                 │
//! │ ┌─────────┬────────────┬──────────────┬────────────────┐ │
//! │ │ Len (4) │ LogId (8)  │ Payload(Len) │ StartOffset(4) │ │
//! │ └─────────┴────────────┴──────────────┴────────────────┘ │
//! ├──────────────────────────────────────────────────────────┤
//! │ Record 1 ...                                             │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! `StartOffset` repeats the file offset at which its record begins. It comes
//! after the payload so a reader can only confirm a record once every byte of
//! it is present; a mismatch means the log is corrupt.

mod compaction;
mod simple;
mod reader;
mod record;
mod writer;

pub use simple::SimpleWal;
pub use reader::{inspect, RecordInfo, WalInspection};
pub use record::{
    RECORD_OVERHEAD, RECORD_PREFIX_LEN, WAL_HEADER_LEN, WAL_ID_LEN, WAL_MAGIC, WAL_OFFSET_LEN,
    WAL_SIZE_LEN,
};

use crate::error::Result;
use crate::mempool::{MemPool, PooledBuffer};

/// A payload the log can store without understanding it
pub trait LogEntry: Sized {
    /// Serialize into a buffer borrowed from `pool`
    fn encode(&self, pool: &MemPool) -> Result<PooledBuffer>;

    /// Rebuild an entry from the bytes `encode` produced
    fn decode(bytes: &[u8]) -> Result<Self>;
}

/// A replayed record: its log id and the decoded entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry<E> {
    pub id: u64,
    pub entry: E,
}

/// Contract between the storage engine and its log
///
/// Every method needs exclusive access; callers serialize them.
pub trait WriteAheadLog<E>: Send {
    /// Prepare the log directory. Failure is a startup abort.
    fn init(&mut self) -> Result<()>;

    /// Durably append `entry`, returning its log id.
    ///
    /// Returns only after the record has been fsync'd.
    fn append_entry(&mut self, entry: &E) -> Result<u64>;

    /// Scan the whole log and hand every record, in order, to `apply` once.
    fn load(&mut self, apply: &mut dyn FnMut(Vec<WalEntry<E>>)) -> Result<()>;

    /// Make sure the next append gets an id of at least `next_id`.
    ///
    /// Used after a checkpoint restore, when the log may no longer hold the
    /// ids the snapshot covers. Never moves the counter backwards.
    fn resume_ids(&mut self, next_id: u64);

    /// Discard every record with id `<= id`.
    ///
    /// Returns `false` (and changes nothing) if `id` is not in the log.
    fn truncate_ahead(&mut self, id: u64) -> Result<bool>;

    /// Empty the log, header included, and restart ids at 0.
    fn reset(&mut self) -> Result<()>;

    /// Flush file metadata to disk.
    fn sync(&mut self) -> Result<()>;

    /// Sync and release the file handle.
    fn close(&mut self) -> Result<()>;
}
