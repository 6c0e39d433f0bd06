//! MemTable Module
//!
//! The in-memory ordered key-value map the engine serves from.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Single-writer/multi-reader access pattern
//! - Absolute upserts and removals, so replaying an entry twice is harmless
//! - Ordered range reads for scans and checkpoints
//!
//! ## Data Structure Choice
//! BTreeMap keyed by owned byte vectors (lexicographic order) behind an RwLock.
//! Deletes leave a tombstone until a checkpoint makes it unnecessary.

mod table;

pub use table::MemTable;

/// Entry stored in the MemTable
#[derive(Debug, Clone, PartialEq)]
pub enum MemTableEntry {
    /// A live value
    Value(Vec<u8>),

    /// A tombstone (deleted key)
    Tombstone,
}
