//! Checkpoint Module
//!
//! Point-in-time snapshots of the key-value map.
//!
//! ## Responsibilities
//! - Persist the live pairs together with the last log id they cover
//! - Load the newest snapshot on startup, before WAL replay
//!
//! A successful `save` covering log id `N` is what allows the engine to call
//! `truncate_ahead(N)` on the WAL. A failed `save` never leads to truncation.

mod snapshot;

pub use snapshot::SnapshotCheckpoint;

use crate::error::Result;

/// A loaded checkpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    /// Live pairs in key order
    pub entries: Vec<(Vec<u8>, Vec<u8>)>,

    /// Last WAL id whose effect the snapshot contains
    pub last_applied_id: u64,
}

/// Snapshot storage used by the engine
pub trait Checkpoint: Send {
    /// Newest snapshot, or `None` if none has been saved
    fn load(&mut self) -> Result<Option<Snapshot>>;

    /// Durably replace the snapshot with `entries`, covering log ids `<= up_to_id`
    fn save(&mut self, entries: &[(Vec<u8>, Vec<u8>)], up_to_id: u64) -> Result<()>;
}
