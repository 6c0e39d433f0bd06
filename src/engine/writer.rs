//! Writer thread
//!
//! The single logical writer: drains the bounded request queue and, for each
//! mutation, appends to the WAL, waits for the fsync, then applies the entry
//! to the memtable. Nothing is visible to readers before its record is durable.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::checkpoint::Checkpoint;
use crate::entry::Entry;
use crate::error::{KvError, Result};
use crate::memtable::MemTable;
use crate::wal::WriteAheadLog;

/// Work items for the writer thread
pub(super) enum WriteCommand {
    /// Log and apply one mutation; replies with its log id
    Apply {
        entry: Entry,
        reply: Sender<Result<u64>>,
    },

    /// Snapshot and compact; replies with the id the snapshot covers
    Checkpoint { reply: Sender<Result<Option<u64>>> },
}

/// State the writer publishes to the engine front
#[derive(Default)]
pub(super) struct WriterShared {
    /// Id of the newest logged mutation
    pub last_id: Mutex<Option<u64>>,

    /// Set once a fatal WAL error has been seen
    pub failure: Mutex<Option<String>>,
}

pub(super) struct Writer {
    wal: Box<dyn WriteAheadLog<Entry>>,
    checkpoint: Option<Box<dyn Checkpoint>>,
    memtable: Arc<MemTable>,
    shared: Arc<WriterShared>,
    checkpoint_interval: Option<u64>,
    since_checkpoint: u64,

    /// Newest id already covered by a saved snapshot
    covered: Option<u64>,
}

impl Writer {
    pub fn new(
        wal: Box<dyn WriteAheadLog<Entry>>,
        checkpoint: Option<Box<dyn Checkpoint>>,
        memtable: Arc<MemTable>,
        shared: Arc<WriterShared>,
        checkpoint_interval: Option<u64>,
        covered: Option<u64>,
    ) -> Self {
        Self {
            wal,
            checkpoint,
            memtable,
            shared,
            checkpoint_interval,
            since_checkpoint: 0,
            covered,
        }
    }

    pub fn spawn(self, commands: Receiver<WriteCommand>) -> Result<JoinHandle<Result<()>>> {
        let handle = thread::Builder::new()
            .name("minikv-writer".to_string())
            .spawn(move || self.run(commands))?;
        Ok(handle)
    }

    /// Serve until every sender is gone, then close the log
    fn run(mut self, commands: Receiver<WriteCommand>) -> Result<()> {
        for command in commands.iter() {
            match command {
                WriteCommand::Apply { entry, reply } => {
                    let result = self.apply(entry);
                    let _ = reply.send(result);
                }
                WriteCommand::Checkpoint { reply } => {
                    let result = self.checkpoint();
                    let _ = reply.send(result);
                }
            }
        }

        debug!("writer queue closed, closing WAL");
        self.wal.close()
    }

    fn apply(&mut self, entry: Entry) -> Result<u64> {
        self.ensure_healthy()?;

        let id = match self.wal.append_entry(&entry) {
            Ok(id) => id,
            Err(e) => return Err(self.record_failure(e)),
        };
        // The record is durable; publish its id before readers can see the entry.
        *self.shared.last_id.lock() = Some(id);
        self.memtable.apply(entry);
        self.since_checkpoint += 1;

        if let Some(interval) = self.checkpoint_interval {
            if self.checkpoint.is_some() && self.since_checkpoint >= interval {
                if let Err(e) = self.checkpoint() {
                    // Retry after another full interval, not on every write
                    self.since_checkpoint = 0;
                    warn!(error = %e, interval, "automatic checkpoint failed");
                }
            }
        }

        Ok(id)
    }

    fn checkpoint(&mut self) -> Result<Option<u64>> {
        self.ensure_healthy()?;

        let Some(checkpoint) = self.checkpoint.as_mut() else {
            return Err(KvError::CheckpointDisabled);
        };
        let Some(up_to) = *self.shared.last_id.lock() else {
            return Ok(None);
        };
        if self.covered == Some(up_to) {
            return Ok(None);
        }

        let entries = self.memtable.live_entries();
        if let Err(e) = checkpoint.save(&entries, up_to) {
            warn!(up_to, error = %e, "checkpoint failed, WAL left untouched");
            return Err(e);
        }
        self.covered = Some(up_to);
        self.since_checkpoint = 0;

        match self.wal.truncate_ahead(up_to) {
            Ok(true) => {
                let purged = self.memtable.purge_tombstones();
                info!(up_to, entries = entries.len(), purged, "checkpoint complete");
            }
            Ok(false) => {
                warn!(up_to, "checkpointed id is no longer in the WAL, nothing truncated");
            }
            Err(e) => return Err(self.record_failure(e)),
        }

        Ok(Some(up_to))
    }

    fn ensure_healthy(&self) -> Result<()> {
        match self.shared.failure.lock().as_ref() {
            Some(reason) => Err(KvError::EngineFailed(reason.clone())),
            None => Ok(()),
        }
    }

    /// Halt further mutations if `err` leaves the log untrustworthy
    fn record_failure(&self, err: KvError) -> KvError {
        if err.is_fatal() {
            error!(error = %err, "unrecoverable WAL error, rejecting further writes");
            *self.shared.failure.lock() = Some(err.to_string());
        }
        err
    }
}
