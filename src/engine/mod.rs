//! Engine Module
//!
//! The storage engine that coordinates the WAL, the memtable and checkpoints.
//!
//! ## Responsibilities
//! - Replay checkpoint + WAL into the memtable on startup
//! - Serialize mutations through one writer thread (WAL first, then memory)
//! - Serve reads straight from the memtable
//! - Compact the WAL behind successful checkpoints

mod scan;
mod writer;

pub use scan::ScanIter;

use std::fs;
use std::ops::RangeBounds;
use std::path::Path;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam::channel::{self, Sender};
use parking_lot::{Mutex, RwLock};
use tracing::{error, info};

use crate::checkpoint::{Checkpoint, SnapshotCheckpoint};
use crate::config::{CheckpointMode, Config};
use crate::entry::Entry;
use crate::error::{KvError, Result};
use crate::mempool::MemPool;
use crate::memtable::MemTable;
use crate::wal::{SimpleWal, WalEntry, WriteAheadLog};

use writer::{WriteCommand, Writer, WriterShared};

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/checkpoint): queued on a bounded channel and
///   executed one at a time by the writer thread. The caller blocks until its
///   record is fsync'd and applied.
/// - **Reads** (get/scan): concurrent, directly against the memtable's
///   RwLock. They only ever see mutations whose WAL append has completed.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// In-memory ordered map (internal RwLock)
    memtable: Arc<MemTable>,

    /// Queue into the writer thread; `None` once stopped
    commands: RwLock<Option<Sender<WriteCommand>>>,

    /// Writer thread, joined on stop
    worker: Mutex<Option<JoinHandle<Result<()>>>>,

    /// Log position and health published by the writer
    shared: Arc<WriterShared>,
}

impl Engine {
    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Prepare the WAL directory
    /// 2. Load the checkpoint snapshot, if any
    /// 3. Replay the WAL on top of it
    /// 4. Start the writer thread
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;

        let pool = MemPool::new(config.mempool_block_size, config.mempool_max_cached_blocks);
        let wal = SimpleWal::<Entry>::new(config.wal_dir(), pool);
        let checkpoint: Option<Box<dyn Checkpoint>> = match config.checkpoint {
            CheckpointMode::Snapshot => Some(Box::new(SnapshotCheckpoint::new(config.checkpoint_dir()))),
            CheckpointMode::Disabled => None,
        };

        Self::open_with(config, Box::new(wal), checkpoint)
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Open with caller-supplied collaborators
    pub fn open_with(
        config: Config,
        wal: Box<dyn WriteAheadLog<Entry>>,
        checkpoint: Option<Box<dyn Checkpoint>>,
    ) -> Result<Self> {
        let result = Self::start(config, wal, checkpoint);
        if let Err(e) = &result {
            error!(error = %e, fatal = e.is_fatal(), "engine failed to start");
        }
        result
    }

    fn start(
        config: Config,
        mut wal: Box<dyn WriteAheadLog<Entry>>,
        mut checkpoint: Option<Box<dyn Checkpoint>>,
    ) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;
        info!(data_dir = %config.data_dir.display(), "starting engine");

        wal.init()?;

        let memtable = Arc::new(MemTable::new());
        let mut covered = None;
        if let Some(checkpoint) = checkpoint.as_mut() {
            if let Some(snapshot) = checkpoint.load()? {
                info!(
                    entries = snapshot.entries.len(),
                    last_applied_id = snapshot.last_applied_id,
                    "restoring checkpoint"
                );
                memtable.restore(snapshot.entries);
                covered = Some(snapshot.last_applied_id);
            }
        }

        let mut replayed = 0;
        let mut last_id = None;
        wal.load(&mut |entries: Vec<WalEntry<Entry>>| {
            replayed = entries.len();
            for WalEntry { id, entry } in entries {
                memtable.apply(entry);
                last_id = Some(id);
            }
        })?;
        info!(replayed, live_keys = memtable.live_count(), "WAL replay complete");

        // Ids only restart on an explicit reset, even if compaction emptied the log
        if let Some(covered) = covered {
            wal.resume_ids(covered.saturating_add(1));
            last_id = last_id.max(Some(covered));
        }

        let shared = Arc::new(WriterShared::default());
        *shared.last_id.lock() = last_id;

        let (sender, receiver) = channel::bounded(config.max_pending_writes);
        let worker = Writer::new(
            wal,
            checkpoint,
            Arc::clone(&memtable),
            Arc::clone(&shared),
            config.checkpoint_interval,
            covered,
        )
        .spawn(receiver)?;

        Ok(Self {
            config,
            memtable,
            commands: RwLock::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
            shared,
        })
    }

    /// Get a value by key
    ///
    /// Pure read from the memtable; never touches the WAL.
    pub fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.memtable.get_value(key)
    }

    /// Put a key-value pair
    ///
    /// Returns once the record is durable and the value is visible. If the
    /// WAL append fails the map is left untouched.
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.check_key(key)?;
        if value.len() > self.config.max_value_size {
            return Err(KvError::InvalidValue(format!(
                "value of {} bytes exceeds the {}-byte limit",
                value.len(),
                self.config.max_value_size
            )));
        }

        self.submit_entry(Entry::put(key, value))
    }

    /// Delete a key
    ///
    /// Logs a tombstone, then removes the key from the map.
    pub fn delete(&self, key: &[u8]) -> Result<()> {
        self.check_key(key)?;
        self.submit_entry(Entry::delete(key))
    }

    /// Iterate live pairs within `range`, in key order
    pub fn scan<R: RangeBounds<Vec<u8>>>(&self, range: R) -> ScanIter {
        ScanIter::new(
            Arc::clone(&self.memtable),
            range.start_bound().cloned(),
            range.end_bound().cloned(),
        )
    }

    /// Snapshot the map and compact the WAL behind it
    ///
    /// Returns the log id the snapshot covers, or `None` if nothing new has
    /// been logged since the last checkpoint.
    pub fn checkpoint(&self) -> Result<Option<u64>> {
        self.submit(|reply| WriteCommand::Checkpoint { reply })
    }

    /// Stop the engine gracefully
    ///
    /// Drains queued writes, then syncs and closes the WAL. Later mutations
    /// fail with `EngineStopped`; reads keep working. Safe to call twice.
    pub fn stop(&self) -> Result<()> {
        let Some(sender) = self.commands.write().take() else {
            return Ok(());
        };
        drop(sender);

        let Some(worker) = self.worker.lock().take() else {
            return Ok(());
        };
        let result = worker
            .join()
            .map_err(|_| KvError::EngineFailed("writer thread panicked".to_string()))?;

        info!(data_dir = %self.config.data_dir.display(), "engine stopped");
        result
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.len() > self.config.max_key_size {
            return Err(KvError::InvalidKey(format!(
                "key of {} bytes exceeds the {}-byte limit",
                key.len(),
                self.config.max_key_size
            )));
        }
        Ok(())
    }

    fn submit_entry(&self, entry: Entry) -> Result<()> {
        self.submit(|reply| WriteCommand::Apply { entry, reply })
            .map(|_| ())
    }

    /// Queue a command for the writer and wait for its reply
    fn submit<T>(&self, command: impl FnOnce(Sender<Result<T>>) -> WriteCommand) -> Result<T> {
        let sender = self.commands.read().clone().ok_or(KvError::EngineStopped)?;

        let (reply, response) = channel::bounded(1);
        sender
            .send(command(reply))
            .map_err(|_| KvError::EngineStopped)?;
        response.recv().map_err(|_| KvError::EngineStopped)?
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Number of live keys
    pub fn len(&self) -> usize {
        self.memtable.live_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Id of the newest logged mutation, whether still in the WAL or already
    /// covered by a checkpoint
    pub fn last_log_id(&self) -> Option<u64> {
        *self.shared.last_id.lock()
    }

    /// Whether a fatal WAL error has halted writes
    pub fn is_failed(&self) -> bool {
        self.shared.failure.lock().is_some()
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Get the approximate memtable size
    pub fn memtable_size(&self) -> usize {
        self.memtable.size()
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            error!(error = %e, "engine did not stop cleanly");
        }
    }
}
