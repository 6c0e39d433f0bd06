//! Configuration for minikv
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::error::{KvError, Result};

/// Main configuration for a minikv instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── wal/wal.log                 (write-ahead log)
    ///     └── checkpoint/snapshot.ckpt    (latest checkpoint)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Checkpoint Configuration
    // -------------------------------------------------------------------------
    /// Whether snapshots are taken (and therefore whether the WAL is ever compacted)
    pub checkpoint: CheckpointMode,

    /// Take a checkpoint automatically after this many logged mutations
    pub checkpoint_interval: Option<u64>,

    // -------------------------------------------------------------------------
    // Writer Configuration
    // -------------------------------------------------------------------------
    /// Capacity of the queue feeding the single writer thread
    pub max_pending_writes: usize,

    /// Largest accepted key (bytes)
    pub max_key_size: usize,

    /// Largest accepted value (bytes)
    pub max_value_size: usize,

    // -------------------------------------------------------------------------
    // Memory Pool Configuration
    // -------------------------------------------------------------------------
    /// Size of each pooled block (bytes)
    pub mempool_block_size: usize,

    /// Number of released blocks kept for reuse
    pub mempool_max_cached_blocks: usize,
}

/// Checkpoint strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointMode {
    /// Persist snapshots to `{data_dir}/checkpoint` and compact the WAL behind them
    Snapshot,

    /// Never snapshot; the WAL grows until reset
    Disabled,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./minikv_data"),
            checkpoint: CheckpointMode::Snapshot,
            checkpoint_interval: None,
            max_pending_writes: 1024,
            max_key_size: 64 * 1024,          // 64 KB
            max_value_size: 16 * 1024 * 1024, // 16 MB
            mempool_block_size: 4096,
            mempool_max_cached_blocks: 256,
        }
    }
}

impl Config {
    const WAL_DIR: &'static str = "wal";
    const CHECKPOINT_DIR: &'static str = "checkpoint";

    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Directory holding the write-ahead log
    pub fn wal_dir(&self) -> PathBuf {
        self.data_dir.join(Self::WAL_DIR)
    }

    /// Directory holding checkpoint snapshots
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.data_dir.join(Self::CHECKPOINT_DIR)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(KvError::Config("data_dir must not be empty".to_string()));
        }
        if self.max_pending_writes == 0 {
            return Err(KvError::Config(
                "max_pending_writes must be at least 1".to_string(),
            ));
        }
        if self.mempool_block_size == 0 {
            return Err(KvError::Config(
                "mempool_block_size must be at least 1".to_string(),
            ));
        }
        if self.max_key_size == 0 || self.max_value_size == 0 {
            return Err(KvError::Config(
                "key and value size limits must be non-zero".to_string(),
            ));
        }
        if self.checkpoint_interval == Some(0) {
            return Err(KvError::Config(
                "checkpoint_interval must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the checkpoint mode
    pub fn checkpoint(mut self, mode: CheckpointMode) -> Self {
        self.config.checkpoint = mode;
        self
    }

    /// Checkpoint automatically after `count` logged mutations
    pub fn checkpoint_interval(mut self, count: u64) -> Self {
        self.config.checkpoint_interval = Some(count);
        self
    }

    /// Set the writer queue capacity
    pub fn max_pending_writes(mut self, count: usize) -> Self {
        self.config.max_pending_writes = count;
        self
    }

    /// Set the maximum key size (in bytes)
    pub fn max_key_size(mut self, size: usize) -> Self {
        self.config.max_key_size = size;
        self
    }

    /// Set the maximum value size (in bytes)
    pub fn max_value_size(mut self, size: usize) -> Self {
        self.config.max_value_size = size;
        self
    }

    /// Set the memory pool block size (in bytes)
    pub fn mempool_block_size(mut self, size: usize) -> Self {
        self.config.mempool_block_size = size;
        self
    }

    /// Set how many released blocks the memory pool keeps around
    pub fn mempool_max_cached_blocks(mut self, count: usize) -> Self {
        self.config.mempool_max_cached_blocks = count;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
