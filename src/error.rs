//! Error types for minikv
//!
//! Provides a unified error type for all operations.
//!
//! Errors fall into two classes. Fatal errors mean the write-ahead log can no
//! longer be trusted (corruption, failed write/fsync/truncate) and the engine
//! must stop accepting mutations. Everything else is a request-level error
//! that leaves engine state untouched. See [`KvError::is_fatal`].

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for minikv operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("fatal: IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // WAL Errors
    // -------------------------------------------------------------------------
    #[error("fatal: WAL header of {} is corrupt: {reason}", .path.display())]
    CorruptHeader { path: PathBuf, reason: String },

    #[error("fatal: WAL {} is corrupt at offset {offset}: {reason}", .path.display())]
    WalCorruption {
        path: PathBuf,
        offset: u64,
        reason: String,
    },

    #[error("fatal: WAL write failed: {0}")]
    WalWrite(String),

    #[error("WAL has not been loaded")]
    WalNotLoaded,

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Codec error: {0}")]
    Codec(String),

    // -------------------------------------------------------------------------
    // Checkpoint Errors
    // -------------------------------------------------------------------------
    #[error("Checkpoint error: {0}")]
    Checkpoint(String),

    #[error("Checkpointing is disabled")]
    CheckpointDisabled,

    // -------------------------------------------------------------------------
    // Engine Errors
    // -------------------------------------------------------------------------
    #[error("Engine is stopped")]
    EngineStopped,

    #[error("fatal: engine halted after an unrecoverable WAL error: {0}")]
    EngineFailed(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl KvError {
    /// Whether this error means the log (and therefore the engine) can no
    /// longer continue safely.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            KvError::Io(_)
                | KvError::CorruptHeader { .. }
                | KvError::WalCorruption { .. }
                | KvError::WalWrite(_)
                | KvError::EngineFailed(_)
        )
    }
}

impl From<bincode::Error> for KvError {
    fn from(err: bincode::Error) -> Self {
        KvError::Codec(err.to_string())
    }
}
