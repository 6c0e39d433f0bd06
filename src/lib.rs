//! # minikv
//!
//! An embedded, durable key-value store with:
//! - Write-Ahead Logging (WAL) with an fsync before every acknowledgement
//! - Crash recovery that repairs a torn final record
//! - Single-writer/multi-reader concurrency model
//! - Checkpoint snapshots that let the WAL drop its covered prefix
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Engine (public API)                       │
//! │        get / scan            put / delete / checkpoint       │
//! └──────────┬───────────────────────────────┬──────────────────┘
//!            │ read lock                     │ bounded queue
//!            │                    ┌──────────▼──────────┐
//!            │                    │    Writer thread    │
//!            │                    │   (single writer)   │
//!            │                    └──┬───────┬───────┬──┘
//!            │          1. append    │       │       │ save, then
//!            │             + fsync   ▼       │       ▼ truncate_ahead
//!            │                ┌─────────┐    │  ┌────────────┐
//!            │                │   WAL   │    │  │ Checkpoint │
//!            │                │ (mmap   │    │  │ (snapshot) │
//!            │                │  replay)│    │  └────────────┘
//!            │                └─────────┘    │ 2. apply
//!            │                               ▼
//!            │                       ┌─────────────┐
//!            └──────────────────────►│  MemTable   │
//!                                    │  (RwLock)   │
//!                                    └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod mempool;
pub mod entry;
pub mod wal;
pub mod memtable;
pub mod checkpoint;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvError, Result};
pub use config::{CheckpointMode, Config};
pub use engine::{Engine, ScanIter};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of minikv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
