//! Memory Pool Module
//!
//! Reusable fixed-size byte blocks for encoding and I/O.
//!
//! ## Responsibilities
//! - Hand out blocks on `acquire(size)`, allocating only when the cache is empty
//! - Take blocks back when a [`PooledBuffer`] is released or dropped
//! - Keep a bounded number of released blocks for reuse
//!
//! The pool is an explicit, cloneable handle: the WAL and the engine each hold
//! one, and every buffer keeps the pool alive until it is returned. Requests
//! larger than the block size get a one-off allocation that is freed instead of
//! cached.

mod buffer;
mod pool;

pub use buffer::PooledBuffer;
pub use pool::MemPool;
