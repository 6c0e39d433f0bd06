//! MemPool implementation
//!
//! Free-list of equally sized blocks behind a mutex.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::PooledBuffer;

/// Shared state behind every [`MemPool`] handle and outstanding buffer
pub(super) struct PoolInner {
    block_size: usize,
    max_cached: usize,
    free: Mutex<Vec<Vec<u8>>>,
    outstanding: AtomicUsize,
}

impl PoolInner {
    /// Return a block to the pool (called from `PooledBuffer::drop`)
    pub(super) fn give_back(&self, mut block: Vec<u8>, pooled: bool) {
        self.outstanding.fetch_sub(1, Ordering::AcqRel);

        // Oversized requests and blocks that grew past twice the block size are freed.
        if !pooled || block.capacity() < self.block_size || block.capacity() > self.block_size * 2 {
            return;
        }

        block.clear();
        let mut free = self.free.lock();
        if free.len() < self.max_cached {
            free.push(block);
        }
    }
}

/// Pool of reusable byte blocks
#[derive(Clone)]
pub struct MemPool {
    inner: Arc<PoolInner>,
}

impl MemPool {
    /// Create a pool of `block_size`-byte blocks caching at most `max_cached` of them
    pub fn new(block_size: usize, max_cached: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                block_size: block_size.max(1),
                max_cached,
                free: Mutex::new(Vec::new()),
                outstanding: AtomicUsize::new(0),
            }),
        }
    }

    /// Get an empty buffer able to hold at least `size` bytes
    pub fn acquire(&self, size: usize) -> PooledBuffer {
        self.inner.outstanding.fetch_add(1, Ordering::AcqRel);

        if size <= self.inner.block_size {
            let block = self
                .inner
                .free
                .lock()
                .pop()
                .unwrap_or_else(|| Vec::with_capacity(self.inner.block_size));
            PooledBuffer::new(block, true, Arc::clone(&self.inner))
        } else {
            PooledBuffer::new(Vec::with_capacity(size), false, Arc::clone(&self.inner))
        }
    }

    /// Give a buffer back. Dropping the buffer has the same effect.
    pub fn release(&self, buffer: PooledBuffer) {
        drop(buffer);
    }

    /// Size of each pooled block
    pub fn block_size(&self) -> usize {
        self.inner.block_size
    }

    /// Buffers acquired and not yet released
    pub fn outstanding(&self) -> usize {
        self.inner.outstanding.load(Ordering::Acquire)
    }

    /// Released blocks currently waiting for reuse
    pub fn cached(&self) -> usize {
        self.inner.free.lock().len()
    }
}

impl Default for MemPool {
    fn default() -> Self {
        Self::new(4096, 256)
    }
}

impl std::fmt::Debug for MemPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemPool")
            .field("block_size", &self.inner.block_size)
            .field("max_cached", &self.inner.max_cached)
            .field("outstanding", &self.outstanding())
            .field("cached", &self.cached())
            .finish()
    }
}
