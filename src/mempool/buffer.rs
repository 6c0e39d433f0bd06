//! Pooled buffer
//!
//! A contiguous byte range with a write cursor (the end of the data) and an
//! independent read cursor.

use std::io::{self, Read, Write};
use std::ops::Deref;
use std::sync::Arc;

use bytes::{Buf, BufMut};

use super::pool::PoolInner;

/// Byte buffer borrowed from a [`MemPool`](super::MemPool)
///
/// Returned to its pool when dropped, on every exit path.
pub struct PooledBuffer {
    data: Vec<u8>,
    read_pos: usize,
    pooled: bool,
    pool: Arc<PoolInner>,
}

impl PooledBuffer {
    pub(super) fn new(data: Vec<u8>, pooled: bool, pool: Arc<PoolInner>) -> Self {
        Self {
            data,
            read_pos: 0,
            pooled,
            pool,
        }
    }

    /// Number of unread bytes
    pub fn len(&self) -> usize {
        self.data.len() - self.read_pos
    }

    /// Check if there is nothing left to read
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Allocated capacity of the underlying block
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Unread bytes
    pub fn as_slice(&self) -> &[u8] {
        &self.data[self.read_pos..]
    }

    /// Unread bytes, mutably
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[self.read_pos..]
    }

    /// Append bytes at the write cursor
    pub fn extend_from_slice(&mut self, bytes: &[u8]) {
        self.data.extend_from_slice(bytes);
    }

    /// Append a big-endian u32 at the write cursor
    pub fn put_u32(&mut self, n: u32) {
        self.data.put_u32(n);
    }

    /// Append a big-endian u64 at the write cursor
    pub fn put_u64(&mut self, n: u64) {
        self.data.put_u64(n);
    }

    /// Append exactly `n` bytes read from `reader`
    ///
    /// On failure the buffer is left as it was.
    pub fn read_exact_from<R: Read>(&mut self, reader: &mut R, n: usize) -> io::Result<()> {
        let start = self.data.len();
        self.data.resize(start + n, 0);
        if let Err(e) = reader.read_exact(&mut self.data[start..]) {
            self.data.truncate(start);
            return Err(e);
        }
        Ok(())
    }

    /// Move the read cursor forward by `n` bytes
    pub fn consume(&mut self, n: usize) {
        self.read_pos = (self.read_pos + n).min(self.data.len());
    }

    /// Drop all content, keeping the block
    pub fn clear(&mut self) {
        self.data.clear();
        self.read_pos = 0;
    }
}

impl Deref for PooledBuffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsRef<[u8]> for PooledBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl Buf for PooledBuffer {
    fn remaining(&self) -> usize {
        self.len()
    }

    fn chunk(&self) -> &[u8] {
        self.as_slice()
    }

    fn advance(&mut self, cnt: usize) {
        assert!(cnt <= self.len(), "advance past end of buffer");
        self.read_pos += cnt;
    }
}

impl Write for PooledBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.data.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        let data = std::mem::take(&mut self.data);
        self.pool.give_back(data, self.pooled);
    }
}

impl std::fmt::Debug for PooledBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledBuffer")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .field("pooled", &self.pooled)
            .finish()
    }
}
