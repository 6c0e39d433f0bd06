//! WAL record layout
//!
//! Encoding of one `[len][log_id][payload][start_offset]` record and the
//! checks a reader applies before trusting it.

use std::path::Path;

use bytes::Buf;

use crate::error::{KvError, Result};
use crate::mempool::PooledBuffer;

/// Magic number at the start of every log file ("MKV1")
pub const WAL_MAGIC: u32 = 0x4D4B_5631;

/// Width of the magic header
pub const WAL_HEADER_LEN: u32 = 4;

/// Width of the payload length field
pub const WAL_SIZE_LEN: usize = 4;

/// Width of the log id field
pub const WAL_ID_LEN: usize = 8;

/// Width of the trailing start offset field
pub const WAL_OFFSET_LEN: usize = 4;

/// Bytes before the payload: Len (4) + LogId (8)
pub const RECORD_PREFIX_LEN: usize = WAL_SIZE_LEN + WAL_ID_LEN;

/// Bytes a record adds around its payload
pub const RECORD_OVERHEAD: usize = RECORD_PREFIX_LEN + WAL_OFFSET_LEN;

/// Total on-disk size of a record carrying `payload_len` bytes
pub(crate) fn record_len(payload_len: usize) -> usize {
    payload_len + RECORD_OVERHEAD
}

/// Append a complete record to `out`
pub(crate) fn encode_record(out: &mut PooledBuffer, id: u64, payload: &[u8], start_offset: u32) {
    out.put_u32(payload.len() as u32);
    out.put_u64(id);
    out.extend_from_slice(payload);
    out.put_u32(start_offset);
}

/// Check the magic header of a whole-log byte slice
pub(crate) fn check_header(log: &[u8], path: &Path) -> Result<()> {
    if log.len() < WAL_HEADER_LEN as usize {
        return Err(KvError::CorruptHeader {
            path: path.to_path_buf(),
            reason: format!(
                "file is {} bytes, shorter than the {}-byte header",
                log.len(),
                WAL_HEADER_LEN
            ),
        });
    }

    let magic = (&log[..WAL_HEADER_LEN as usize]).get_u32();
    if magic != WAL_MAGIC {
        return Err(KvError::CorruptHeader {
            path: path.to_path_buf(),
            reason: format!("bad magic 0x{:08x}, expected 0x{:08x}", magic, WAL_MAGIC),
        });
    }
    Ok(())
}

/// A validated record borrowed from the log bytes
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawRecord<'a> {
    pub id: u64,
    pub start: u32,
    pub payload: &'a [u8],
}

impl RawRecord<'_> {
    /// On-disk size of the record
    pub fn len(&self) -> usize {
        record_len(self.payload.len())
    }

    /// Offset of the record's final byte
    pub fn end_offset(&self) -> u32 {
        self.start + self.len() as u32 - 1
    }
}

/// Outcome of parsing at one offset
pub(crate) enum Parsed<'a> {
    Record(RawRecord<'a>),

    /// The record runs past the end of the data: an append that never completed
    Torn,
}

/// Parse the record that begins at `offset` of a whole-log byte slice
pub(crate) fn parse_record<'a>(log: &'a [u8], offset: usize, path: &Path) -> Result<Parsed<'a>> {
    let rest = &log[offset..];
    if rest.len() < RECORD_PREFIX_LEN {
        return Ok(Parsed::Torn);
    }

    let mut prefix = &rest[..RECORD_PREFIX_LEN];
    let len = prefix.get_u32() as usize;
    let id = prefix.get_u64();

    let total = record_len(len);
    if rest.len() < total {
        return Ok(Parsed::Torn);
    }

    let trailer_at = RECORD_PREFIX_LEN + len;
    let recorded_start = (&rest[trailer_at..total]).get_u32();
    if recorded_start as usize != offset {
        return Err(KvError::WalCorruption {
            path: path.to_path_buf(),
            offset: offset as u64,
            reason: format!(
                "record {} claims to start at {}, found at {}",
                id, recorded_start, offset
            ),
        });
    }

    Ok(Parsed::Record(RawRecord {
        id,
        start: offset as u32,
        payload: &rest[RECORD_PREFIX_LEN..trailer_at],
    }))
}

/// Confirm that the bytes from `offset` to the end are an unfinished append
///
/// A torn append is the last thing written, so no complete record can follow
/// it. A damaged length field in front of intact records shows up as a
/// "torn" record with whole records behind it, and is corruption.
pub(crate) fn check_torn_tail(log: &[u8], offset: usize, path: &Path) -> Result<()> {
    let end = log.len();

    // The record itself is complete but its length field disagrees
    if end - offset >= RECORD_OVERHEAD {
        let trailer = (&log[end - WAL_OFFSET_LEN..]).get_u32();
        if trailer as usize == offset {
            return Err(KvError::WalCorruption {
                path: path.to_path_buf(),
                offset: offset as u64,
                reason: "length field runs past the end of the log, but the record is complete"
                    .to_string(),
            });
        }
    }

    for later in (offset + 1)..=end.saturating_sub(RECORD_OVERHEAD) {
        if complete_record_at(log, later) {
            return Err(KvError::WalCorruption {
                path: path.to_path_buf(),
                offset: offset as u64,
                reason: format!(
                    "length field runs past the end of the log, but a complete record follows at {}",
                    later
                ),
            });
        }
    }
    Ok(())
}

/// Whether a record starting at `at` fits in `log` and carries `at` as its trailing offset
fn complete_record_at(log: &[u8], at: usize) -> bool {
    let mut prefix = &log[at..at + RECORD_PREFIX_LEN];
    let len = prefix.get_u32() as usize;
    let Some(end) = at.checked_add(record_len(len)).filter(|&end| end <= log.len()) else {
        return false;
    };
    (&log[end - WAL_OFFSET_LEN..end]).get_u32() as usize == at
}
