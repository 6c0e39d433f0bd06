//! WAL compaction (truncate-ahead)
//!
//! Drops the prefix of the log that a checkpoint has made redundant.
//!
//! The surviving suffix is never rewritten in place. It is staged as a
//! complete log in `wal.log.compact` (header, then every surviving record with
//! its trailing start offset moved to its new position), fsync'd, and renamed
//! over `wal.log`. A crash before the rename leaves the old log intact and a
//! stale staging file that `init` removes; a crash after it leaves the new log.

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use bytes::{Buf, BufMut};
use tracing::debug;

use crate::error::{KvError, Result};

use super::simple::sync_dir;
use super::{LogEntry, SimpleWal, RECORD_PREFIX_LEN, WAL_HEADER_LEN, WAL_MAGIC, WAL_OFFSET_LEN};

impl<E: LogEntry> SimpleWal<E> {
    /// Discard every record with id `<= id`
    pub(super) fn truncate_through(&mut self, id: u64) -> Result<bool> {
        if !self.loaded {
            return Err(KvError::WalNotLoaded);
        }

        let Some(&end_offset) = self.index.get(&id) else {
            return Ok(false);
        };
        if self.file_size == 0 {
            return Ok(true);
        }

        let offset = end_offset + 1;
        if offset == self.file_size {
            self.clear_records()?;
            debug!(id, path = %self.path.display(), "WAL truncated to header");
            return Ok(true);
        }

        // Read the surviving suffix [offset, file_size)
        let suffix_len = (self.file_size - offset) as usize;
        let mut suffix = self.pool.acquire(suffix_len);
        {
            let file = self.file_mut()?;
            file.seek(SeekFrom::Start(offset as u64))?;
            suffix.read_exact_from(file, suffix_len)?;
            file.seek(SeekFrom::End(0))?;
        }

        rebase_records(suffix.as_mut_slice(), offset, &self.path)?;

        let staging = self.dir.join(Self::COMPACT_FILE_NAME);
        write_staging(&staging, &suffix)?;
        fs::rename(&staging, &self.path)?;
        sync_dir(&self.dir)?;

        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        file.seek(SeekFrom::End(0))?;
        self.file = Some(file);
        self.file_size = WAL_HEADER_LEN + suffix_len as u32;

        let shift = offset - WAL_HEADER_LEN;
        let mut kept = self.index.split_off(&id);
        kept.remove(&id);
        for end in kept.values_mut() {
            *end -= shift;
        }
        self.index = kept;

        debug!(
            id,
            kept = self.index.len(),
            file_size = self.file_size,
            "WAL truncated ahead"
        );
        Ok(true)
    }

    /// Drop every record, keeping the header
    fn clear_records(&mut self) -> Result<()> {
        let file = self.file_mut()?;
        file.set_len(WAL_HEADER_LEN as u64)?;
        file.sync_all()?;
        file.seek(SeekFrom::End(0))?;

        self.file_size = WAL_HEADER_LEN;
        self.index.clear();
        Ok(())
    }
}

/// Move each record's trailing start offset from `old_base + pos` to
/// `WAL_HEADER_LEN + pos`, checking the old value on the way
fn rebase_records(records: &mut [u8], old_base: u32, path: &Path) -> Result<()> {
    let corrupt = |pos: usize, reason: String| KvError::WalCorruption {
        path: path.to_path_buf(),
        offset: old_base as u64 + pos as u64,
        reason,
    };

    let mut pos = 0;
    while pos < records.len() {
        if records.len() - pos < RECORD_PREFIX_LEN + WAL_OFFSET_LEN {
            return Err(corrupt(pos, "truncated record header".to_string()));
        }

        let len = (&records[pos..]).get_u32() as usize;
        let trailer_at = pos + RECORD_PREFIX_LEN + len;
        if trailer_at + WAL_OFFSET_LEN > records.len() {
            return Err(corrupt(pos, format!("record of {} bytes runs past the log", len)));
        }

        let old_start = old_base + pos as u32;
        let recorded = (&records[trailer_at..]).get_u32();
        if recorded != old_start {
            return Err(corrupt(
                pos,
                format!("trailing start offset {} does not match {}", recorded, old_start),
            ));
        }

        let new_start = WAL_HEADER_LEN + pos as u32;
        (&mut records[trailer_at..trailer_at + WAL_OFFSET_LEN]).put_u32(new_start);
        pos = trailer_at + WAL_OFFSET_LEN;
    }
    Ok(())
}

/// Write `header + records` to `path` and fsync it
pub(super) fn write_staging(path: &Path, records: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(&WAL_MAGIC.to_be_bytes())?;
    file.write_all(records)?;
    file.sync_all()?;
    Ok(())
}
