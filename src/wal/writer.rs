//! WAL Writer
//!
//! Handles appending entries to the WAL file.

use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};

use tracing::{error, trace};

use crate::error::{KvError, Result};

use super::record::{encode_record, record_len};
use super::{LogEntry, SimpleWal};

impl<E: LogEntry> SimpleWal<E> {
    /// Encode `entry`, write it as one record and fsync before returning its id
    pub(super) fn append_record(&mut self, entry: &E) -> Result<u64> {
        if !self.loaded {
            return Err(KvError::WalNotLoaded);
        }

        let payload = entry.encode(&self.pool)?;

        // A reset log has no header yet.
        if self.file_size == 0 {
            self.write_header()?;
        }

        let start = self.file_size;
        let size = record_len(payload.len());
        let end = u32::try_from(start as u64 + size as u64).map_err(|_| {
            KvError::WalWrite(format!(
                "record of {} bytes would push {} past the 4 GiB offset space",
                size,
                self.path.display()
            ))
        })?;

        let id = self.next_id;
        let mut frame = self.pool.acquire(size);
        encode_record(&mut frame, id, &payload, start);
        drop(payload);

        let written = write_durably(self.file_mut()?, &frame, start);
        if let Err(e) = written {
            return Err(KvError::WalWrite(format!(
                "append of record {} to {} failed: {}",
                id,
                self.path.display(),
                e
            )));
        }

        self.file_size = end;
        self.index.insert(id, end - 1);
        self.next_id += 1;

        trace!(id, start, size, "appended WAL record");
        Ok(id)
    }
}

/// Write a whole record and fsync it; on failure cut the file back to `start`
fn write_durably(file: &mut File, bytes: &[u8], start: u32) -> io::Result<()> {
    let result = file.write_all(bytes).and_then(|()| file.sync_data());

    if result.is_err() {
        let rollback = file
            .set_len(start as u64)
            .and_then(|()| file.seek(SeekFrom::Start(start as u64)).map(|_| ()));
        if let Err(e) = rollback {
            error!(start, error = %e, "could not roll back a failed WAL append");
        }
    }

    result
}
