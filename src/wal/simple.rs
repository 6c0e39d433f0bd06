//! Single-file WAL
//!
//! Owns the log file handle, the id counter and the offset index. The append
//! path lives in `writer.rs`, compaction in `compaction.rs`.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::{debug, info, trace, warn};

use crate::error::{KvError, Result};
use crate::mempool::MemPool;

use super::compaction::write_staging;
use super::reader::RecordIter;
use super::record::check_header;
use super::{LogEntry, WalEntry, WriteAheadLog, WAL_HEADER_LEN, WAL_MAGIC};

/// File-backed write-ahead log storing entries of type `E`
pub struct SimpleWal<E> {
    /// Directory holding the log (and its compaction staging file)
    pub(super) dir: PathBuf,

    /// Path of the log file
    pub(super) path: PathBuf,

    /// Open handle, positioned at the end of the log once loaded
    pub(super) file: Option<File>,

    /// Current length of the log file
    pub(super) file_size: u32,

    /// Id the next append will receive
    pub(super) next_id: u64,

    /// Log id → offset of the record's final byte
    pub(super) index: BTreeMap<u64, u32>,

    pub(super) loaded: bool,

    pub(super) pool: MemPool,

    _entry: PhantomData<fn() -> E>,
}

impl<E: LogEntry> SimpleWal<E> {
    /// Name of the log file inside its directory
    pub const FILE_NAME: &'static str = "wal.log";

    /// Name of the staging file written during compaction and log creation
    pub const COMPACT_FILE_NAME: &'static str = "wal.log.compact";

    /// Create a log rooted at `dir`. Nothing touches the disk until `init`.
    pub fn new(dir: impl Into<PathBuf>, pool: MemPool) -> Self {
        let dir = dir.into();
        let path = dir.join(Self::FILE_NAME);
        Self {
            dir,
            path,
            file: None,
            file_size: 0,
            next_id: 0,
            index: BTreeMap::new(),
            loaded: false,
            pool,
            _entry: PhantomData,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Path of the log file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current log file length in bytes
    pub fn file_size(&self) -> u64 {
        self.file_size as u64
    }

    /// Id the next append will be assigned
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Offset of the last byte of record `id`, if it is still in the log
    pub fn end_offset(&self, id: u64) -> Option<u32> {
        self.index.get(&id).copied()
    }

    /// Number of records currently in the log
    pub fn record_count(&self) -> usize {
        self.index.len()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    // =========================================================================
    // Loading
    // =========================================================================

    /// Open (or create) the log file and decode every record in it
    fn load_entries(&mut self) -> Result<Vec<WalEntry<E>>> {
        self.index.clear();
        self.next_id = 0;

        if !self.path.exists() {
            // Staged and renamed in, so a crash never leaves a partial header
            debug!(path = %self.path.display(), "creating WAL file");
            let staging = self.dir.join(Self::COMPACT_FILE_NAME);
            write_staging(&staging, &[])?;
            fs::rename(&staging, &self.path)?;
            sync_dir(&self.dir)?;

            let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
            file.seek(SeekFrom::End(0))?;
            self.file = Some(file);
            self.file_size = WAL_HEADER_LEN;
            return Ok(Vec::new());
        }

        let mut file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        let size = file.metadata()?.len();

        if size == 0 {
            debug!(path = %self.path.display(), "WAL file is empty");
            self.file = Some(file);
            self.file_size = 0;
            return Ok(Vec::new());
        }
        if size < WAL_HEADER_LEN as u64 {
            return Err(KvError::CorruptHeader {
                path: self.path.clone(),
                reason: format!(
                    "file is {} bytes, shorter than the {}-byte header",
                    size, WAL_HEADER_LEN
                ),
            });
        }
        if size > u32::MAX as u64 {
            return Err(KvError::WalCorruption {
                path: self.path.clone(),
                offset: size,
                reason: "file exceeds the 4 GiB offset space".to_string(),
            });
        }

        let mut entries = Vec::new();
        let (valid_len, torn) = {
            // SAFETY: private read-only mapping of a file only this log writes;
            // it is dropped (unmapped) before the file is modified again.
            let map = unsafe { Mmap::map(&file)? };
            check_header(&map, &self.path)?;

            let mut records = RecordIter::new(&map, &self.path);
            for record in records.by_ref() {
                let record = record?;
                let entry = E::decode(record.payload).map_err(|e| KvError::WalCorruption {
                    path: self.path.clone(),
                    offset: record.start as u64,
                    reason: format!("undecodable entry in record {}: {}", record.id, e),
                })?;

                trace!(id = record.id, offset = record.start, "replayed WAL record");
                self.index.insert(record.id, record.end_offset());
                entries.push(WalEntry {
                    id: record.id,
                    entry,
                });
            }
            (records.valid_len(), records.is_torn())
        };

        if torn {
            warn!(
                path = %self.path.display(),
                valid_len,
                file_size = size,
                "discarding incomplete record at the end of the WAL"
            );
            file.set_len(valid_len as u64)?;
            file.sync_all()?;
        }

        file.seek(SeekFrom::End(0))?;
        self.file = Some(file);
        self.file_size = valid_len as u32;
        self.next_id = entries.last().map(|e| e.id + 1).unwrap_or(0);
        Ok(entries)
    }

    /// Handle of a loaded log
    pub(super) fn file_mut(&mut self) -> Result<&mut File> {
        self.file.as_mut().ok_or(KvError::WalNotLoaded)
    }

    /// Write the magic header into an empty log
    pub(super) fn write_header(&mut self) -> Result<()> {
        let file = self.file_mut()?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&WAL_MAGIC.to_be_bytes())?;
        file.sync_data()?;
        self.file_size = WAL_HEADER_LEN;
        Ok(())
    }
}

impl<E: LogEntry> WriteAheadLog<E> for SimpleWal<E> {
    fn init(&mut self) -> Result<()> {
        fs::create_dir_all(&self.dir)?;

        if self.path.is_dir() {
            return Err(KvError::Config(format!(
                "WAL path {} is a directory",
                self.path.display()
            )));
        }

        // A leftover staging file means compaction died before its rename;
        // the log itself is still the complete, older version.
        let staging = self.dir.join(Self::COMPACT_FILE_NAME);
        if staging.exists() {
            warn!(path = %staging.display(), "removing unfinished WAL compaction");
            fs::remove_file(&staging)?;
        }

        Ok(())
    }

    fn append_entry(&mut self, entry: &E) -> Result<u64> {
        self.append_record(entry)
    }

    fn load(&mut self, apply: &mut dyn FnMut(Vec<WalEntry<E>>)) -> Result<()> {
        let entries = self.load_entries()?;
        self.loaded = true;

        info!(
            path = %self.path.display(),
            records = entries.len(),
            next_id = self.next_id,
            "WAL loaded"
        );
        apply(entries);
        Ok(())
    }

    fn resume_ids(&mut self, next_id: u64) {
        if next_id > self.next_id {
            debug!(from = self.next_id, to = next_id, "resuming WAL ids past the checkpoint");
            self.next_id = next_id;
        }
    }

    fn truncate_ahead(&mut self, id: u64) -> Result<bool> {
        self.truncate_through(id)
    }

    fn reset(&mut self) -> Result<()> {
        let file = self.file_mut()?;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.sync_all()?;

        self.file_size = 0;
        self.next_id = 0;
        self.index.clear();
        debug!(path = %self.path.display(), "WAL reset");
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.sync_all()?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.sync()?;
        self.file = None;
        self.loaded = false;
        Ok(())
    }
}

/// Fsync a directory so renames and creations inside it are durable
#[cfg(unix)]
pub(super) fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
pub(super) fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
