//! Snapshot file checkpoint
//!
//! ## File Format
//! ```text
//! ┌───────────┬─────────────┬───────────┬──────────────┬──────────────────┐
//! │ Magic (4) │ Version (4) │ CRC32 (4) │ BodyLen (8)  │ Body (bincode)   │
//! └───────────┴─────────────┴───────────┴──────────────┴──────────────────┘
//! ```
//! The CRC covers the body. The file is replaced atomically: written to
//! `snapshot.ckpt.tmp`, fsync'd, renamed, then the directory is fsync'd.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{KvError, Result};

use super::{Checkpoint, Snapshot};

/// Magic bytes identifying a snapshot file ("MKCP")
const MAGIC: u32 = 0x4D4B_4350;

/// Current snapshot format version
const VERSION: u32 = 1;

/// Magic (4) + Version (4) + CRC (4) + BodyLen (8)
const HEADER_SIZE: usize = 20;

#[derive(Serialize)]
struct SnapshotBodyRef<'a> {
    last_applied_id: u64,
    entries: &'a [(Vec<u8>, Vec<u8>)],
}

#[derive(Deserialize)]
struct SnapshotBody {
    last_applied_id: u64,
    entries: Vec<(Vec<u8>, Vec<u8>)>,
}

/// Checkpoint kept as a single snapshot file
pub struct SnapshotCheckpoint {
    dir: PathBuf,
}

impl SnapshotCheckpoint {
    const FILE_NAME: &'static str = "snapshot.ckpt";
    const TEMP_FILE_NAME: &'static str = "snapshot.ckpt.tmp";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Path of the snapshot file
    pub fn path(&self) -> PathBuf {
        self.dir.join(Self::FILE_NAME)
    }

    fn corrupt(path: &Path, reason: impl Into<String>) -> KvError {
        KvError::Checkpoint(format!("{} is corrupt: {}", path.display(), reason.into()))
    }
}

impl Checkpoint for SnapshotCheckpoint {
    fn load(&mut self) -> Result<Option<Snapshot>> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }

        let data = fs::read(&path)?;
        if data.len() < HEADER_SIZE {
            return Err(Self::corrupt(&path, "truncated header"));
        }

        let mut header = &data[..HEADER_SIZE];
        let magic = header.get_u32();
        let version = header.get_u32();
        let crc = header.get_u32();
        let body_len = header.get_u64();

        if magic != MAGIC {
            return Err(Self::corrupt(&path, format!("bad magic 0x{:08x}", magic)));
        }
        if version != VERSION {
            return Err(Self::corrupt(
                &path,
                format!("unsupported version {}", version),
            ));
        }

        let body = &data[HEADER_SIZE..];
        if body.len() as u64 != body_len {
            return Err(Self::corrupt(
                &path,
                format!("body is {} bytes, header says {}", body.len(), body_len),
            ));
        }
        if crc32fast::hash(body) != crc {
            return Err(Self::corrupt(&path, "checksum mismatch"));
        }

        let body: SnapshotBody = bincode::deserialize(body)
            .map_err(|e| Self::corrupt(&path, format!("undecodable body: {}", e)))?;

        info!(
            path = %path.display(),
            entries = body.entries.len(),
            last_applied_id = body.last_applied_id,
            "checkpoint loaded"
        );
        Ok(Some(Snapshot {
            entries: body.entries,
            last_applied_id: body.last_applied_id,
        }))
    }

    fn save(&mut self, entries: &[(Vec<u8>, Vec<u8>)], up_to_id: u64) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| KvError::Checkpoint(format!("cannot create {}: {}", self.dir.display(), e)))?;

        let body = bincode::serialize(&SnapshotBodyRef {
            last_applied_id: up_to_id,
            entries,
        })
        .map_err(|e| KvError::Checkpoint(format!("cannot encode snapshot: {}", e)))?;

        let mut contents = Vec::with_capacity(HEADER_SIZE + body.len());
        contents.put_u32(MAGIC);
        contents.put_u32(VERSION);
        contents.put_u32(crc32fast::hash(&body));
        contents.put_u64(body.len() as u64);
        contents.extend_from_slice(&body);

        let temp_path = self.dir.join(Self::TEMP_FILE_NAME);
        let path = self.path();
        write_atomically(&self.dir, &temp_path, &path, &contents)
            .map_err(|e| KvError::Checkpoint(format!("cannot write {}: {}", path.display(), e)))?;

        debug!(
            path = %path.display(),
            entries = entries.len(),
            up_to_id,
            "checkpoint saved"
        );
        Ok(())
    }
}

/// Write-then-rename, with the file and its directory fsync'd
fn write_atomically(dir: &Path, temp_path: &Path, path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(temp_path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    drop(file);

    fs::rename(temp_path, path)?;

    #[cfg(unix)]
    File::open(dir)?.sync_all()?;
    #[cfg(not(unix))]
    let _ = dir;

    Ok(())
}
