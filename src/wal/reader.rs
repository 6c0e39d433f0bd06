//! WAL Reader
//!
//! Sequential scan over the bytes of a log file.

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{KvError, Result};

use super::record::{check_header, check_torn_tail, parse_record, Parsed, RawRecord};
use super::WAL_HEADER_LEN;

/// Iterator over the records of a whole-log byte slice (header included)
///
/// Stops at the end of the data, at a torn final record, or after yielding
/// the first corruption error. A "torn" record with complete records behind
/// it is reported as corruption.
pub(crate) struct RecordIter<'a> {
    log: &'a [u8],
    path: &'a Path,
    offset: usize,
    torn: bool,
    failed: bool,
}

impl<'a> RecordIter<'a> {
    /// Start scanning right after the header (which the caller has checked)
    pub fn new(log: &'a [u8], path: &'a Path) -> Self {
        Self {
            log,
            path,
            offset: WAL_HEADER_LEN as usize,
            torn: false,
            failed: false,
        }
    }

    /// Length of the log up to the end of the last complete record
    pub fn valid_len(&self) -> usize {
        self.offset
    }

    /// Whether the scan ended on an incomplete record
    pub fn is_torn(&self) -> bool {
        self.torn
    }
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = Result<RawRecord<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.torn || self.failed || self.offset >= self.log.len() {
            return None;
        }

        match parse_record(self.log, self.offset, self.path) {
            Ok(Parsed::Record(record)) => {
                self.offset += record.len();
                Some(Ok(record))
            }
            Ok(Parsed::Torn) => match check_torn_tail(self.log, self.offset, self.path) {
                Ok(()) => {
                    self.torn = true;
                    None
                }
                Err(e) => {
                    self.failed = true;
                    Some(Err(e))
                }
            },
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Location of one record, as reported by [`inspect`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordInfo {
    pub id: u64,
    pub start_offset: u64,
    pub payload_len: usize,
}

/// Summary of a read-only scan of a log file
#[derive(Debug, Clone, Default)]
pub struct WalInspection {
    pub file_size: u64,
    pub records: Vec<RecordInfo>,

    /// Offset of an incomplete final record, if any
    pub torn_tail_at: Option<u64>,
}

/// Validate a log file without modifying it
pub fn inspect(path: &Path) -> Result<WalInspection> {
    let file = File::open(path)?;
    let file_size = file.metadata()?.len();
    if file_size == 0 {
        return Ok(WalInspection::default());
    }
    if file_size > u32::MAX as u64 {
        return Err(KvError::WalCorruption {
            path: path.to_path_buf(),
            offset: file_size,
            reason: "file exceeds the 4 GiB offset space".to_string(),
        });
    }

    // SAFETY: read-only private mapping, dropped before returning.
    let map = unsafe { Mmap::map(&file)? };
    check_header(&map, path)?;

    let mut records = Vec::new();
    let mut iter = RecordIter::new(&map, path);
    for record in iter.by_ref() {
        let record = record?;
        records.push(RecordInfo {
            id: record.id,
            start_offset: record.start as u64,
            payload_len: record.payload.len(),
        });
    }

    Ok(WalInspection {
        file_size,
        records,
        torn_tail_at: iter.is_torn().then(|| iter.valid_len() as u64),
    })
}
