//! Range scans
//!
//! Lazy, restartable iteration over live pairs in key order.

use std::collections::VecDeque;
use std::ops::Bound;
use std::sync::Arc;

use crate::memtable::MemTable;

/// Pairs fetched per read-lock acquisition
const SCAN_BATCH_SIZE: usize = 128;

/// Iterator over `(key, value)` pairs of a key range
///
/// Fetches small batches under a short read lock and resumes strictly after
/// the last key it yielded, so writers are never blocked for the life of the
/// iterator. Writes that land behind the cursor are not seen.
pub struct ScanIter {
    memtable: Arc<MemTable>,
    start: Bound<Vec<u8>>,
    end: Bound<Vec<u8>>,
    resume_after: Option<Vec<u8>>,
    batch: VecDeque<(Vec<u8>, Vec<u8>)>,
    exhausted: bool,
}

impl ScanIter {
    pub(super) fn new(memtable: Arc<MemTable>, start: Bound<Vec<u8>>, end: Bound<Vec<u8>>) -> Self {
        Self {
            memtable,
            start,
            end,
            resume_after: None,
            batch: VecDeque::new(),
            exhausted: false,
        }
    }

    /// Go back to the start of the range
    pub fn restart(&mut self) {
        self.resume_after = None;
        self.batch.clear();
        self.exhausted = false;
    }

    fn fill(&mut self) {
        let lower = match &self.resume_after {
            Some(key) => Bound::Excluded(key.as_slice()),
            None => as_slice_bound(&self.start),
        };
        let batch = self
            .memtable
            .range_batch(lower, as_slice_bound(&self.end), SCAN_BATCH_SIZE);

        if batch.len() < SCAN_BATCH_SIZE {
            self.exhausted = true;
        }
        if let Some((key, _)) = batch.last() {
            self.resume_after = Some(key.clone());
        }
        self.batch.extend(batch);
    }
}

impl Iterator for ScanIter {
    type Item = (Vec<u8>, Vec<u8>);

    fn next(&mut self) -> Option<Self::Item> {
        if self.batch.is_empty() && !self.exhausted {
            self.fill();
        }
        self.batch.pop_front()
    }
}

fn as_slice_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(key) => Bound::Included(key.as_slice()),
        Bound::Excluded(key) => Bound::Excluded(key.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}
