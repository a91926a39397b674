//! File-order row index
//!
//! A sparse list of checkpoints mapping data-row rank to byte offset, plus
//! the scan frontier (the furthest row boundary known exactly). Readers take
//! cheap `Arc` snapshots; a single `IndexWriter` owns the working copy and
//! publishes complete snapshots, so a query never sees a half-updated index.
//!
//! Ranks count data rows only: rank 0 is the first row after the header.

use std::io::{self, Read, Seek};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};

use crate::csv::RowReader;

/// Default number of rows between checkpoints
pub const CHECKPOINT_STRIDE: u64 = 4096;

/// A data row whose start offset is known exactly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pub row: u64,
    pub offset: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowIndex {
    stride: u64,
    checkpoints: Vec<Checkpoint>,
    frontier: Checkpoint,
    data_start: Option<u64>,
    complete: bool,
}

impl RowIndex {
    pub fn new(stride: u64) -> Self {
        Self {
            stride: stride.max(1),
            checkpoints: Vec::new(),
            frontier: Checkpoint { row: 0, offset: 0 },
            data_start: None,
            complete: false,
        }
    }

    pub fn stride(&self) -> u64 {
        self.stride
    }

    /// Offset of the first data row, once the header has been seen
    pub fn data_start(&self) -> Option<u64> {
        self.data_start
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// Furthest row start known exactly
    pub fn frontier(&self) -> Checkpoint {
        self.frontier
    }

    /// True once the whole file has been scanned
    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Exact number of data rows, if the scan finished
    pub fn total_rows(&self) -> Option<u64> {
        self.complete.then_some(self.frontier.row)
    }

    /// Exact row count for a file of `file_len` bytes
    ///
    /// A finished scan ends at the file length it saw, so a file that has
    /// since grown or shrunk gets `None`.
    pub fn total_rows_for(&self, file_len: u64) -> Option<u64> {
        self.total_rows().filter(|_| self.frontier.offset == file_len)
    }

    /// Closest known row start at or before data row `row`
    pub fn checkpoint_for_row(&self, row: u64) -> Option<Checkpoint> {
        self.data_start?;
        if row >= self.frontier.row {
            return Some(self.frontier);
        }
        let i = self.checkpoints.partition_point(|c| c.row <= row);
        i.checked_sub(1).map(|i| self.checkpoints[i])
    }

    /// Closest known row start at or before byte `offset`
    pub fn checkpoint_for_offset(&self, offset: u64) -> Option<Checkpoint> {
        self.data_start?;
        if offset >= self.frontier.offset {
            return Some(self.frontier);
        }
        let i = self.checkpoints.partition_point(|c| c.offset <= offset);
        i.checked_sub(1).map(|i| self.checkpoints[i])
    }

    /// Whether the row at `offset` has a rank that can be counted exactly
    pub fn covers_offset(&self, offset: u64) -> bool {
        self.data_start.is_some_and(|start| offset >= start) && offset <= self.frontier.offset
    }

    /// Mean bytes per data row over the scanned prefix
    pub fn mean_row_bytes(&self) -> Option<f64> {
        let start = self.data_start?;
        if self.frontier.row == 0 {
            return None;
        }
        Some((self.frontier.offset - start) as f64 / self.frontier.row as f64)
    }

    /// Best guess at the data-row count of a file of `file_len` bytes
    pub fn estimate_rows(&self, file_len: u64, fallback_row_bytes: f64) -> u64 {
        if let Some(total) = self.total_rows_for(file_len) {
            return total;
        }
        let mean = self.mean_row_bytes().unwrap_or(fallback_row_bytes).max(1.0);
        let remaining = file_len.saturating_sub(self.frontier.offset);
        self.frontier.row + (remaining as f64 / mean).round() as u64
    }
}

/// Snapshot-on-read handle shared between the writer and its readers
#[derive(Debug, Clone)]
pub struct SharedRowIndex {
    inner: Arc<RwLock<Arc<RowIndex>>>,
}

impl SharedRowIndex {
    pub fn new(stride: u64) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(RowIndex::new(stride)))),
        }
    }

    /// Current published index
    pub fn snapshot(&self) -> Arc<RowIndex> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    fn publish(&self, index: RowIndex) {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(index);
    }

    /// The single writer for this index
    ///
    /// Call once; every writer publishes over the others' snapshots.
    pub fn writer(&self) -> IndexWriter {
        IndexWriter {
            shared: self.clone(),
            working: (*self.snapshot()).clone(),
            dirty: false,
        }
    }
}

/// Extends the index with rows observed in file order
#[derive(Debug)]
pub struct IndexWriter {
    shared: SharedRowIndex,
    working: RowIndex,
    dirty: bool,
}

impl IndexWriter {
    /// The working copy, which may be ahead of the published snapshot
    pub fn current(&self) -> &RowIndex {
        &self.working
    }

    /// Record where the first data row starts
    pub fn start(&mut self, data_start: u64) {
        if self.working.data_start.is_some() {
            return;
        }
        self.working.data_start = Some(data_start);
        let first = Checkpoint {
            row: 0,
            offset: data_start,
        };
        self.working.checkpoints.push(first);
        self.working.frontier = first;
        self.dirty = true;
    }

    /// Note that data row `row` starts at `offset`
    ///
    /// Only extends the index when the row directly follows the frontier;
    /// observations elsewhere carry no new information.
    pub fn observe(&mut self, row: u64, offset: u64) {
        let index = &mut self.working;
        if index.complete || index.data_start.is_none() {
            return;
        }
        if row != index.frontier.row + 1 || offset <= index.frontier.offset {
            return;
        }
        index.frontier = Checkpoint { row, offset };
        if row % index.stride == 0 {
            index.checkpoints.push(index.frontier);
        }
        self.dirty = true;
    }

    /// Mark the scan finished with the frontier as end of file
    ///
    /// `row` and `offset` describe the position reached at end of file.
    pub fn finish(&mut self, row: u64, offset: u64) {
        if self.working.complete || self.working.data_start.is_none() {
            return;
        }
        if row != self.working.frontier.row || offset != self.working.frontier.offset {
            return;
        }
        self.working.complete = true;
        self.dirty = true;
        tracing::info!("Row index complete: {} data rows", row);
    }

    /// Forget everything learned so far, e.g. after the file changed size
    pub fn reset(&mut self) {
        self.working = RowIndex::new(self.working.stride);
        self.dirty = true;
        self.publish();
    }

    /// Make the working copy visible to readers
    pub fn publish(&mut self) {
        if !self.dirty {
            return;
        }
        self.shared.publish(self.working.clone());
        self.dirty = false;
    }
}

/// Scan a whole file in order, extending the index as rows go by
///
/// `on_progress` runs after every `progress_rows` rows with the freshly
/// published index. Returns `false` if `cancel` stopped the scan early.
pub fn build<R: Read + Seek>(
    reader: &mut RowReader<R>,
    writer: &mut IndexWriter,
    progress_rows: u64,
    cancel: &AtomicBool,
    mut on_progress: impl FnMut(&RowIndex),
) -> io::Result<bool> {
    reader.seek(0, 0)?;
    if !reader.skip_row()? {
        // Empty file: no header, no rows
        writer.start(0);
        writer.finish(0, 0);
        writer.publish();
        on_progress(writer.current());
        return Ok(true);
    }
    writer.start(reader.position());

    let progress_rows = progress_rows.max(1);
    let mut rank = 0u64;
    while reader.skip_row()? {
        rank += 1;
        writer.observe(rank, reader.position());
        if rank % progress_rows == 0 {
            if cancel.load(Ordering::Relaxed) {
                writer.publish();
                return Ok(false);
            }
            writer.publish();
            on_progress(writer.current());
        }
    }
    writer.finish(rank, reader.position());
    writer.publish();
    on_progress(writer.current());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csv::Dialect;
    use std::io::Cursor;

    fn numbered(rows: usize) -> Vec<u8> {
        let mut s = String::from("n,sq\n");
        for i in 0..rows {
            s.push_str(&format!("{},{}\n", i, i * i));
        }
        s.into_bytes()
    }

    fn build_index(data: Vec<u8>, stride: u64) -> (SharedRowIndex, Vec<u8>) {
        let shared = SharedRowIndex::new(stride);
        let mut writer = shared.writer();
        let mut reader = RowReader::new(Cursor::new(data.clone()), Dialect::default(), 16);
        let cancel = AtomicBool::new(false);
        assert!(build(&mut reader, &mut writer, 7, &cancel, |_| {}).unwrap());
        (shared, data)
    }

    #[test]
    fn test_build_counts_rows() {
        let (shared, _) = build_index(numbered(100), 10);
        let index = shared.snapshot();
        assert!(index.is_complete());
        assert_eq!(index.total_rows(), Some(100));
        // Rows 0, 10, .., 90 plus the end-of-file frontier at row 100
        assert_eq!(index.checkpoints().len(), 11);
        assert_eq!(index.data_start(), Some(5));
    }

    #[test]
    fn test_checkpoints_point_at_row_starts() {
        let (shared, data) = build_index(numbered(50), 8);
        let index = shared.snapshot();
        for cp in index.checkpoints() {
            let offset = cp.offset as usize;
            assert_eq!(data[offset - 1], b'\n');
            let text = String::from_utf8_lossy(&data[offset..]);
            assert!(text.starts_with(&format!("{},", cp.row)), "row {}", cp.row);
        }
    }

    #[test]
    fn test_checkpoint_lookup() {
        let (shared, _) = build_index(numbered(50), 8);
        let index = shared.snapshot();
        assert_eq!(index.checkpoint_for_row(0).unwrap().row, 0);
        assert_eq!(index.checkpoint_for_row(17).unwrap().row, 16);
        assert_eq!(index.checkpoint_for_row(500).unwrap().row, 50);
        let cp = index.checkpoint_for_row(24).unwrap();
        assert_eq!(index.checkpoint_for_offset(cp.offset + 1).unwrap(), cp);
    }

    #[test]
    fn test_observe_ignores_gaps() {
        let shared = SharedRowIndex::new(2);
        let mut writer = shared.writer();
        writer.start(10);
        writer.observe(1, 20);
        writer.observe(5, 90);
        assert_eq!(writer.current().frontier(), Checkpoint { row: 1, offset: 20 });
        writer.observe(2, 30);
        assert_eq!(writer.current().checkpoints().len(), 2);
    }

    #[test]
    fn test_snapshots_are_isolated_until_publish() {
        let shared = SharedRowIndex::new(2);
        let mut writer = shared.writer();
        let before = shared.snapshot();
        writer.start(4);
        writer.observe(1, 8);
        assert_eq!(shared.snapshot().data_start(), None);
        writer.publish();
        assert_eq!(shared.snapshot().frontier().row, 1);
        assert_eq!(before.data_start(), None);
    }

    #[test]
    fn test_estimate_rows_extrapolates() {
        let shared = SharedRowIndex::new(4);
        let mut writer = shared.writer();
        writer.start(0);
        for row in 1..=10 {
            writer.observe(row, row * 10);
        }
        assert_eq!(writer.current().estimate_rows(1000, 1.0), 100);
    }

    #[test]
    fn test_total_only_exact_for_scanned_length() {
        let data = numbered(20);
        let len = data.len() as u64;
        let (shared, _) = build_index(data, 4);
        let index = shared.snapshot();
        assert_eq!(index.total_rows_for(len), Some(20));
        assert_eq!(index.total_rows_for(len + 60), None);
        assert_eq!(index.total_rows_for(len - 6), None);
        // Growth past the scan is extrapolated from the scanned rows
        assert!(index.estimate_rows(len * 2, 1.0) > 20);
    }

    #[test]
    fn test_cancel_stops_scan() {
        let shared = SharedRowIndex::new(4);
        let mut writer = shared.writer();
        let mut reader = RowReader::new(Cursor::new(numbered(100)), Dialect::default(), 16);
        let cancel = AtomicBool::new(true);
        assert!(!build(&mut reader, &mut writer, 10, &cancel, |_| {}).unwrap());
        assert!(!shared.snapshot().is_complete());
        assert_eq!(shared.snapshot().frontier().row, 10);
    }

    #[test]
    fn test_empty_file_is_complete() {
        let shared = SharedRowIndex::new(4);
        let mut writer = shared.writer();
        let mut reader = RowReader::new(Cursor::new(Vec::new()), Dialect::default(), 16);
        let cancel = AtomicBool::new(false);
        assert!(build(&mut reader, &mut writer, 10, &cancel, |_| {}).unwrap());
        assert_eq!(shared.snapshot().total_rows(), Some(0));
    }
}
