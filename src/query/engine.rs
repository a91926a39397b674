//! Windowed query engine
//!
//! Turns a `Request` into an `Answer` by reading only the bytes the window
//! needs. File-order windows are located through the row index (exact) or
//! by aligning a byte offset to the next row start (rank estimated). Sorted
//! windows go through the pivot selector.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read, Seek};
use std::path::Path;
use std::time::Instant;

use super::answer::Answer;
use super::error::QueryError;
use super::request::{Anchor, ColumnSort, Request};
use crate::csv::{Dialect, RowReader, Signal, READ_SIZE};
use crate::index::{Checkpoint, IndexWriter, RowIndex, SharedRowIndex, CHECKPOINT_STRIDE};
use crate::pivot::{PivotSet, Selector, MATERIALIZE_LIMIT, SPILL_FRACTION};

/// A byte anchor this close past the index frontier is reached by scanning
/// forward, which keeps its rank exact and extends the index
const SCAN_AHEAD_BYTES: u64 = 1 << 20;

/// Tunables for one engine
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Bytes per read from the file
    pub read_size: usize,
    /// First size of the character buffer
    pub initial_capacity: usize,
    /// Ceiling on the character buffer
    pub max_answer_bytes: usize,
    pub checkpoint_stride: u64,
    pub materialize_limit: usize,
    pub spill_fraction: f64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            read_size: READ_SIZE,
            initial_capacity: 1024,
            max_answer_bytes: 256 * 1024 * 1024,
            checkpoint_stride: CHECKPOINT_STRIDE,
            materialize_limit: MATERIALIZE_LIMIT,
            spill_fraction: SPILL_FRACTION,
        }
    }
}

/// Where a window landed and what is known about the file size
struct Window {
    /// Data rows above the first window row
    position: u64,
    /// Data rows in the file, header excluded
    total_rows: u64,
    total_exact: bool,
}

/// Builds an `Answer` row by row straight from the tokenizer
struct AnswerBuilder {
    answer: Answer,
    used: usize,
    /// Cells per materialized row
    widths: Vec<usize>,
    initial_capacity: usize,
    max_bytes: usize,
}

impl AnswerBuilder {
    fn new(mut answer: Answer, settings: &EngineSettings) -> Self {
        answer.clear();
        answer.cells.push(0);
        let max_bytes = settings.max_answer_bytes;
        let len = answer
            .characters
            .capacity()
            .max(settings.initial_capacity)
            .min(max_bytes);
        answer.characters.resize(len, 0);
        Self {
            answer,
            used: 0,
            widths: Vec::new(),
            initial_capacity: settings.initial_capacity,
            max_bytes,
        }
    }

    fn rows(&self) -> usize {
        self.widths.len()
    }

    /// Double the character buffer, up to the ceiling
    fn grow(&mut self) -> Result<(), QueryError> {
        let characters = &mut self.answer.characters;
        let len = characters.len();
        let wanted = len.saturating_mul(2).max(self.initial_capacity).max(1);
        let target = wanted.min(self.max_bytes);
        if target <= len {
            return Err(QueryError::CapacityExhausted { requested: wanted });
        }
        characters
            .try_reserve(target - len)
            .map_err(|_| QueryError::CapacityExhausted { requested: target })?;
        characters.resize(target, 0);
        Ok(())
    }

    /// Tokenize the row at the reader's position into the answer
    ///
    /// Returns `false` at end of file.
    fn read_row<R: Read + Seek>(&mut self, reader: &mut RowReader<R>) -> Result<bool, QueryError> {
        let start = reader.position();
        let mut cells = 0;
        loop {
            if !reader.fill()? {
                if reader.position() == start {
                    return Ok(false);
                }
                reader.finish_row();
                self.answer.cells.push(self.used);
                cells += 1;
                break;
            }
            if self.used == self.answer.characters.len() {
                self.grow()?;
            }
            let (n, signal) = reader.next_cell(&mut self.answer.characters[self.used..]);
            self.used += n;
            match signal {
                Signal::Again => {}
                Signal::CellDone => {
                    self.answer.cells.push(self.used);
                    cells += 1;
                }
                Signal::RowDone => {
                    self.answer.cells.push(self.used);
                    cells += 1;
                    break;
                }
            }
        }
        self.widths.push(cells);
        Ok(true)
    }

    /// Pad ragged rows and fill in the shape
    fn finish(self, window: Window) -> Answer {
        let Self {
            mut answer,
            used,
            widths,
            ..
        } = self;
        answer.characters.truncate(used);
        let width = widths.iter().copied().max().unwrap_or(0);

        if widths.iter().any(|&w| w != width) {
            let flat = std::mem::take(&mut answer.cells);
            let mut cells = Vec::with_capacity(widths.len() * width + 1);
            cells.push(0);
            let mut next = 1;
            for &w in &widths {
                cells.extend_from_slice(&flat[next..next + w]);
                next += w;
                let last = cells[cells.len() - 1];
                cells.resize(cells.len() + (width - w), last);
            }
            answer.cells = cells;
        }

        answer.width = width;
        answer.height = widths.len();
        answer.position = window.position;
        // Header counts as a row once there is one
        answer.total = if answer.height == 0 {
            0
        } else {
            window.total_rows + 1
        };
        answer.total_exact = window.total_exact;
        answer
    }
}

/// Owns the file and answers viewport requests against it
pub struct QueryEngine<R = File> {
    reader: RowReader<R>,
    settings: EngineSettings,
    index: SharedRowIndex,
    /// Present when no background indexer owns the index
    writer: Option<IndexWriter>,
    pivots: HashMap<Vec<ColumnSort>, PivotSet>,
    file_len: Option<u64>,
    /// New length of a file whose shared index is now stale
    length_change: Option<u64>,
}

impl QueryEngine<File> {
    pub fn open(path: &Path, dialect: Dialect, settings: EngineSettings) -> std::io::Result<Self> {
        let file = File::open(path)?;
        tracing::info!("Opened {} for querying", path.display());
        Ok(Self::new(file, dialect, settings))
    }

    /// Open against an index kept up to date by someone else
    pub fn open_shared(
        path: &Path,
        dialect: Dialect,
        settings: EngineSettings,
        index: SharedRowIndex,
    ) -> std::io::Result<Self> {
        let file = File::open(path)?;
        tracing::info!("Opened {} for querying", path.display());
        Ok(Self::with_shared_index(file, dialect, settings, index))
    }
}

impl<R: Read + Seek> QueryEngine<R> {
    /// Engine that extends its own row index as queries read rows
    pub fn new(source: R, dialect: Dialect, settings: EngineSettings) -> Self {
        let index = SharedRowIndex::new(settings.checkpoint_stride);
        let writer = index.writer();
        Self::build(source, dialect, settings, index, Some(writer))
    }

    /// Engine that only reads `index`
    pub fn with_shared_index(
        source: R,
        dialect: Dialect,
        settings: EngineSettings,
        index: SharedRowIndex,
    ) -> Self {
        Self::build(source, dialect, settings, index, None)
    }

    fn build(
        source: R,
        dialect: Dialect,
        settings: EngineSettings,
        index: SharedRowIndex,
        writer: Option<IndexWriter>,
    ) -> Self {
        Self {
            reader: RowReader::new(source, dialect, settings.read_size),
            settings,
            index,
            writer,
            pivots: HashMap::new(),
            file_len: None,
            length_change: None,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.reader.dialect()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn index(&self) -> &SharedRowIndex {
        &self.index
    }

    /// Pivots learned so far for one sort order
    pub fn pivots(&self, sort_columns: &[ColumnSort]) -> Option<&PivotSet> {
        self.pivots.get(sort_columns)
    }

    /// Take the file length seen to change under a shared index
    ///
    /// Only engines without their own writer report this; whoever owns the
    /// shared index is expected to rescan.
    pub fn take_length_change(&mut self) -> Option<u64> {
        self.length_change.take()
    }

    /// Materialize the window described by `request`
    ///
    /// `scratch` donates its allocations to the result. The request is
    /// handed back alongside the outcome so the caller can tell which
    /// viewport the answer belongs to.
    pub fn query(&mut self, request: Request, scratch: Answer) -> (Result<Answer, QueryError>, Request) {
        let started = Instant::now();
        let result = self.run(&request, scratch);
        match &result {
            Ok(answer) => tracing::debug!(
                "Query {:?} -> {}x{} at {} of {}{} in {:?}",
                request.anchor,
                answer.width,
                answer.height,
                answer.position,
                answer.total,
                if answer.total_exact { "" } else { "~" },
                started.elapsed()
            ),
            Err(e) => tracing::warn!("Query {:?} failed: {}", request.anchor, e),
        }
        if let Some(writer) = self.writer.as_mut() {
            writer.publish();
        }
        (result, request)
    }

    fn run(&mut self, request: &Request, scratch: Answer) -> Result<Answer, QueryError> {
        let file_len = self.reader.source_len()?;
        self.note_file_len(file_len);

        let mut builder = AnswerBuilder::new(scratch, &self.settings);
        self.reader.seek(0, 0)?;
        if !builder.read_row(&mut self.reader)? {
            if let Some(writer) = self.writer.as_mut() {
                writer.start(0);
                writer.finish(0, 0);
            }
            let empty = Window {
                position: 0,
                total_rows: 0,
                total_exact: true,
            };
            return Ok(builder.finish(empty));
        }
        let data_start = self.reader.position();
        if let Some(writer) = self.writer.as_mut() {
            writer.start(data_start);
        }

        let window = if request.is_sorted() {
            self.sorted_window(request, data_start, &mut builder)?
        } else {
            self.file_window(request, data_start, file_len, &mut builder)?
        };
        Ok(builder.finish(window))
    }

    /// Drop what was learned about a previous version of the file
    fn note_file_len(&mut self, len: u64) {
        match self.file_len.replace(len) {
            Some(previous) if previous != len => {
                tracing::info!(
                    "File length changed from {} to {} bytes, dropping cached positions",
                    previous,
                    len
                );
                self.pivots.clear();
                match self.writer.as_mut() {
                    Some(writer) => writer.reset(),
                    None => self.length_change = Some(len),
                }
            }
            _ => {}
        }
    }

    fn current_index(&mut self) -> std::sync::Arc<RowIndex> {
        if let Some(writer) = self.writer.as_mut() {
            writer.publish();
        }
        self.index.snapshot()
    }

    /// Record that data row `rank` starts at the reader's position
    fn observe(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            writer.observe(self.reader.row(), self.reader.position());
        }
    }

    fn observe_eof(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            writer.finish(self.reader.row(), self.reader.position());
        }
    }

    /// Skip up to `rows` rows, returning false if end of file came first
    fn skip_rows(&mut self, rows: u64, exact: bool) -> Result<bool, QueryError> {
        for _ in 0..rows {
            if !self.reader.skip_row()? {
                return Ok(false);
            }
            if exact {
                self.observe();
            }
        }
        Ok(true)
    }

    fn file_window(
        &mut self,
        request: &Request,
        data_start: u64,
        file_len: u64,
        builder: &mut AnswerBuilder,
    ) -> Result<Window, QueryError> {
        let index = self.current_index();
        let origin = Checkpoint {
            row: 0,
            offset: data_start,
        };

        // The reader's row counter tracks data-row rank from here on
        let exact = match request.anchor {
            Anchor::Rank(rank) => {
                let cp = index.checkpoint_for_row(rank).unwrap_or(origin);
                self.reader.seek(cp.offset, cp.row)?;
                self.skip_rows(rank - cp.row.min(rank), true)?;
                true
            }
            Anchor::Byte(offset) => {
                let offset = offset.clamp(data_start, file_len.max(data_start));
                let frontier = index.frontier();
                let reachable = index.covers_offset(offset)
                    || (index.data_start().is_some()
                        && offset.saturating_sub(frontier.offset) <= SCAN_AHEAD_BYTES)
                    || (index.data_start().is_none() && offset - data_start <= SCAN_AHEAD_BYTES);
                if reachable {
                    let cp = index.checkpoint_for_offset(offset).unwrap_or(origin);
                    self.reader.seek(cp.offset, cp.row)?;
                    while self.reader.position() < offset {
                        if !self.reader.skip_row()? {
                            break;
                        }
                        self.observe();
                    }
                    true
                } else {
                    let aligned = self.reader.seek_row_start(offset, 0)?;
                    let mean = index
                        .mean_row_bytes()
                        .unwrap_or(data_start.max(1) as f64)
                        .max(1.0);
                    let guess = frontier.row
                        + (aligned.saturating_sub(frontier.offset) as f64 / mean).round() as u64;
                    self.reader.seek(aligned, guess.max(frontier.row + 1))?;
                    false
                }
            }
        };

        let mut eof = !self.skip_rows(request.offset, exact)?;
        let position = self.reader.row();
        let window_start = self.reader.position();

        if !eof {
            for _ in 0..request.window_height {
                if !builder.read_row(&mut self.reader)? {
                    eof = true;
                    break;
                }
                if exact {
                    self.observe();
                }
            }
        }
        if !eof && !self.reader.fill()? {
            eof = true;
        }
        if eof && exact {
            self.observe_eof();
        }

        let index = self.current_index();
        let window_rows = (builder.rows() - 1) as u64;
        if let Some(total_rows) = index.total_rows_for(file_len) {
            return Ok(Window {
                position,
                total_rows,
                total_exact: true,
            });
        }
        if eof && exact {
            return Ok(Window {
                position,
                total_rows: self.reader.row(),
                total_exact: true,
            });
        }

        let window_mean = (window_rows > 0)
            .then(|| (self.reader.position() - window_start) as f64 / window_rows as f64);
        let fallback = window_mean.unwrap_or(data_start.max(1) as f64);
        let known = (position + window_rows).max(index.frontier().row);
        let total_rows = if eof {
            known
        } else {
            known.max(index.estimate_rows(file_len, fallback))
        };
        Ok(Window {
            position,
            total_rows,
            total_exact: false,
        })
    }

    fn sorted_window(
        &mut self,
        request: &Request,
        data_start: u64,
        builder: &mut AnswerBuilder,
    ) -> Result<Window, QueryError> {
        let selector = Selector::new(&request.sort_columns, self.reader.dialect())
            .with_materialize_limit(self.settings.materialize_limit)
            .with_spill_fraction(self.settings.spill_fraction);
        let pivots = self.pivots.entry(request.sort_columns.clone()).or_default();

        let anchor_rank = match request.anchor {
            Anchor::Rank(rank) => rank,
            Anchor::Byte(offset) => {
                let aligned = self.reader.seek_row_start(offset.max(data_start), 0)?;
                match selector.rank_of(&mut self.reader, data_start, pivots, aligned)? {
                    Some(rank) => rank,
                    None => pivots.total_rows().unwrap_or(0),
                }
            }
        };
        let start = anchor_rank.saturating_add(request.offset);
        let selection = selector.select(
            &mut self.reader,
            data_start,
            pivots,
            start,
            request.window_height,
        )?;

        for offset in selection.offsets {
            self.reader.seek(offset, 0)?;
            if !builder.read_row(&mut self.reader)? {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("row at byte {} vanished while reading the sorted window", offset),
                )
                .into());
            }
        }
        Ok(Window {
            position: start.min(selection.total_rows),
            total_rows: selection.total_rows,
            total_exact: true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn engine(data: &str) -> QueryEngine<Cursor<Vec<u8>>> {
        QueryEngine::new(
            Cursor::new(data.as_bytes().to_vec()),
            Dialect::default(),
            EngineSettings {
                read_size: 4,
                initial_capacity: 2,
                ..EngineSettings::default()
            },
        )
    }

    fn cells(answer: &Answer) -> Vec<String> {
        (0..answer.height)
            .flat_map(|r| (0..answer.width).map(move |c| (r, c)))
            .map(|(r, c)| answer.cell_str(r, c).into_owned())
            .collect()
    }

    #[test]
    fn test_small_window() {
        let mut engine = engine("a,b,c\n1,2,3\n4,5,6\n");
        let (result, _) = engine.query(Request::at_rank(0, 2), Answer::default());
        let answer = result.unwrap();
        assert_eq!((answer.width, answer.height), (3, 3));
        assert_eq!(cells(&answer), ["a", "b", "c", "1", "2", "3", "4", "5", "6"]);
        assert!(answer.total >= 3);
        assert!(answer.is_well_formed());
    }

    #[test]
    fn test_ragged_rows_are_padded() {
        let mut engine = engine("a,b\n1\n2,3,4\n");
        let answer = engine.query(Request::at_rank(0, 5), Answer::default()).0.unwrap();
        assert_eq!(answer.width, 3);
        assert_eq!(answer.cells.len(), answer.height * answer.width + 1);
        assert_eq!(answer.cell(1, 1), Some(&b""[..]));
        assert_eq!(answer.cell(1, 2), Some(&b""[..]));
        assert_eq!(answer.cell(2, 2), Some(&b"4"[..]));
        assert_eq!(answer.cell(0, 2), Some(&b""[..]));
    }

    #[test]
    fn test_rank_anchor_and_offset() {
        let mut engine = engine("h\nr0\nr1\nr2\nr3\nr4\n");
        let request = Request::at_rank(1, 2).with_offset(2);
        let answer = engine.query(request, Answer::default()).0.unwrap();
        assert_eq!(answer.position, 3);
        assert_eq!(cells(&answer), ["h", "r3", "r4"]);
        // The tail was reached from an exact rank
        assert!(answer.total_exact);
        assert_eq!(answer.total, 6);
    }

    #[test]
    fn test_byte_anchor_aligns_forward() {
        let mut engine = engine("h\nr0\nr1\nr2\n");
        // Offset 3 is inside "r0"
        let answer = engine.query(Request::at_byte(3, 1), Answer::default()).0.unwrap();
        assert_eq!(cells(&answer), ["h", "r1"]);
        assert_eq!(answer.position, 1);
    }

    #[test]
    fn test_window_past_end_is_short() {
        let mut engine = engine("h\nr0\n");
        let answer = engine.query(Request::at_rank(5, 3), Answer::default()).0.unwrap();
        assert_eq!(answer.height, 1);
        assert_eq!(answer.total, 2);
        assert!(answer.total_exact);
    }

    #[test]
    fn test_empty_file() {
        let mut engine = engine("");
        let answer = engine.query(Request::at_rank(0, 3), Answer::default()).0.unwrap();
        assert_eq!((answer.width, answer.height, answer.total), (0, 0, 0));
        assert_eq!(answer.cells, vec![0]);
        assert!(answer.total_exact);
    }

    #[test]
    fn test_capacity_ceiling() {
        let mut engine = QueryEngine::new(
            Cursor::new(b"header\nsome long row\n".to_vec()),
            Dialect::default(),
            EngineSettings {
                initial_capacity: 4,
                max_answer_bytes: 8,
                ..EngineSettings::default()
            },
        );
        let (result, request) = engine.query(Request::at_rank(0, 1), Answer::default());
        assert!(matches!(result, Err(QueryError::CapacityExhausted { .. })));
        assert_eq!(request, Request::at_rank(0, 1));
    }

    #[test]
    fn test_queries_extend_the_index() {
        let mut data = String::from("n\n");
        for i in 0..100 {
            data.push_str(&format!("{}\n", i));
        }
        let mut engine = engine(&data);
        engine.query(Request::at_rank(40, 5), Answer::default()).0.unwrap();
        assert_eq!(engine.index().snapshot().frontier().row, 45);
        let answer = engine.query(Request::at_rank(98, 5), Answer::default()).0.unwrap();
        assert!(engine.index().snapshot().is_complete());
        assert_eq!(answer.total, 101);
    }

    #[test]
    fn test_sorted_window() {
        let mut engine = engine("k,v\nb,2\na,3\nc,1\n");
        let request = Request::at_rank(0, 3).with_sort(vec![ColumnSort::descending(1)]);
        let answer = engine.query(request, Answer::default()).0.unwrap();
        assert_eq!(cells(&answer), ["k", "v", "a", "3", "b", "2", "c", "1"]);
        assert_eq!(answer.total, 4);
        assert!(answer.total_exact);
    }

    /// Reads nothing more once end of file has been seen, as if the file
    /// were truncated right after the first full scan
    struct VanishingSource {
        inner: Cursor<Vec<u8>>,
        gone: bool,
    }

    impl Read for VanishingSource {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.gone {
                return Ok(0);
            }
            let n = self.inner.read(buf)?;
            self.gone = n == 0;
            Ok(n)
        }
    }

    impl Seek for VanishingSource {
        fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    #[test]
    fn test_sorted_rows_vanishing_is_an_error() {
        let mut data = String::from("k\n");
        for i in 0..20 {
            data.push_str(&format!("{}\n", 20 - i));
        }
        let source = VanishingSource {
            inner: Cursor::new(data.into_bytes()),
            gone: false,
        };
        let settings = EngineSettings {
            read_size: 4,
            ..EngineSettings::default()
        };
        let mut engine = QueryEngine::new(source, Dialect::default(), settings);
        let request = Request::at_rank(0, 3).with_sort(vec![ColumnSort::ascending(0)]);
        let (result, _) = engine.query(request, Answer::default());
        match result {
            Err(QueryError::Io { kind, .. }) => assert_eq!(kind, io::ErrorKind::UnexpectedEof),
            other => panic!("expected an I/O error, got {:?}", other),
        }
    }

    #[test]
    fn test_sorted_byte_anchor_uses_sorted_rank() {
        let mut engine = engine("k\nb\na\nc\n");
        // Row "b" starts at byte 2 and is second in sorted order
        let request = Request::at_byte(2, 2).with_sort(vec![ColumnSort::ascending(0)]);
        let answer = engine.query(request, Answer::default()).0.unwrap();
        assert_eq!(answer.position, 1);
        assert_eq!(cells(&answer), ["k", "b", "c"]);
    }
}
