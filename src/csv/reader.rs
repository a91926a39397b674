//! Buffered row reader over a seekable byte source
//!
//! Owns the source handle and a fixed-size read buffer, and feeds buffered
//! chunks through the tokenizer. Every read happens here, so this is the
//! only place a query blocks on I/O.

use std::io::{self, Read, Seek, SeekFrom};

use super::dialect::Dialect;
use super::tokenizer::{next_cell, ParseState, Signal};

/// Default size of one read from the source
pub const READ_SIZE: usize = 8 * 1024;

/// One decoded row with its absolute position
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowRecord {
    /// Byte offset of the first byte of the row
    pub offset: u64,
    /// Byte offset just past the row delimiter (or end of file)
    pub end: u64,
    text: Vec<u8>,
    used: usize,
    bounds: Vec<usize>,
}

impl RowRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode a raw row (no trailing row delimiter)
    pub fn parse(offset: u64, raw: &[u8], dialect: Dialect) -> Self {
        let mut record = Self::new();
        record.reset(offset);
        let mut state = ParseState::at(dialect, offset, 0);
        let mut input = raw;
        loop {
            if record.used == record.text.len() {
                record.grow();
            }
            let (n, signal) = next_cell(&mut state, &mut record.text[record.used..], &mut input);
            record.used += n;
            match signal {
                Signal::CellDone => record.bounds.push(record.used),
                Signal::RowDone => break,
                Signal::Again if input.is_empty() => break,
                Signal::Again => {}
            }
        }
        record.bounds.push(record.used);
        record.end = offset + raw.len() as u64;
        record
    }

    fn reset(&mut self, offset: u64) {
        self.offset = offset;
        self.end = offset;
        self.used = 0;
        self.bounds.clear();
        self.bounds.push(0);
    }

    fn grow(&mut self) {
        let len = self.text.len().max(32) * 2;
        self.text.resize(len, 0);
    }

    /// Number of cells in the row
    pub fn len(&self) -> usize {
        self.bounds.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn cell(&self, column: usize) -> Option<&[u8]> {
        let start = *self.bounds.get(column)?;
        let end = *self.bounds.get(column + 1)?;
        Some(&self.text[start..end])
    }

    pub fn cells(&self) -> impl Iterator<Item = &[u8]> {
        self.bounds
            .windows(2)
            .map(move |w| &self.text[w[0]..w[1]])
    }

    /// The row as it appeared in the file, without the row delimiter
    pub fn raw(&self, dialect: Dialect) -> Vec<u8> {
        let mut raw = Vec::with_capacity(self.used + self.len());
        for (i, cell) in self.cells().enumerate() {
            if i > 0 {
                raw.push(dialect.cell_delimiter);
            }
            raw.extend_from_slice(cell);
        }
        raw
    }
}

/// Streams rows out of a `Read + Seek` source
pub struct RowReader<R> {
    source: R,
    state: ParseState,
    buf: Vec<u8>,
    start: usize,
    end: usize,
    eof: bool,
}

impl<R: Read + Seek> RowReader<R> {
    /// Reader positioned at byte 0, row 0
    pub fn new(source: R, dialect: Dialect, read_size: usize) -> Self {
        Self {
            source,
            state: ParseState::new(dialect),
            buf: vec![0; read_size.max(1)],
            start: 0,
            end: 0,
            eof: false,
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.state.dialect()
    }

    pub fn state(&self) -> &ParseState {
        &self.state
    }

    /// Absolute offset of the next unconsumed byte
    pub fn position(&self) -> u64 {
        self.state.file_byte
    }

    /// Row number of the row starting at `position()`
    pub fn row(&self) -> u64 {
        self.state.row
    }

    /// Total length of the source in bytes
    pub fn source_len(&mut self) -> io::Result<u64> {
        let len = self.source.seek(SeekFrom::End(0))?;
        // Force the next fill to seek back to where parsing is
        self.discard_buffer();
        Ok(len)
    }

    /// Jump to `offset`, which the caller asserts is the start of row `row`
    pub fn seek(&mut self, offset: u64, row: u64) -> io::Result<()> {
        self.state = ParseState::at(self.state.dialect(), offset, row);
        self.discard_buffer();
        Ok(())
    }

    /// Jump to the first row starting at or after `offset`
    ///
    /// Returns the aligned offset. The row number is left at `row` since it
    /// cannot be known from the bytes alone.
    pub fn seek_row_start(&mut self, offset: u64, row: u64) -> io::Result<u64> {
        if offset == 0 {
            self.seek(0, row)?;
            return Ok(0);
        }
        self.seek(offset - 1, row)?;
        if !self.skip_row()? {
            // Past end of file
            self.seek(offset, row)?;
            return Ok(offset);
        }
        let aligned = self.state.file_byte;
        self.state = ParseState::at(self.state.dialect(), aligned, row);
        Ok(aligned)
    }

    fn discard_buffer(&mut self) {
        self.start = 0;
        self.end = 0;
        self.eof = false;
    }

    /// Make sure there is buffered input
    ///
    /// Returns `false` once the source is exhausted and nothing is buffered.
    pub fn fill(&mut self) -> io::Result<bool> {
        if self.start < self.end {
            return Ok(true);
        }
        if self.eof {
            return Ok(false);
        }
        self.source.seek(SeekFrom::Start(self.state.file_byte))?;
        let n = loop {
            match self.source.read(&mut self.buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };
        self.start = 0;
        self.end = n;
        if n == 0 {
            self.eof = true;
            return Ok(false);
        }
        Ok(true)
    }

    /// Tokenize buffered input into `output`
    ///
    /// Call `fill` first; with an empty buffer this returns `(0, Again)`.
    pub fn next_cell(&mut self, output: &mut [u8]) -> (usize, Signal) {
        let mut input = &self.buf[self.start..self.end];
        let before = input.len();
        let result = next_cell(&mut self.state, output, &mut input);
        self.start += before - input.len();
        result
    }

    /// Decode the next row into `record`
    ///
    /// A final row without a trailing row delimiter is still returned.
    /// Returns `false` at end of file.
    pub fn next_row(&mut self, record: &mut RowRecord) -> io::Result<bool> {
        record.reset(self.state.file_byte);
        loop {
            if !self.fill()? {
                if self.state.file_byte == record.offset {
                    return Ok(false);
                }
                self.state.finish_row();
                record.bounds.push(record.used);
                record.end = self.state.file_byte;
                return Ok(true);
            }
            if record.used == record.text.len() {
                record.grow();
            }
            let (n, signal) = self.next_cell(&mut record.text[record.used..]);
            record.used += n;
            match signal {
                Signal::Again => {}
                Signal::CellDone => record.bounds.push(record.used),
                Signal::RowDone => {
                    record.bounds.push(record.used);
                    record.end = self.state.file_byte;
                    return Ok(true);
                }
            }
        }
    }

    /// Close a final row that has no trailing row delimiter
    pub fn finish_row(&mut self) {
        self.state.finish_row();
    }

    /// Advance past the next row without decoding its cells
    pub fn skip_row(&mut self) -> io::Result<bool> {
        let row_start = self.state.file_byte;
        let delimiter = self.state.row_delimiter;
        loop {
            if !self.fill()? {
                if self.state.file_byte == row_start {
                    return Ok(false);
                }
                self.state.finish_row();
                return Ok(true);
            }
            let window = &self.buf[self.start..self.end];
            match window.iter().position(|&b| b == delimiter) {
                Some(i) => {
                    self.start += i + 1;
                    self.state.file_byte += (i + 1) as u64;
                    self.state.finish_row();
                    return Ok(true);
                }
                None => {
                    self.start = self.end;
                    self.state.file_byte += window.len() as u64;
                }
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.source
    }
}
