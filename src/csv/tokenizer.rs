//! Incremental cell tokenizer
//!
//! Decodes delimited text one cell at a time from arbitrary byte chunks.
//! The tokenizer never allocates and never backtracks: a call stops at the
//! first cell or row boundary, or as soon as either slice runs out, leaving
//! the input positioned so the next call resumes exactly where this one
//! stopped.
//!
//! Quoting and escaping are not interpreted. Every delimiter byte is a real
//! boundary.

use super::dialect::Dialect;

/// Why `next_cell` stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Ran out of input or output before reaching a boundary
    Again,
    /// Consumed a cell delimiter
    CellDone,
    /// Consumed a row delimiter
    RowDone,
}

/// Cursor over the logical file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseState {
    /// Column index within the current row
    pub column: usize,
    /// Row index, relative to wherever parsing started
    pub row: u64,
    /// Characters emitted into the current cell
    pub cell_character: usize,
    /// Absolute byte offset of the next unconsumed byte
    pub file_byte: u64,
    pub cell_delimiter: u8,
    pub row_delimiter: u8,
    /// Reserved for quoted field support
    pub quoted: bool,
    /// Reserved for escape support
    pub escaped: bool,
}

impl ParseState {
    /// Start of file, row 0
    pub fn new(dialect: Dialect) -> Self {
        Self::at(dialect, 0, 0)
    }

    /// Positioned at the start of row `row`, which begins at `file_byte`
    ///
    /// `file_byte` must be a row start (0 or just past a row delimiter).
    pub fn at(dialect: Dialect, file_byte: u64, row: u64) -> Self {
        Self {
            column: 0,
            row,
            cell_character: 0,
            file_byte,
            cell_delimiter: dialect.cell_delimiter,
            row_delimiter: dialect.row_delimiter,
            quoted: false,
            escaped: false,
        }
    }

    pub fn dialect(&self) -> Dialect {
        Dialect::new(self.cell_delimiter, self.row_delimiter)
    }

    /// True when no bytes of the current row have been consumed yet
    pub fn at_row_start(&self) -> bool {
        self.column == 0 && self.cell_character == 0
    }

    /// Close the current row as if a row delimiter had been read
    ///
    /// Used at end of file when the last row has no trailing delimiter.
    /// Does not touch `file_byte` since no byte was consumed.
    pub fn finish_row(&mut self) {
        self.column = 0;
        self.cell_character = 0;
        self.row += 1;
    }
}

/// Decode bytes from `input` into `output` until a boundary
///
/// Returns the number of bytes written to the front of `output` and the
/// reason for stopping. `input` is advanced past every consumed byte,
/// delimiters included; a content byte that does not fit in `output` is left
/// unconsumed.
pub fn next_cell(state: &mut ParseState, output: &mut [u8], input: &mut &[u8]) -> (usize, Signal) {
    let mut written = 0;

    while let Some((&b, rest)) = input.split_first() {
        if b == state.cell_delimiter {
            *input = rest;
            state.file_byte += 1;
            state.column += 1;
            state.cell_character = 0;
            return (written, Signal::CellDone);
        }

        if b == state.row_delimiter {
            *input = rest;
            state.file_byte += 1;
            state.column = 0;
            state.cell_character = 0;
            state.row += 1;
            return (written, Signal::RowDone);
        }

        let Some(slot) = output.get_mut(written) else {
            return (written, Signal::Again);
        };
        *slot = b;
        *input = rest;
        written += 1;
        state.file_byte += 1;
        state.cell_character += 1;
    }

    (written, Signal::Again)
}
