//! Materialized viewport
//!
//! All cell text lives in one flat byte buffer. `cells` holds prefix
//! offsets: cell `i` spans `characters[cells[i]..cells[i + 1]]`, and the
//! cell at `(row, column)` is `i = row * width + column`. Row 0 is the header.

use std::borrow::Cow;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Answer {
    pub characters: Vec<u8>,
    pub cells: Vec<usize>,
    /// Columns in this view
    pub width: usize,
    /// Rows materialized, header included
    pub height: usize,
    /// Data rows above the first window row
    pub position: u64,
    /// Best-known row count, header included
    pub total: u64,
    /// Whether `total` comes from a complete scan
    pub total_exact: bool,
}

impl Answer {
    /// Text of the cell at `(row, column)`
    pub fn cell(&self, row: usize, column: usize) -> Option<&[u8]> {
        if row >= self.height || column >= self.width {
            return None;
        }
        let i = row * self.width + column;
        let start = *self.cells.get(i)?;
        let end = *self.cells.get(i + 1)?;
        self.characters.get(start..end)
    }

    pub fn cell_str(&self, row: usize, column: usize) -> Cow<'_, str> {
        String::from_utf8_lossy(self.cell(row, column).unwrap_or_default())
    }

    /// Cells of one row, padding included
    pub fn row(&self, row: usize) -> impl Iterator<Item = &[u8]> {
        (0..self.width).filter_map(move |column| self.cell(row, column))
    }

    pub fn header(&self) -> impl Iterator<Item = &[u8]> {
        self.row(0)
    }

    /// Data rows in this window, header excluded
    pub fn data_rows(&self) -> usize {
        self.height.saturating_sub(1)
    }

    /// Whether the cell layout satisfies the indexing invariant
    pub fn is_well_formed(&self) -> bool {
        self.cells.len() == self.height * self.width + 1
            && self.cells.windows(2).all(|w| w[0] <= w[1])
            && self.cells.last().is_some_and(|&end| end <= self.characters.len())
    }

    /// Drop content but keep allocations for reuse
    pub fn clear(&mut self) {
        self.characters.clear();
        self.cells.clear();
        self.width = 0;
        self.height = 0;
        self.position = 0;
        self.total = 0;
        self.total_exact = false;
    }
}
