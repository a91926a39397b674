//! Viewport requests

/// Where a viewport starts
///
/// Byte anchors address the file directly; rank anchors count data rows
/// (in sorted order when the request sorts, file order otherwise).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Anchor {
    /// Absolute byte offset; aligned forward to the next row start
    Byte(u64),
    /// Zero-based data-row rank, header excluded
    Rank(u64),
}

impl Default for Anchor {
    fn default() -> Self {
        Anchor::Byte(0)
    }
}

/// One sort key of a sorted view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnSort {
    pub column: usize,
    pub ascending: bool,
}

impl ColumnSort {
    pub fn ascending(column: usize) -> Self {
        Self {
            column,
            ascending: true,
        }
    }

    pub fn descending(column: usize) -> Self {
        Self {
            column,
            ascending: false,
        }
    }
}

/// A desired viewport
///
/// Compared field-wise to decide whether anything changed since the last
/// served request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    pub anchor: Anchor,
    /// Rows to skip past the anchor
    pub offset: u64,
    /// Data rows to materialize below the header
    pub window_height: usize,
    /// Sort order; empty means file order
    pub sort_columns: Vec<ColumnSort>,
    /// Presentation hint, not used for parsing
    pub column_widths: Vec<u32>,
}

impl Request {
    pub fn new(anchor: Anchor, window_height: usize) -> Self {
        Self {
            anchor,
            window_height,
            ..Self::default()
        }
    }

    /// Window starting at data row `rank`
    pub fn at_rank(rank: u64, window_height: usize) -> Self {
        Self::new(Anchor::Rank(rank), window_height)
    }

    /// Window starting at the first row at or after byte `offset`
    pub fn at_byte(offset: u64, window_height: usize) -> Self {
        Self::new(Anchor::Byte(offset), window_height)
    }

    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_sort(mut self, sort_columns: Vec<ColumnSort>) -> Self {
        self.sort_columns = sort_columns;
        self
    }

    pub fn with_window_height(mut self, window_height: usize) -> Self {
        self.window_height = window_height;
        self
    }

    pub fn is_sorted(&self) -> bool {
        !self.sort_columns.is_empty()
    }
}
