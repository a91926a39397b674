//! Decoded comparison keys
//!
//! Rows are compared often during a selection pass, so the sort columns are
//! copied out and number-parsed once per row instead of on every compare.

use std::cmp::Ordering;

use crate::csv::RowRecord;
use crate::query::ColumnSort;

#[derive(Debug, Clone, PartialEq)]
struct KeyCell {
    bytes: Box<[u8]>,
    number: Option<f64>,
}

impl KeyCell {
    fn new(bytes: &[u8]) -> Self {
        let number = std::str::from_utf8(bytes)
            .ok()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<f64>().ok());
        Self {
            bytes: bytes.into(),
            number,
        }
    }
}

/// The sort columns of one row, in sort order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SortKey {
    cells: Vec<Option<KeyCell>>,
}

impl SortKey {
    pub fn from_record(record: &RowRecord, order: &[ColumnSort]) -> Self {
        Self {
            cells: order
                .iter()
                .map(|sort| record.cell(sort.column).map(KeyCell::new))
                .collect(),
        }
    }

    /// Cell text of the `i`th sort column, if the row had that column
    pub fn cell(&self, i: usize) -> Option<&[u8]> {
        self.cells.get(i)?.as_ref().map(|c| &c.bytes[..])
    }
}

/// Missing cells first, then numbers numerically when both sides parse,
/// otherwise raw bytes
fn compare_cells(a: Option<&KeyCell>, b: Option<&KeyCell>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a.number, b.number) {
            (Some(x), Some(y)) => x.total_cmp(&y).then_with(|| a.bytes.cmp(&b.bytes)),
            _ => a.bytes.cmp(&b.bytes),
        },
    }
}

pub fn compare_keys(a: &SortKey, b: &SortKey, order: &[ColumnSort]) -> Ordering {
    for (i, sort) in order.iter().enumerate() {
        let ord = compare_cells(
            a.cells.get(i).and_then(Option::as_ref),
            b.cells.get(i).and_then(Option::as_ref),
        );
        let ord = if sort.ascending { ord } else { ord.reverse() };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// A row identified by its offset, with its decoded key
///
/// Ties on the key fall back to file order, so every row has a distinct
/// rank.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedRow {
    pub key: SortKey,
    pub offset: u64,
}

impl KeyedRow {
    pub fn from_record(record: &RowRecord, order: &[ColumnSort]) -> Self {
        Self {
            key: SortKey::from_record(record, order),
            offset: record.offset,
        }
    }

    pub fn cmp_in(&self, other: &KeyedRow, order: &[ColumnSort]) -> Ordering {
        compare_keys(&self.key, &other.key, order).then(self.offset.cmp(&other.offset))
    }
}
