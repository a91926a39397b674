//! Rank selection over an unsorted file
//!
//! A sorted view never materializes the file. Instead the selector runs
//! quickselect-style passes over the rows, narrowing a key interval around
//! the requested ranks until the interval is small enough to sort in memory.
//! Every candidate it classifies becomes an exact [`Pivot`]; the pivots of
//! one sort order are kept in a [`PivotSet`] so later windows start from
//! tighter bounds.

mod key;
mod selector;
mod spill;

pub use key::{compare_keys, KeyedRow, SortKey};
pub use selector::{Selection, Selector, MATERIALIZE_LIMIT, SPILL_FRACTION};
pub use spill::{SpillReader, SpillWriter};

/// A row whose sorted rank is known within bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pivot {
    pub byte_offset: u64,
    pub rank_lower_bound: u64,
    pub rank_upper_bound: u64,
}

impl Pivot {
    pub fn exact(byte_offset: u64, rank: u64) -> Self {
        Self {
            byte_offset,
            rank_lower_bound: rank,
            rank_upper_bound: rank,
        }
    }

    pub fn is_exact(&self) -> bool {
        self.rank_lower_bound == self.rank_upper_bound
    }
}

/// Pivots known for one sort order, ordered by rank
#[derive(Debug, Clone, Default)]
pub struct PivotSet {
    pivots: Vec<(Pivot, SortKey)>,
    total_rows: Option<u64>,
}

impl PivotSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.pivots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pivots.is_empty()
    }

    pub fn pivots(&self) -> impl Iterator<Item = &Pivot> {
        self.pivots.iter().map(|(p, _)| p)
    }

    /// Data-row count, once a pass has read the whole file
    pub fn total_rows(&self) -> Option<u64> {
        self.total_rows
    }

    pub fn set_total_rows(&mut self, total: u64) {
        self.total_rows = Some(total);
    }

    /// Add a pivot, replacing any earlier entry for the same row
    pub fn insert(&mut self, pivot: Pivot, key: SortKey) {
        if let Some(existing) = self
            .pivots
            .iter_mut()
            .find(|(p, _)| p.byte_offset == pivot.byte_offset)
        {
            existing.0 = pivot;
            return;
        }
        let i = self
            .pivots
            .partition_point(|(p, _)| p.rank_lower_bound < pivot.rank_lower_bound);
        self.pivots.insert(i, (pivot, key));
    }

    /// Exact pivot of a specific row
    pub fn find(&self, byte_offset: u64) -> Option<&Pivot> {
        self.pivots
            .iter()
            .map(|(p, _)| p)
            .find(|p| p.byte_offset == byte_offset && p.is_exact())
    }

    /// Highest exact pivot ranked below `rank`
    pub fn below(&self, rank: u64) -> Option<KeyedPivot<'_>> {
        self.pivots
            .iter()
            .filter(|(p, _)| p.is_exact() && p.rank_upper_bound < rank)
            .max_by_key(|(p, _)| p.rank_upper_bound)
            .map(KeyedPivot::from)
    }

    /// Lowest exact pivot ranked at or above `rank`
    pub fn at_or_above(&self, rank: u64) -> Option<KeyedPivot<'_>> {
        self.pivots
            .iter()
            .filter(|(p, _)| p.is_exact() && p.rank_lower_bound >= rank)
            .min_by_key(|(p, _)| p.rank_lower_bound)
            .map(KeyedPivot::from)
    }
}

/// A pivot together with its decoded key
#[derive(Debug, Clone, Copy)]
pub struct KeyedPivot<'a> {
    pub pivot: &'a Pivot,
    pub key: &'a SortKey,
}

impl<'a> From<&'a (Pivot, SortKey)> for KeyedPivot<'a> {
    fn from((pivot, key): &'a (Pivot, SortKey)) -> Self {
        Self { pivot, key }
    }
}

impl KeyedPivot<'_> {
    pub fn row(&self) -> KeyedRow {
        KeyedRow {
            key: self.key.clone(),
            offset: self.pivot.byte_offset,
        }
    }
}
