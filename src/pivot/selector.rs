//! Quickselect over file scans
//!
//! Each pass streams the rows inside the current key interval, counts how
//! many rank below each candidate pivot, and keeps a reservoir sample. The
//! candidates for the next pass are picked from the sample just outside the
//! requested ranks, so the interval shrinks by roughly the sample's
//! resolution on every pass regardless of the file's existing order.

use std::cmp::Ordering;
use std::io::{self, Read, Seek};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::key::KeyedRow;
use super::spill::{SpillReader, SpillWriter};
use super::{Pivot, PivotSet};
use crate::csv::{Dialect, RowReader, RowRecord};
use crate::query::ColumnSort;

/// Largest interval sorted in memory
pub const MATERIALIZE_LIMIT: usize = 4096;

/// Spill once the interval is expected to be at most this share of the
/// rows being scanned
pub const SPILL_FRACTION: f64 = 0.25;

const SAMPLE_SIZE: usize = 256;
const SEED: u64 = 0x5eed_b7ac_e000_0001;

/// Where a pass reads rows from
trait RowSource {
    fn rewind(&mut self) -> io::Result<()>;
    fn next_row(&mut self, record: &mut RowRecord) -> io::Result<bool>;
}

struct FileRows<'a, R> {
    reader: &'a mut RowReader<R>,
    data_start: u64,
}

impl<R: Read + Seek> RowSource for FileRows<'_, R> {
    fn rewind(&mut self) -> io::Result<()> {
        self.reader.seek(self.data_start, 1)
    }

    fn next_row(&mut self, record: &mut RowRecord) -> io::Result<bool> {
        self.reader.next_row(record)
    }
}

impl RowSource for SpillReader {
    fn rewind(&mut self) -> io::Result<()> {
        SpillReader::rewind(self)
    }

    fn next_row(&mut self, record: &mut RowRecord) -> io::Result<bool> {
        SpillReader::next_row(self, record)
    }
}

/// Open key interval around the requested ranks
#[derive(Debug, Clone, Default)]
struct Bounds {
    lower: Option<KeyedRow>,
    /// Rows ranked at or below `lower`
    below: u64,
    upper: Option<KeyedRow>,
}

impl Bounds {
    fn from_pivots(pivots: &PivotSet, start: u64, end: u64) -> Self {
        let lower = pivots.below(start);
        Self {
            below: lower.map_or(0, |p| p.pivot.rank_upper_bound + 1),
            lower: lower.map(|p| p.row()),
            upper: pivots.at_or_above(end).map(|p| p.row()),
        }
    }

    fn contains(&self, row: &KeyedRow, order: &[ColumnSort]) -> bool {
        self.lower
            .as_ref()
            .map_or(true, |lower| row.cmp_in(lower, order) == Ordering::Greater)
            && self
                .upper
                .as_ref()
                .map_or(true, |upper| row.cmp_in(upper, order) == Ordering::Less)
    }

    fn tighten(&mut self, row: &KeyedRow, rank: u64, start: u64, end: u64, order: &[ColumnSort]) {
        if rank < start {
            if rank + 1 > self.below {
                self.lower = Some(row.clone());
                self.below = rank + 1;
            }
        } else if rank >= end
            && self
                .upper
                .as_ref()
                .map_or(true, |upper| row.cmp_in(upper, order) == Ordering::Less)
        {
            self.upper = Some(row.clone());
        }
    }
}

struct Pass {
    rows_seen: u64,
    interval: u64,
    /// Per candidate, interval rows ranked below it
    less: Vec<u64>,
    /// All interval rows, unless there were more than the limit
    collected: Option<Vec<KeyedRow>>,
    sample: Vec<KeyedRow>,
}

/// Rows of one window in sorted order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    /// Byte offsets of the window rows, in rank order
    pub offsets: Vec<u64>,
    /// Data rows in the file
    pub total_rows: u64,
    pub passes: usize,
}

pub struct Selector<'a> {
    order: &'a [ColumnSort],
    dialect: Dialect,
    materialize_limit: usize,
    spill_fraction: f64,
}

impl<'a> Selector<'a> {
    pub fn new(order: &'a [ColumnSort], dialect: Dialect) -> Self {
        Self {
            order,
            dialect,
            materialize_limit: MATERIALIZE_LIMIT,
            spill_fraction: SPILL_FRACTION,
        }
    }

    pub fn with_materialize_limit(mut self, limit: usize) -> Self {
        self.materialize_limit = limit.max(1);
        self
    }

    /// `0.0` disables spilling
    pub fn with_spill_fraction(mut self, fraction: f64) -> Self {
        self.spill_fraction = fraction.clamp(0.0, 1.0);
        self
    }

    /// Find the rows ranked `start..start + count`
    ///
    /// `data_start` is the offset of the first data row. Pivots learned on
    /// the way are added to `pivots`, which must belong to this sort order
    /// and this version of the file.
    pub fn select<R: Read + Seek>(
        &self,
        reader: &mut RowReader<R>,
        data_start: u64,
        pivots: &mut PivotSet,
        start: u64,
        count: usize,
    ) -> io::Result<Selection> {
        let order = self.order;
        let end = start.saturating_add(count as u64);
        let limit = self.materialize_limit.max(count.saturating_mul(2));

        let mut bounds = Bounds::from_pivots(pivots, start, end);
        let mut rng = StdRng::seed_from_u64(SEED ^ start);
        let mut file = FileRows { reader, data_start };
        let mut spilled: Option<SpillReader> = None;
        let mut spill_next = false;
        let mut candidates: Vec<KeyedRow> = Vec::new();
        let mut passes = 0;
        // Set when the last pass could not narrow the interval
        let mut collect_all = false;
        let mut last_interval = u64::MAX;

        loop {
            if let Some(total) = pivots.total_rows() {
                if count == 0 || start >= total {
                    return Ok(Selection {
                        offsets: Vec::new(),
                        total_rows: total,
                        passes,
                    });
                }
            }

            passes += 1;
            let pass_bounds = bounds.clone();
            let mut writer = if spill_next {
                Some(SpillWriter::new(self.dialect)?)
            } else {
                None
            };
            let from_file = spilled.is_none();
            let source: &mut dyn RowSource = match spilled.as_mut() {
                Some(spill) => spill,
                None => &mut file,
            };
            let pass_limit = if collect_all { usize::MAX } else { limit };
            let pass = self.pass(
                source,
                &pass_bounds,
                &candidates,
                writer.as_mut(),
                pass_limit,
                &mut rng,
            )?;
            if from_file {
                pivots.set_total_rows(pass.rows_seen);
            }
            if let Some(writer) = writer {
                spilled = Some(writer.finish()?);
                spill_next = false;
            }
            tracing::debug!(
                "Selector pass {}: {} of {} rows in interval, {} below",
                passes,
                pass.interval,
                pass.rows_seen,
                pass_bounds.below
            );

            for (candidate, less) in candidates.iter().zip(&pass.less) {
                let rank = pass_bounds.below + less;
                pivots.insert(Pivot::exact(candidate.offset, rank), candidate.key.clone());
                bounds.tighten(candidate, rank, start, end, order);
            }

            if let Some(mut rows) = pass.collected {
                rows.sort_by(|a, b| a.cmp_in(b, order));
                self.remember(pivots, &rows, pass_bounds.below, count);
                let skip = start.saturating_sub(pass_bounds.below) as usize;
                let offsets = rows.iter().skip(skip).take(count).map(|r| r.offset).collect();
                return Ok(Selection {
                    offsets,
                    total_rows: pivots.total_rows().unwrap_or(pass.rows_seen),
                    passes,
                });
            }

            let (next, expected) = self.next_candidates(pass.sample, pass.interval, &bounds, start, end);
            // Without a pick or a smaller interval the next pass would repeat
            // this one, so sort whatever is left in memory instead
            collect_all = next.is_empty() || pass.interval >= last_interval;
            if collect_all {
                tracing::debug!(
                    "Selector stalled at {} rows, collecting the interval",
                    pass.interval
                );
            }
            last_interval = pass.interval;
            candidates = next;
            spill_next = !collect_all
                && self.spill_fraction > 0.0
                && expected as usize > limit
                && (expected as f64) <= self.spill_fraction * pass.rows_seen as f64;
        }
    }

    /// Sorted rank of the row starting at `offset`
    ///
    /// Returns `None` when the offset is at or past end of file.
    pub fn rank_of<R: Read + Seek>(
        &self,
        reader: &mut RowReader<R>,
        data_start: u64,
        pivots: &mut PivotSet,
        offset: u64,
    ) -> io::Result<Option<u64>> {
        if let Some(pivot) = pivots.find(offset) {
            return Ok(Some(pivot.rank_lower_bound));
        }
        let order = self.order;
        let mut record = RowRecord::new();
        reader.seek(offset, 0)?;
        if !reader.next_row(&mut record)? {
            return Ok(None);
        }
        let target = KeyedRow::from_record(&record, order);

        let mut file = FileRows { reader, data_start };
        file.rewind()?;
        let mut rank = 0;
        let mut rows = 0;
        while file.next_row(&mut record)? {
            rows += 1;
            if KeyedRow::from_record(&record, order).cmp_in(&target, order) == Ordering::Less {
                rank += 1;
            }
        }
        pivots.set_total_rows(rows);
        pivots.insert(Pivot::exact(offset, rank), target.key);
        Ok(Some(rank))
    }

    fn pass(
        &self,
        source: &mut dyn RowSource,
        bounds: &Bounds,
        candidates: &[KeyedRow],
        mut spill: Option<&mut SpillWriter>,
        limit: usize,
        rng: &mut StdRng,
    ) -> io::Result<Pass> {
        let order = self.order;
        let mut pass = Pass {
            rows_seen: 0,
            interval: 0,
            less: vec![0; candidates.len()],
            collected: Some(Vec::new()),
            sample: Vec::with_capacity(SAMPLE_SIZE),
        };
        let mut record = RowRecord::new();
        source.rewind()?;
        while source.next_row(&mut record)? {
            pass.rows_seen += 1;
            let row = KeyedRow::from_record(&record, order);
            if !bounds.contains(&row, order) {
                continue;
            }
            pass.interval += 1;

            for (less, candidate) in pass.less.iter_mut().zip(candidates) {
                if row.cmp_in(candidate, order) == Ordering::Less {
                    *less += 1;
                }
            }
            if let Some(spill) = spill.as_deref_mut() {
                spill.push(&record)?;
            }

            let full = pass.collected.as_ref().is_some_and(|c| c.len() >= limit);
            if full {
                pass.collected = None;
            } else if let Some(collected) = pass.collected.as_mut() {
                collected.push(row.clone());
            }

            // Reservoir sampling
            if pass.sample.len() < SAMPLE_SIZE {
                pass.sample.push(row);
            } else {
                let j = rng.random_range(0..pass.interval);
                if j < SAMPLE_SIZE as u64 {
                    pass.sample[j as usize] = row;
                }
            }
        }
        Ok(pass)
    }

    /// Pick candidates bracketing `start..end` from a pass sample
    ///
    /// Also returns the expected size of the interval under `bounds`.
    fn next_candidates(
        &self,
        sample: Vec<KeyedRow>,
        sampled_from: u64,
        bounds: &Bounds,
        start: u64,
        end: u64,
    ) -> (Vec<KeyedRow>, u64) {
        let order = self.order;
        let drawn = sample.len();
        let mut inside: Vec<KeyedRow> = sample
            .into_iter()
            .filter(|row| bounds.contains(row, order))
            .collect();
        if drawn == 0 || inside.is_empty() {
            return (Vec::new(), 0);
        }
        inside.sort_by(|a, b| a.cmp_in(b, order));

        let s = inside.len() as f64;
        let expected = sampled_from as f64 * s / drawn as f64;
        let scale = s / expected.max(1.0);
        let margin = s.sqrt().ceil();
        let lo = start.saturating_sub(bounds.below) as f64 * scale - margin;
        let hi = (end.saturating_sub(bounds.below) as f64 * scale + margin).ceil();

        let mut picks = Vec::with_capacity(2);
        if lo >= 0.0 {
            picks.push(inside[(lo as usize).min(inside.len() - 1)].clone());
        }
        if hi < s {
            picks.push(inside[hi as usize].clone());
        }
        (picks, expected.round() as u64)
    }

    /// Keep exact pivots across a sorted interval so nearby windows start
    /// from tight bounds
    fn remember(&self, pivots: &mut PivotSet, rows: &[KeyedRow], below: u64, count: usize) {
        let step = count.max(1);
        let last = rows.len().saturating_sub(1);
        for i in (0..rows.len()).step_by(step).chain((!rows.is_empty()).then_some(last)) {
            let row = &rows[i];
            pivots.insert(Pivot::exact(row.offset, below + i as u64), row.key.clone());
        }
    }
}
