//! Reproducible random sampling of aligned position pairs from an
//! [`AlignmentIndex`].

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::errors::ComparatorError;
use crate::index::AlignmentIndex;
use crate::regions::RegionMap;

/// One sampled homology claim: two positions the source file says are
/// aligned to each other.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SampleRecord<'a> {
    /// Label of the file the claim was drawn from
    pub source: &'a str,
    pub seq1: &'a str,
    pub pos1: u64,
    pub seq2: &'a str,
    pub pos2: u64,
}

/// Give up on a draw after this many consecutive rejections. Only
/// reachable with a region filter whose acceptance region is (nearly)
/// empty; the stream then ends early instead of spinning.
const MAX_CONSECUTIVE_REJECTIONS: u64 = 1_000_000;

/// A lazy, finite stream of [`SampleRecord`]s. The same seed over the
/// same index content yields a bit-identical stream.
///
/// Each draw picks a column uniformly across the whole file (blocks are
/// implicitly weighted by their width), then two distinct rows present at
/// that column. Columns with fewer than two rows, and draws rejected by
/// the region filter, are redrawn.
pub struct SampleStream<'a> {
    index: &'a AlignmentIndex,
    rng: StdRng,
    remaining: u64,
    /// Cumulative block widths; the last entry is the total column count
    cum_columns: Vec<u64>,
    filter: Option<&'a RegionMap>,
}

impl<'a> SampleStream<'a> {
    pub fn new(index: &'a AlignmentIndex, count: u64, seed: u64) -> Self {
        let mut cum_columns = Vec::with_capacity(index.num_blocks());
        let mut total = 0u64;
        for b in 0..index.num_blocks() {
            total += index.block_width(b as u32);
            cum_columns.push(total);
        }

        Self {
            index,
            rng: StdRng::seed_from_u64(seed),
            remaining: count,
            cum_columns,
            filter: None,
        }
    }

    /// Restrict sampling to records whose seq1 position falls inside the
    /// given regions. Rejected draws are redrawn; the stream order is
    /// otherwise unaffected. An empty map is ignored.
    pub fn with_region_filter(mut self, filter: &'a RegionMap) -> Self {
        if !filter.is_empty() {
            self.filter = Some(filter);
        }
        self
    }
}

impl<'a> Iterator for SampleStream<'a> {
    type Item = SampleRecord<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 || self.index.pair_count() == 0 {
            return None;
        }
        let total_columns = *self.cum_columns.last()?;

        let mut rejections = 0u64;
        loop {
            if rejections >= MAX_CONSECUTIVE_REJECTIONS {
                tracing::warn!(
                    "sampling gave up after {rejections} consecutive rejections; \
                     the region filter may not overlap the alignment"
                );
                self.remaining = 0;
                return None;
            }

            let x = self.rng.gen_range(0..total_columns);
            let block = self.cum_columns.partition_point(|&c| c <= x) as u32;
            let col_base = match block {
                0 => 0,
                b => self.cum_columns[b as usize - 1],
            };
            let col = (x - col_base) as u32;

            let members = self.index.column_members(block, col);
            if members.len() < 2 {
                rejections += 1;
                continue;
            }

            // Two distinct member rows, uniformly.
            let i = self.rng.gen_range(0..members.len());
            let mut j = self.rng.gen_range(0..members.len() - 1);
            if j >= i {
                j += 1;
            }
            let (m1, m2) = (members[i], members[j]);
            let row1 = self.index.row(block, m1.row);

            if let Some(filter) = self.filter {
                if !filter.contains(&row1.name, m1.pos) {
                    rejections += 1;
                    continue;
                }
            }

            let row2 = self.index.row(block, m2.row);
            self.remaining -= 1;
            return Some(SampleRecord {
                source: self.index.label(),
                seq1: &row1.name,
                pos1: m1.pos,
                seq2: &row2.name,
                pos2: m2.pos,
            });
        }
    }
}

/// Check declared `name:length` expectations against the indexed data.
/// Every declared name must be present with exactly the declared length.
pub fn verify_declared_lengths(
    index: &AlignmentIndex,
    declared: &[(String, u64)],
) -> Result<(), ComparatorError> {
    for (name, length) in declared {
        match index.sequence_length(name) {
            Some(actual) if actual == *length => {}
            Some(actual) => {
                return Err(ComparatorError::ExpectationMismatch {
                    what: format!("length of sequence {name}"),
                    declared: length.to_string(),
                    actual: actual.to_string(),
                })
            }
            None => {
                return Err(ComparatorError::ExpectationMismatch {
                    what: format!("length of sequence {name}"),
                    declared: length.to_string(),
                    actual: format!("sequence absent from {}", index.label()),
                })
            }
        }
    }
    Ok(())
}

/// Check a declared total pair count against the index's actual
/// alignable-pair count.
pub fn verify_declared_pair_count(
    index: &AlignmentIndex,
    declared: u64,
) -> Result<(), ComparatorError> {
    if index.pair_count() != declared {
        return Err(ComparatorError::ExpectationMismatch {
            what: format!("number of pairs in {}", index.label()),
            declared: declared.to_string(),
            actual: index.pair_count().to_string(),
        });
    }
    Ok(())
}
