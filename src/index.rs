//! Queryable position index over the alignment blocks of one MAF file.
//!
//! Every non-gap character of every row is addressable by its
//! forward-strand position. Rows are decomposed into *runs* (maximal
//! gap-free column spans); a per-sequence table of interval records over
//! those runs makes point lookup a binary search. Duplicate alignments of
//! the same position across blocks or rows are retained as separate
//! records, so a query can return more than one hit.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::ComparatorError;
use crate::io::maf::{MafBlock, MafRow, Strand};

/// One occurrence of an aligned position: the block, the row within the
/// block, and the column of the gapped text.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ColumnHit {
    pub block: u32,
    pub row: u32,
    pub col: u32,
}

/// A row present (non-gap) at a queried column, with the forward-strand
/// position of its base there.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ColumnMember {
    pub row: u32,
    pub pos: u64,
}

/// A maximal gap-free span of one row. `abs` is the forward-strand
/// position of the base in the first column of the span; positions ascend
/// along forward rows and descend along reverse rows.
#[derive(Copy, Clone, Debug)]
struct Run {
    col: u32,
    len: u32,
    abs: u64,
}

/// Interval record over the forward-strand positions `[lo, hi)` covered
/// by one run, referenced by integer index.
#[derive(Copy, Clone, Debug)]
struct Entry {
    lo: u64,
    hi: u64,
    block: u32,
    row: u32,
    run: u32,
}

#[derive(Clone, Debug, Default)]
struct SeqIndex {
    /// Source sequence length as declared by the rows
    length: u64,

    /// Interval records sorted by `lo`; records of duplicate rows may overlap
    entries: Vec<Entry>,

    /// Widest interval, bounds the backward scan in [`AlignmentIndex::lookup`]
    max_span: u64,
}

/// Immutable index over all blocks of one file. Built once, then only
/// queried; safe to share between the two directional passes.
#[derive(Clone, Debug)]
pub struct AlignmentIndex {
    label: String,
    blocks: Vec<MafBlock>,
    runs: Vec<Vec<Vec<Run>>>,
    seqs: FxHashMap<String, SeqIndex>,
    pair_count: u64,
    total_columns: u64,
}

impl AlignmentIndex {
    /// Index the given blocks. Fails on any geometry that cannot be
    /// indexed safely: rows disagreeing on block width, a length field
    /// that does not match the non-gap character count, a row exceeding
    /// its source length, or a sequence whose source length changes
    /// between rows.
    pub fn build(blocks: Vec<MafBlock>, label: &str) -> Result<Self, ComparatorError> {
        let format_err = |reason: String| ComparatorError::Format {
            path: label.to_string(),
            line: None,
            reason,
        };

        let mut runs: Vec<Vec<Vec<Run>>> = Vec::with_capacity(blocks.len());
        let mut seqs: FxHashMap<String, SeqIndex> = FxHashMap::default();
        let mut seen_lengths: FxHashMap<String, u64> = FxHashMap::default();
        let mut pair_count = 0u64;
        let mut total_columns = 0u64;

        for (b, block) in blocks.iter().enumerate() {
            let width = block.width();
            // +1 presence slot so run ends can decrement past the last column
            let mut presence = vec![0i64; width + 1];
            let mut block_runs = Vec::with_capacity(block.rows.len());

            for (r, row) in block.rows.iter().enumerate() {
                if row.text.len() != width {
                    return Err(format_err(format!(
                        "block {b}: row {} disagrees on block width ({} != {width})",
                        row.name,
                        row.text.len()
                    )));
                }
                let non_gap = row.text.bytes().filter(|&c| c != b'-').count() as u64;
                if non_gap != row.length {
                    return Err(format_err(format!(
                        "block {b}: row {} declares {} aligned bases but its text has {non_gap}",
                        row.name, row.length
                    )));
                }
                if row.start + row.length > row.src_size {
                    return Err(format_err(format!(
                        "block {b}: row {} extends past its source length ({} + {} > {})",
                        row.name, row.start, row.length, row.src_size
                    )));
                }

                match seen_lengths.get(&row.name) {
                    None => {
                        seen_lengths.insert(row.name.clone(), row.src_size);
                    }
                    Some(&len) if len != row.src_size => {
                        return Err(format_err(format!(
                            "conflicting source lengths for sequence {}: {} and {}",
                            row.name, len, row.src_size
                        )));
                    }
                    Some(_) => {}
                }
                let seq = seqs.entry(row.name.clone()).or_default();
                seq.length = row.src_size;

                let row_runs = collect_runs(row);
                for (i, run) in row_runs.iter().enumerate() {
                    presence[run.col as usize] += 1;
                    presence[(run.col + run.len) as usize] -= 1;

                    let (lo, hi) = match row.strand {
                        Strand::Forward => (run.abs, run.abs + run.len as u64),
                        Strand::Reverse => (run.abs - (run.len as u64 - 1), run.abs + 1),
                    };
                    seq.entries.push(Entry {
                        lo,
                        hi,
                        block: b as u32,
                        row: r as u32,
                        run: i as u32,
                    });
                }
                block_runs.push(row_runs);
            }

            // Tally the alignable pairs contributed by each column.
            let mut present = 0i64;
            for &delta in presence[..width].iter() {
                present += delta;
                pair_count += (present * (present - 1) / 2) as u64;
            }
            total_columns += width as u64;
            runs.push(block_runs);
        }

        for seq in seqs.values_mut() {
            seq.entries.sort_unstable_by_key(|e| (e.lo, e.block, e.row, e.run));
            seq.max_span = seq.entries.iter().map(|e| e.hi - e.lo).max().unwrap_or(0);
        }

        Ok(Self {
            label: label.to_string(),
            blocks,
            runs,
            seqs,
            pair_count,
            total_columns,
        })
    }

    /// Every occurrence of the given forward-strand position, empty if
    /// the position is unaligned in this file.
    pub fn lookup(&self, seq: &str, pos: u64) -> SmallVec<[ColumnHit; 2]> {
        let mut hits = SmallVec::new();
        let Some(si) = self.seqs.get(seq) else {
            return hits;
        };

        let idx = si.entries.partition_point(|e| e.lo <= pos);
        for e in si.entries[..idx].iter().rev() {
            if e.lo.saturating_add(si.max_span) <= pos {
                break;
            }
            if pos < e.hi {
                let run = &self.runs[e.block as usize][e.row as usize][e.run as usize];
                let col = match self.row(e.block, e.row).strand {
                    Strand::Forward => run.col + (pos - e.lo) as u32,
                    Strand::Reverse => run.col + (e.hi - 1 - pos) as u32,
                };
                hits.push(ColumnHit { block: e.block, row: e.row, col });
            }
        }
        // the backward scan collects in descending entry order
        hits.reverse();
        hits
    }

    /// Every row present (non-gap) at the given block column, with the
    /// forward-strand position each row aligns there.
    pub fn column_members(&self, block: u32, col: u32) -> SmallVec<[ColumnMember; 8]> {
        let mut members = SmallVec::new();
        for (r, row_runs) in self.runs[block as usize].iter().enumerate() {
            let idx = row_runs.partition_point(|run| run.col <= col);
            if idx == 0 {
                continue;
            }
            let run = &row_runs[idx - 1];
            if col < run.col + run.len {
                let pos = match self.row(block, r as u32).strand {
                    Strand::Forward => run.abs + (col - run.col) as u64,
                    Strand::Reverse => run.abs - (col - run.col) as u64,
                };
                members.push(ColumnMember { row: r as u32, pos });
            }
        }
        members
    }

    #[inline]
    pub fn row(&self, block: u32, row: u32) -> &MafRow {
        &self.blocks[block as usize].rows[row as usize]
    }

    #[inline]
    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    #[inline]
    pub fn block_width(&self, block: u32) -> u64 {
        self.blocks[block as usize].width() as u64
    }

    /// Total number of alignable position pairs: the sum over all columns
    /// of `C(k, 2)` where `k` is the number of rows present.
    #[inline]
    pub fn pair_count(&self) -> u64 {
        self.pair_count
    }

    /// Sum of all block widths; the sampler's column space.
    #[inline]
    pub fn total_columns(&self) -> u64 {
        self.total_columns
    }

    pub fn sequence_length(&self, seq: &str) -> Option<u64> {
        self.seqs.get(seq).map(|s| s.length)
    }

    pub fn sequence_names(&self) -> impl Iterator<Item = &str> {
        self.seqs.keys().map(|s| s.as_str())
    }

    /// The file label this index was built from, used for provenance.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }
}

fn collect_runs(row: &MafRow) -> Vec<Run> {
    let mut runs = Vec::new();
    if row.length == 0 {
        return runs;
    }

    let first = row.first_position();
    let mut consumed = 0u64;
    let mut open: Option<(u32, u64)> = None; // (start column, consumed before run)
    for (c, ch) in row.text.bytes().enumerate() {
        if ch != b'-' {
            if open.is_none() {
                open = Some((c as u32, consumed));
            }
            consumed += 1;
        } else if let Some((col, run_consumed)) = open.take() {
            runs.push(make_run(row, first, col, c as u32 - col, run_consumed));
        }
    }
    if let Some((col, run_consumed)) = open.take() {
        runs.push(make_run(row, first, col, row.text.len() as u32 - col, run_consumed));
    }
    runs
}

fn make_run(row: &MafRow, first: u64, col: u32, len: u32, consumed_before: u64) -> Run {
    let abs = match row.strand {
        Strand::Forward => first + consumed_before,
        Strand::Reverse => first - consumed_before,
    };
    Run { col, len, abs }
}

#[cfg(test)]
mod tests {
    use crate::mock::{block, index_of};

    use super::*;

    #[test]
    fn test_forward_lookup() {
        let index = index_of(vec![block(&[("apple", 0, '+', 20, "ACGTACGTAC")])]);
        let hits = index.lookup("apple", 3);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0], ColumnHit { block: 0, row: 0, col: 3 });
        assert!(index.lookup("apple", 10).is_empty());
        assert!(index.lookup("banana", 3).is_empty());
    }

    #[test]
    fn test_gapped_runs() {
        // bases at positions 5..7 (cols 0..2) and 7..11 (cols 4..8)
        let index = index_of(vec![block(&[("apple", 5, '+', 20, "AC--GTAC")])]);
        assert_eq!(index.lookup("apple", 6)[0].col, 1);
        assert_eq!(index.lookup("apple", 7)[0].col, 4);
        assert_eq!(index.lookup("apple", 10)[0].col, 7);
        assert!(index.lookup("apple", 11).is_empty());
    }

    #[test]
    fn test_reverse_strand_positions() {
        // reverse row: start 2, 8 bases, source 30. The first aligned base
        // sits at forward position 30 - 2 - 1 = 27 and positions descend.
        let index = index_of(vec![block(&[("pear", 2, '-', 30, "AC--GTACGT")])]);
        assert_eq!(index.lookup("pear", 27)[0].col, 0);
        assert_eq!(index.lookup("pear", 26)[0].col, 1);
        assert_eq!(index.lookup("pear", 25)[0].col, 4);
        assert_eq!(index.lookup("pear", 20)[0].col, 9);
        assert!(index.lookup("pear", 19).is_empty());
        assert!(index.lookup("pear", 28).is_empty());
    }

    #[test]
    fn test_duplicates_are_retained() {
        let index = index_of(vec![
            block(&[("apple", 0, '+', 20, "ACGTACGTAC"), ("pear", 0, '+', 10, "ACGTACGTAC")]),
            block(&[("apple", 0, '+', 20, "ACGTACGTAC"), ("kiwi", 0, '+', 10, "ACGTACGTAC")]),
        ]);
        let hits = index.lookup("apple", 4);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].block, 0);
        assert_eq!(hits[1].block, 1);
    }

    #[test]
    fn test_column_members() {
        let index = index_of(vec![block(&[
            ("apple", 0, '+', 20, "ACGT-C"),
            ("pear", 10, '-', 30, "AC--GT"),
            ("kiwi", 3, '+', 10, "--GTAC"),
        ])]);

        let members = index.column_members(0, 0);
        assert_eq!(members.len(), 2);
        assert_eq!(members[0], ColumnMember { row: 0, pos: 0 });
        assert_eq!(members[1], ColumnMember { row: 1, pos: 19 });

        let members = index.column_members(0, 4);
        assert_eq!(members.len(), 2);
        assert_eq!(members[0], ColumnMember { row: 1, pos: 17 });
        assert_eq!(members[1], ColumnMember { row: 2, pos: 5 });

        let members = index.column_members(0, 5);
        assert_eq!(members.len(), 3);
    }

    #[test]
    fn test_pair_count() {
        // ten all-present columns of two rows
        let index = index_of(vec![block(&[
            ("apple", 0, '+', 20, "ACGTACGTAC"),
            ("pear", 0, '+', 10, "ACGTACGTAC"),
        ])]);
        assert_eq!(index.pair_count(), 10);

        // columns with a single present row contribute nothing
        let index = index_of(vec![block(&[
            ("apple", 0, '+', 20, "ACGT"),
            ("pear", 0, '+', 10, "AC--"),
        ])]);
        assert_eq!(index.pair_count(), 2);

        // three present rows contribute C(3, 2) per column
        let index = index_of(vec![block(&[
            ("apple", 0, '+', 20, "AC"),
            ("pear", 0, '+', 10, "AC"),
            ("kiwi", 0, '+', 10, "AC"),
        ])]);
        assert_eq!(index.pair_count(), 6);
    }

    #[test]
    fn test_width_mismatch_rejected() {
        let result = AlignmentIndex::build(
            vec![block(&[("apple", 0, '+', 20, "ACGT"), ("pear", 0, '+', 10, "AC")])],
            "bad.maf",
        );
        assert!(matches!(result, Err(ComparatorError::Format { .. })));
    }

    #[test]
    fn test_length_field_mismatch_rejected() {
        let mut b = block(&[("apple", 0, '+', 20, "AC-T")]);
        b.rows[0].length = 4;
        let result = AlignmentIndex::build(vec![b], "bad.maf");
        assert!(matches!(result, Err(ComparatorError::Format { .. })));
    }

    #[test]
    fn test_overrunning_row_rejected() {
        let result =
            AlignmentIndex::build(vec![block(&[("apple", 18, '+', 20, "ACGT")])], "bad.maf");
        assert!(matches!(result, Err(ComparatorError::Format { .. })));
    }

    #[test]
    fn test_conflicting_source_length_rejected() {
        let result = AlignmentIndex::build(
            vec![
                block(&[("apple", 0, '+', 20, "ACGT")]),
                block(&[("apple", 4, '+', 21, "ACGT")]),
            ],
            "bad.maf",
        );
        assert!(matches!(result, Err(ComparatorError::Format { .. })));
    }

    #[test]
    fn test_lookup_scans_past_short_entries() {
        // A long interval sorted before several short ones must still be
        // found when the query lands beyond the short intervals' ends.
        let long_run = "A".repeat(50);
        let short_run = "A".repeat(40);
        let index = index_of(vec![
            block(&[("apple", 0, '+', 100, long_run.as_str())]),
            block(&[("apple", 60, '+', 100, "ACGT")]),
            block(&[("apple", 0, '+', 100, short_run.as_str())]),
        ]);
        assert_eq!(index.lookup("apple", 45).len(), 1);
        assert_eq!(index.lookup("apple", 20).len(), 2);
        assert_eq!(index.lookup("apple", 61).len(), 1);
    }
}
