//! Classification of sampled position pairs against an optional set of
//! restriction intervals.

use rustc_hash::FxHashMap;

use crate::errors::ComparatorError;

/// Where a sampled pair of positions falls relative to the supplied
/// restriction intervals. `All` is the unconditional bucket; the other
/// four partition it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RegionCategory {
    All,
    Both,
    OnlyFirst,
    OnlySecond,
    Neither,
}

/// Per-sequence sorted, disjoint, half-open intervals loaded from the
/// bed files. An empty map means no restriction was supplied and only
/// the `All` bucket exists downstream.
#[derive(Clone, Debug, Default)]
pub struct RegionMap {
    intervals: FxHashMap<String, Vec<(u64, u64)>>,
    sources: FxHashMap<String, String>,
}

impl RegionMap {
    /// Queue one interval. Validation happens in [`RegionMap::finish`].
    pub fn add(&mut self, seq: &str, start: u64, end: u64, source: &str) -> Result<(), ComparatorError> {
        self.intervals
            .entry(seq.to_string())
            .or_default()
            .push((start, end));
        self.sources
            .entry(seq.to_string())
            .or_insert_with(|| source.to_string());
        Ok(())
    }

    /// Sort every sequence's intervals and reject overlaps.
    pub fn finish(&mut self) -> Result<(), ComparatorError> {
        for (seq, intervals) in self.intervals.iter_mut() {
            intervals.sort_unstable();
            for w in intervals.windows(2) {
                if w[1].0 < w[0].1 {
                    return Err(ComparatorError::Format {
                        path: self.sources.get(seq).cloned().unwrap_or_default(),
                        line: None,
                        reason: format!(
                            "overlapping intervals for {seq}: [{}, {}) overlaps [{}, {})",
                            w[0].0, w[0].1, w[1].0, w[1].1
                        ),
                    });
                }
            }
        }
        Ok(())
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Whether the position falls inside any interval of its sequence.
    pub fn contains(&self, seq: &str, pos: u64) -> bool {
        let Some(intervals) = self.intervals.get(seq) else {
            return false;
        };
        // index of the last interval starting at or before pos
        let idx = intervals.partition_point(|&(start, _)| start <= pos);
        if idx == 0 {
            return false;
        }
        let (start, end) = intervals[idx - 1];
        start <= pos && pos < end
    }

    /// The sub-bucket a sampled pair belongs to. `All` is implicit and
    /// always incremented by the aggregator.
    pub fn classify(&self, seq1: &str, pos1: u64, seq2: &str, pos2: u64) -> RegionCategory {
        match (self.contains(seq1, pos1), self.contains(seq2, pos2)) {
            (true, true) => RegionCategory::Both,
            (true, false) => RegionCategory::OnlyFirst,
            (false, true) => RegionCategory::OnlySecond,
            (false, false) => RegionCategory::Neither,
        }
    }
}
