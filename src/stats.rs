//! Accumulation of homology test outcomes, per sequence pair and in a
//! rollup, partitioned by region category.

use std::collections::BTreeMap;

use crate::regions::RegionCategory;

/// Outcome counters for one bucket.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Tally {
    pub tests: u64,
    pub passed: u64,
    pub failed: u64,
}

impl Tally {
    #[inline]
    pub fn record(&mut self, outcome: bool) {
        self.tests += 1;
        if outcome {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
    }

    #[inline]
    pub fn absorb(&mut self, other: &Tally) {
        self.tests += other.tests;
        self.passed += other.passed;
        self.failed += other.failed;
    }

    /// Fraction of tests that passed; 0.0 when no tests were recorded so
    /// a report never contains a NaN.
    #[inline]
    pub fn average(&self) -> f64 {
        if self.tests == 0 {
            0.0
        } else {
            self.passed as f64 / self.tests as f64
        }
    }
}

/// The four sub-buckets partitioning `all` when region files are active.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionTallies {
    pub both: Tally,
    pub only_first: Tally,
    pub only_second: Tally,
    pub neither: Tally,
}

impl RegionTallies {
    fn bucket_mut(&mut self, category: RegionCategory) -> &mut Tally {
        match category {
            RegionCategory::Both => &mut self.both,
            RegionCategory::OnlyFirst => &mut self.only_first,
            RegionCategory::OnlySecond => &mut self.only_second,
            RegionCategory::Neither => &mut self.neither,
            // `All` is not a sub-bucket; it is tracked separately.
            RegionCategory::All => unreachable!("All is tracked outside the region tallies"),
        }
    }

    fn absorb(&mut self, other: &RegionTallies) {
        self.both.absorb(&other.both);
        self.only_first.absorb(&other.only_first);
        self.only_second.absorb(&other.only_second);
        self.neither.absorb(&other.neither);
    }
}

/// Counters for one sequence pair (or the rollup).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct PairStats {
    pub all: Tally,
    pub regions: Option<RegionTallies>,
}

impl PairStats {
    fn record(&mut self, category: Option<RegionCategory>, outcome: bool) {
        self.all.record(outcome);
        if let Some(category) = category {
            self.regions.get_or_insert_with(Default::default).bucket_mut(category).record(outcome);
        }
    }

    fn absorb(&mut self, other: &PairStats) {
        self.all.absorb(&other.all);
        if let Some(theirs) = other.regions.as_ref() {
            self.regions.get_or_insert_with(Default::default).absorb(theirs);
        }
    }
}

/// Key for one unordered sequence pair.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct PairKey(pub String, pub String);

impl PairKey {
    pub fn new(seq1: &str, seq2: &str) -> Self {
        if seq1 <= seq2 {
            Self(seq1.to_string(), seq2.to_string())
        } else {
            Self(seq2.to_string(), seq1.to_string())
        }
    }
}

/// Accumulates the outcomes of one directional pass. Owned exclusively by
/// its pass; passes are combined with [`Aggregator::merge`] afterwards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Aggregator {
    overall: PairStats,
    pairs: BTreeMap<PairKey, PairStats>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one test outcome. `category` is the classified sub-bucket
    /// when region files are active, `None` otherwise; the `all` bucket
    /// is always incremented.
    pub fn record(
        &mut self,
        seq1: &str,
        seq2: &str,
        category: Option<RegionCategory>,
        outcome: bool,
    ) {
        self.overall.record(category, outcome);
        self.pairs
            .entry(PairKey::new(seq1, seq2))
            .or_default()
            .record(category, outcome);
    }

    /// Elementwise sum of two aggregators. Associative and commutative;
    /// pair keys present in only one side are copied through.
    pub fn merge(mut a: Aggregator, b: Aggregator) -> Aggregator {
        a.overall.absorb(&b.overall);
        for (key, stats) in b.pairs {
            a.pairs.entry(key).or_default().absorb(&stats);
        }
        a
    }

    #[inline]
    pub fn overall(&self) -> &PairStats {
        &self.overall
    }

    #[inline]
    pub fn pairs(&self) -> &BTreeMap<PairKey, PairStats> {
        &self.pairs
    }
}
