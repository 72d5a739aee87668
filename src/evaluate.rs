//! Homology testing of sampled pairs against the other file's index.

use tracing::debug;

use crate::index::AlignmentIndex;
use crate::regions::RegionMap;
use crate::sampler::SampleStream;
use crate::stats::Aggregator;

/// Whether two positions are within the near tolerance of each other.
/// `near = 0` requires exact equality.
#[inline]
pub fn close_enough(p1: u64, p2: u64, near: u64) -> bool {
    if p1 <= p2 {
        p1 + near >= p2
    } else {
        p2 + near >= p1
    }
}

/// Test one sampled homology claim against `other`. The claim holds if
/// any occurrence of (seq1, pos1) in `other` sits in a column where some
/// other row is named seq2 with a position within `near` of pos2. With
/// duplicate rows retained by the index, any one match suffices.
pub fn evaluate(
    other: &AlignmentIndex,
    seq1: &str,
    pos1: u64,
    seq2: &str,
    pos2: u64,
    near: u64,
) -> bool {
    for hit in other.lookup(seq1, pos1) {
        for member in other.column_members(hit.block, hit.col) {
            if member.row == hit.row {
                continue;
            }
            if other.row(hit.block, member.row).name == seq2 && close_enough(member.pos, pos2, near) {
                return true;
            }
        }
    }
    false
}

/// The recorded outcome of one sampled test, kept only when the caller
/// asked for per-sample detail in the report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SampleOutcome {
    pub seq1: String,
    pub pos1: u64,
    pub seq2: String,
    pub pos2: u64,
    pub passed: bool,
}

/// Everything one directional pass produces.
pub struct DirectionResult {
    pub aggregator: Aggregator,
    pub details: Option<Vec<SampleOutcome>>,
}

/// One directional pass: sample from `from`, test each claim against
/// `to`, aggregate. Region files classify outcomes but never restrict
/// what is sampled.
pub fn run_direction(
    from: &AlignmentIndex,
    to: &AlignmentIndex,
    samples: u64,
    seed: u64,
    near: u64,
    regions: &RegionMap,
    record_samples: bool,
) -> DirectionResult {
    debug!(
        "sampling {samples} pairs from {} against {} (seed {seed})",
        from.label(),
        to.label()
    );

    let mut aggregator = Aggregator::new();
    let mut details = record_samples.then(Vec::new);

    for sample in SampleStream::new(from, samples, seed) {
        let passed = evaluate(to, sample.seq1, sample.pos1, sample.seq2, sample.pos2, near);
        let category = (!regions.is_empty())
            .then(|| regions.classify(sample.seq1, sample.pos1, sample.seq2, sample.pos2));
        aggregator.record(sample.seq1, sample.seq2, category, passed);

        if let Some(details) = details.as_mut() {
            details.push(SampleOutcome {
                seq1: sample.seq1.to_string(),
                pos1: sample.pos1,
                seq2: sample.seq2.to_string(),
                pos2: sample.pos2,
                passed,
            });
        }
    }

    DirectionResult { aggregator, details }
}
