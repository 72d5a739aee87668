//! Fixed-width binned presence/absence summary along one declared
//! reference:partner sequence pair.
//!
//! Unlike the sampled homology tests this is an exhaustive per-base scan,
//! and it is purely descriptive: each base of the reference either is or
//! is not aligned to the partner, in each file, and the counts land in
//! `offset / bin_length`.

use tracing::debug;

use crate::errors::ComparatorError;
use crate::index::AlignmentIndex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WiggleTrack {
    pub reference: String,
    pub partner: String,
    pub ref_length: u64,
    pub bin_length: u64,
    /// Reference bases aligned to the partner in the first file
    pub present_forward: Vec<u64>,
    /// Reference bases aligned to the partner in the second file
    pub present_reverse: Vec<u64>,
    pub absent_forward: Vec<u64>,
    pub absent_reverse: Vec<u64>,
}

impl WiggleTrack {
    #[inline]
    pub fn num_bins(&self) -> u64 {
        self.ref_length.div_ceil(self.bin_length)
    }
}

/// Scan every base of `reference` and record whether it is aligned to
/// `partner` in each of the two files.
pub fn build_wiggle_track(
    reference: &str,
    partner: &str,
    bin_length: u64,
    index1: &AlignmentIndex,
    index2: &AlignmentIndex,
) -> Result<WiggleTrack, ComparatorError> {
    if bin_length == 0 {
        return Err(ComparatorError::Configuration(
            "wiggle bin length must be positive".to_string(),
        ));
    }
    let ref_length = index1
        .sequence_length(reference)
        .or_else(|| index2.sequence_length(reference))
        .ok_or_else(|| {
            ComparatorError::Configuration(format!(
                "wiggle reference sequence {reference} appears in neither input"
            ))
        })?;
    if index1.sequence_length(partner).is_none() && index2.sequence_length(partner).is_none() {
        return Err(ComparatorError::Configuration(format!(
            "wiggle partner sequence {partner} appears in neither input"
        )));
    }

    debug!("building wiggle track {reference}:{partner}, {ref_length} bases");

    let num_bins = ref_length.div_ceil(bin_length) as usize;
    let mut track = WiggleTrack {
        reference: reference.to_string(),
        partner: partner.to_string(),
        ref_length,
        bin_length,
        present_forward: vec![0; num_bins],
        present_reverse: vec![0; num_bins],
        absent_forward: vec![0; num_bins],
        absent_reverse: vec![0; num_bins],
    };

    for offset in 0..ref_length {
        let bin = (offset / bin_length) as usize;
        if aligned_to(index1, reference, offset, partner) {
            track.present_forward[bin] += 1;
        } else {
            track.absent_forward[bin] += 1;
        }
        if aligned_to(index2, reference, offset, partner) {
            track.present_reverse[bin] += 1;
        } else {
            track.absent_reverse[bin] += 1;
        }
    }

    Ok(track)
}

fn aligned_to(index: &AlignmentIndex, seq: &str, pos: u64, partner: &str) -> bool {
    index.lookup(seq, pos).iter().any(|hit| {
        index
            .column_members(hit.block, hit.col)
            .iter()
            .any(|m| m.row != hit.row && index.row(hit.block, m.row).name == partner)
    })
}

#[cfg(test)]
mod tests {
    use crate::errors::ComparatorError;
    use crate::mock::{block, index_of};

    use super::build_wiggle_track;

    #[test]
    fn test_identical_sequences_fill_every_bin() {
        let make = || {
            index_of(vec![block(&[
                ("apple", 0, '+', 10, "ACGTACGTAC"),
                ("pear", 0, '+', 10, "ACGTACGTAC"),
            ])])
        };
        let (index1, index2) = (make(), make());

        let track = build_wiggle_track("apple", "pear", 2, &index1, &index2).unwrap();
        assert_eq!(track.num_bins(), 5);
        assert_eq!(track.present_forward, vec![2, 2, 2, 2, 2]);
        assert_eq!(track.present_reverse, vec![2, 2, 2, 2, 2]);
        assert_eq!(track.absent_forward, vec![0, 0, 0, 0, 0]);
        assert_eq!(track.absent_reverse, vec![0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_partial_alignment() {
        // apple is 12 bases long but only [0, 4) aligns to pear, and only
        // in the first file
        let index1 = index_of(vec![block(&[
            ("apple", 0, '+', 12, "ACGT"),
            ("pear", 0, '+', 10, "ACGT"),
        ])]);
        let index2 = index_of(vec![block(&[
            ("apple", 0, '+', 12, "ACGT"),
            ("kiwi", 0, '+', 10, "ACGT"),
        ])]);

        let track = build_wiggle_track("apple", "pear", 5, &index1, &index2).unwrap();
        assert_eq!(track.num_bins(), 3);
        assert_eq!(track.present_forward, vec![4, 0, 0]);
        assert_eq!(track.absent_forward, vec![1, 5, 2]);
        assert_eq!(track.present_reverse, vec![0, 0, 0]);
        assert_eq!(track.absent_reverse, vec![5, 5, 2]);
    }

    #[test]
    fn test_unknown_sequences_rejected() {
        let index = index_of(vec![block(&[
            ("apple", 0, '+', 10, "ACGT"),
            ("pear", 0, '+', 10, "ACGT"),
        ])]);
        assert!(matches!(
            build_wiggle_track("banana", "pear", 2, &index, &index),
            Err(ComparatorError::Configuration(_))
        ));
        assert!(matches!(
            build_wiggle_track("apple", "banana", 2, &index, &index),
            Err(ComparatorError::Configuration(_))
        ));
        assert!(matches!(
            build_wiggle_track("apple", "pear", 0, &index, &index),
            Err(ComparatorError::Configuration(_))
        ));
    }
}
