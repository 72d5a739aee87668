//! Whole-run orchestration: build both indices, run the pre-flight
//! checks, run the two directional passes, and assemble the report.

use std::path::PathBuf;
use std::thread;

use tracing::info;

use crate::errors::ComparatorError;
use crate::evaluate::{run_direction, DirectionResult};
use crate::index::AlignmentIndex;
use crate::io::bed::read_bed_files;
use crate::io::maf::read_maf_file;
use crate::io::report::{HomologyTests, Report, WigglePair};
use crate::sampler::{verify_declared_lengths, verify_declared_pair_count};
use crate::wiggle::build_wiggle_track;

pub const DEFAULT_SAMPLES: u64 = 1_000_000;
pub const DEFAULT_WIGGLE_BIN_LENGTH: u64 = 100_000;

/// Everything one comparison run needs; mirrors the CLI surface.
#[derive(Clone, Debug)]
pub struct CompareOptions {
    pub maf1: PathBuf,
    pub maf2: PathBuf,

    /// Number of homology tests to sample per direction
    pub samples: u64,

    /// Coordinate distance still counted as a match
    pub near: u64,

    /// Random seed; generated and recorded when not supplied
    pub seed: Option<u64>,

    pub bed_files: Vec<PathBuf>,

    /// (reference, partner) pairs to build wiggle tracks for
    pub wiggle_pairs: Vec<(String, String)>,
    pub wiggle_bin_length: u64,

    /// Declared name:length expectations, checked before sampling
    pub legit_sequences: Vec<(String, u64)>,

    /// Declared alignable-pair counts for (maf1, maf2)
    pub number_of_pairs: Option<(u64, u64)>,

    /// Keep every sample's outcome in the report
    pub record_samples: bool,
}

impl CompareOptions {
    pub fn new(maf1: impl Into<PathBuf>, maf2: impl Into<PathBuf>) -> Self {
        Self {
            maf1: maf1.into(),
            maf2: maf2.into(),
            samples: DEFAULT_SAMPLES,
            near: 0,
            seed: None,
            bed_files: Vec::new(),
            wiggle_pairs: Vec::new(),
            wiggle_bin_length: DEFAULT_WIGGLE_BIN_LENGTH,
            legit_sequences: Vec::new(),
            number_of_pairs: None,
            record_samples: false,
        }
    }
}

/// Run one full comparison. Nothing is written to disk here; the caller
/// serializes the returned report, so a failure anywhere below leaves no
/// partial output behind.
pub fn run(options: &CompareOptions) -> Result<Report, ComparatorError> {
    let label1 = options.maf1.to_string_lossy().to_string();
    let label2 = options.maf2.to_string_lossy().to_string();

    info!("indexing {label1}");
    let index1 = AlignmentIndex::build(read_maf_file(&options.maf1)?, &label1)?;
    info!("indexing {label2}");
    let index2 = AlignmentIndex::build(read_maf_file(&options.maf2)?, &label2)?;

    check_cross_file_lengths(&index1, &index2)?;

    let regions = read_bed_files(&options.bed_files)?;

    // Pre-flight expectation checks: abort before any sampling work.
    verify_declared_lengths(&index1, &options.legit_sequences)?;
    verify_declared_lengths(&index2, &options.legit_sequences)?;
    if let Some((pairs1, pairs2)) = options.number_of_pairs {
        verify_declared_pair_count(&index1, pairs1)?;
        verify_declared_pair_count(&index2, pairs2)?;
    }
    for (reference, partner) in &options.wiggle_pairs {
        for name in [reference, partner] {
            if index1.sequence_length(name).is_none() && index2.sequence_length(name).is_none() {
                return Err(ComparatorError::Configuration(format!(
                    "wiggle sequence {name} appears in neither input"
                )));
            }
        }
    }

    let seed = options.seed.unwrap_or_else(rand::random);
    let mut seed_state = seed;
    let seed1 = splitmix64(&mut seed_state);
    let seed2 = splitmix64(&mut seed_state);
    info!("seed {seed} (directional sub-seeds {seed1}, {seed2})");

    // The two directional passes share nothing but the immutable indices,
    // so they can run side by side; each owns its aggregator until the
    // join below.
    let (dir1, dir2) = thread::scope(|scope| {
        let pass1 = scope.spawn(|| {
            run_direction(
                &index1,
                &index2,
                options.samples,
                seed1,
                options.near,
                &regions,
                options.record_samples,
            )
        });
        let pass2 = scope.spawn(|| {
            run_direction(
                &index2,
                &index1,
                options.samples,
                seed2,
                options.near,
                &regions,
                options.record_samples,
            )
        });
        (join_pass(pass1), join_pass(pass2))
    });

    let wiggle_pairs = if options.wiggle_pairs.is_empty() {
        None
    } else {
        let tracks = options
            .wiggle_pairs
            .iter()
            .map(|(reference, partner)| {
                build_wiggle_track(reference, partner, options.wiggle_bin_length, &index1, &index2)
                    .map(WigglePair::from)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Some(tracks)
    };

    let bed_files = if options.bed_files.is_empty() {
        None
    } else {
        Some(
            options
                .bed_files
                .iter()
                .map(|p| p.to_string_lossy().to_string())
                .collect(),
        )
    };

    Ok(Report {
        number_of_samples: options.samples,
        near: options.near,
        seed,
        maf1: label1.clone(),
        maf2: label2.clone(),
        number_of_pairs_in_maf1: index1.pair_count(),
        number_of_pairs_in_maf2: index2.pair_count(),
        bed_files,
        version: env!("CARGO_PKG_VERSION").to_string(),
        homology_tests: vec![
            HomologyTests::from_pass(&label1, &label2, &dir1.aggregator, dir1.details),
            HomologyTests::from_pass(&label2, &label1, &dir2.aggregator, dir2.details),
        ],
        wiggle_pairs,
    })
}

fn join_pass(handle: thread::ScopedJoinHandle<'_, DirectionResult>) -> DirectionResult {
    match handle.join() {
        Ok(result) => result,
        Err(panic) => std::panic::resume_unwind(panic),
    }
}

/// A sequence appearing in both files must declare the same source length
/// in both, otherwise positions are not comparable at all.
fn check_cross_file_lengths(
    index1: &AlignmentIndex,
    index2: &AlignmentIndex,
) -> Result<(), ComparatorError> {
    for name in index1.sequence_names() {
        if let (Some(len1), Some(len2)) = (index1.sequence_length(name), index2.sequence_length(name))
        {
            if len1 != len2 {
                return Err(ComparatorError::Format {
                    path: index2.label().to_string(),
                    line: None,
                    reason: format!(
                        "conflicting source lengths for sequence {name} between the inputs: \
                         {len1} and {len2}"
                    ),
                });
            }
        }
    }
    Ok(())
}

fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e3779b97f4a7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use crate::errors::ComparatorError;

    use super::{run, CompareOptions};

    struct TempMaf {
        path: PathBuf,
    }

    impl TempMaf {
        fn new(name: &str, contents: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "mafcompare-{}-{}-{name}",
                std::process::id(),
                std::thread::current().name().unwrap_or("t").replace("::", "-"),
            ));
            fs::write(&path, contents).unwrap();
            Self { path }
        }
    }

    impl Drop for TempMaf {
        fn drop(&mut self) {
            fs::remove_file(&self.path).ok();
        }
    }

    const IDENTICAL: &str = "\
##maf version=1
a score=0
s apple 0 10 + 10 ACGTACGTAC
s pear 0 10 + 10 ACGTACGTAC
";

    #[test]
    fn test_identical_files_all_tests_pass() {
        let maf1 = TempMaf::new("id1.maf", IDENTICAL);
        let maf2 = TempMaf::new("id2.maf", IDENTICAL);

        let mut options = CompareOptions::new(&maf1.path, &maf2.path);
        options.samples = 10;
        options.seed = Some(7);
        let report = run(&options).unwrap();

        assert_eq!(report.seed, 7);
        assert_eq!(report.number_of_pairs_in_maf1, 10);
        assert_eq!(report.homology_tests.len(), 2);
        for section in &report.homology_tests {
            assert_eq!(section.aggregate.all.total_tests, 10);
            assert_eq!(section.aggregate.all.total_true, 10);
            assert_eq!(section.aggregate.all.total_false, 0);
            assert_eq!(section.aggregate.all.average, 1.0);
            assert!(!section.aggregate.has_regions());
        }
    }

    #[test]
    fn test_runs_are_reproducible_for_a_given_seed() {
        let maf1 = TempMaf::new("rep1.maf", IDENTICAL);
        let maf2 = TempMaf::new("rep2.maf", IDENTICAL);

        let mut options = CompareOptions::new(&maf1.path, &maf2.path);
        options.samples = 50;
        options.seed = Some(1234);

        let first = serde_json::to_string(&run(&options).unwrap()).unwrap();
        let second = serde_json::to_string(&run(&options).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_declared_length_mismatch_aborts() {
        let maf1 = TempMaf::new("legit1.maf", IDENTICAL);
        let maf2 = TempMaf::new("legit2.maf", IDENTICAL);

        let mut options = CompareOptions::new(&maf1.path, &maf2.path);
        options.samples = 10;
        options.legit_sequences = vec![("apple".to_string(), 10), ("pear".to_string(), 11)];
        assert!(matches!(
            run(&options),
            Err(ComparatorError::ExpectationMismatch { .. })
        ));
    }

    #[test]
    fn test_declared_pair_count_mismatch_aborts() {
        let maf1 = TempMaf::new("pairs1.maf", IDENTICAL);
        let maf2 = TempMaf::new("pairs2.maf", IDENTICAL);

        let mut options = CompareOptions::new(&maf1.path, &maf2.path);
        options.number_of_pairs = Some((10, 11));
        assert!(matches!(
            run(&options),
            Err(ComparatorError::ExpectationMismatch { .. })
        ));
    }

    #[test]
    fn test_cross_file_length_conflict_aborts() {
        let maf1 = TempMaf::new("conflict1.maf", IDENTICAL);
        let maf2 = TempMaf::new(
            "conflict2.maf",
            "a score=0\ns apple 0 10 + 12 ACGTACGTAC\ns pear 0 10 + 10 ACGTACGTAC\n",
        );

        let options = CompareOptions::new(&maf1.path, &maf2.path);
        assert!(matches!(run(&options), Err(ComparatorError::Format { .. })));
    }

    #[test]
    fn test_wiggle_tracks_in_report() {
        let maf1 = TempMaf::new("wig1.maf", IDENTICAL);
        let maf2 = TempMaf::new("wig2.maf", IDENTICAL);

        let mut options = CompareOptions::new(&maf1.path, &maf2.path);
        options.samples = 5;
        options.seed = Some(3);
        options.wiggle_pairs = vec![("apple".to_string(), "pear".to_string())];
        options.wiggle_bin_length = 2;

        let report = run(&options).unwrap();
        let wiggles = report.wiggle_pairs.unwrap();
        assert_eq!(wiggles.len(), 1);
        assert_eq!(wiggles[0].number_of_bins, 5);
        assert_eq!(wiggles[0].present_forward, vec![2, 2, 2, 2, 2]);
        assert_eq!(wiggles[0].absent_reverse, vec![0, 0, 0, 0, 0]);
    }
}
