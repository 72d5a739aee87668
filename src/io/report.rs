//! The serialized comparison report: a JSON tree mirroring the layout of
//! the classic comparator output, with two `homology_tests` halves (one
//! per direction) that are never combined into one number.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::ComparatorError;
use crate::evaluate::SampleOutcome;
use crate::stats::{Aggregator, PairKey, PairStats, RegionTallies, Tally};
use crate::wiggle::WiggleTrack;

/// Counters for one bucket of one pair (or a rollup).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResultLeaf {
    #[serde(rename = "totalTests")]
    pub total_tests: u64,
    #[serde(rename = "totalTrue")]
    pub total_true: u64,
    #[serde(rename = "totalFalse")]
    pub total_false: u64,
    pub average: f64,
}

impl ResultLeaf {
    pub fn from_tally(tally: &Tally) -> Self {
        Self {
            total_tests: tally.tests,
            total_true: tally.passed,
            total_false: tally.failed,
            average: tally.average(),
        }
    }

    pub fn to_tally(self) -> Tally {
        Tally {
            tests: self.total_tests,
            passed: self.total_true,
            failed: self.total_false,
        }
    }
}

/// The `all` bucket plus the four region sub-buckets. The sub-buckets are
/// present only when region files were active during the run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregateResults {
    pub all: ResultLeaf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub both: Option<ResultLeaf>,
    #[serde(rename = "A", skip_serializing_if = "Option::is_none")]
    pub a: Option<ResultLeaf>,
    #[serde(rename = "B", skip_serializing_if = "Option::is_none")]
    pub b: Option<ResultLeaf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neither: Option<ResultLeaf>,
}

impl AggregateResults {
    pub fn from_stats(stats: &PairStats) -> Self {
        let regions = |f: fn(&RegionTallies) -> &Tally| {
            stats.regions.as_ref().map(|r| ResultLeaf::from_tally(f(r)))
        };
        Self {
            all: ResultLeaf::from_tally(&stats.all),
            both: regions(|r| &r.both),
            a: regions(|r| &r.only_first),
            b: regions(|r| &r.only_second),
            neither: regions(|r| &r.neither),
        }
    }

    /// Whether the region sub-buckets are present; part of a report's
    /// shape when merging.
    pub fn has_regions(&self) -> bool {
        self.both.is_some()
    }
}

/// One recorded sample, kept when the comparator was asked for per-sample
/// detail. `src_file` is filled in by the merge tool.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SingleHomologyTest {
    #[serde(rename = "sequenceA")]
    pub sequence_a: String,
    #[serde(rename = "positionA")]
    pub position_a: u64,
    #[serde(rename = "sequenceB")]
    pub sequence_b: String,
    #[serde(rename = "positionB")]
    pub position_b: u64,
    pub outcome: bool,
    #[serde(rename = "srcFile", skip_serializing_if = "Option::is_none")]
    pub src_file: Option<String>,
}

/// Results for one sequence pair in one direction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HomologyTest {
    #[serde(rename = "sequenceA")]
    pub sequence_a: String,
    #[serde(rename = "sequenceB")]
    pub sequence_b: String,
    #[serde(rename = "aggregate_results")]
    pub aggregate: AggregateResults,
    #[serde(rename = "single_homology_test", skip_serializing_if = "Option::is_none")]
    pub singles: Option<Vec<SingleHomologyTest>>,
}

/// One direction of the comparison: sampled from `file_a`, tested
/// against `file_b`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HomologyTests {
    #[serde(rename = "fileA")]
    pub file_a: String,
    #[serde(rename = "fileB")]
    pub file_b: String,
    #[serde(rename = "aggregate_results")]
    pub aggregate: AggregateResults,
    #[serde(rename = "homology_test")]
    pub tests: Vec<HomologyTest>,
}

impl HomologyTests {
    /// Assemble one direction's section from its pass results. Per-sample
    /// details, when recorded, are attached to their pair's entry.
    pub fn from_pass(
        file_a: &str,
        file_b: &str,
        aggregator: &Aggregator,
        details: Option<Vec<SampleOutcome>>,
    ) -> Self {
        let mut singles_by_pair: BTreeMap<PairKey, Vec<SingleHomologyTest>> = BTreeMap::new();
        if let Some(details) = details {
            for outcome in details {
                let key = PairKey::new(&outcome.seq1, &outcome.seq2);
                singles_by_pair.entry(key).or_default().push(SingleHomologyTest {
                    sequence_a: outcome.seq1,
                    position_a: outcome.pos1,
                    sequence_b: outcome.seq2,
                    position_b: outcome.pos2,
                    outcome: outcome.passed,
                    src_file: None,
                });
            }
        }

        let tests = aggregator
            .pairs()
            .iter()
            .map(|(key, stats)| HomologyTest {
                sequence_a: key.0.clone(),
                sequence_b: key.1.clone(),
                aggregate: AggregateResults::from_stats(stats),
                singles: singles_by_pair.remove(key),
            })
            .collect();

        Self {
            file_a: file_a.to_string(),
            file_b: file_b.to_string(),
            aggregate: AggregateResults::from_stats(aggregator.overall()),
            tests,
        }
    }
}

/// Binned per-base presence counts for one declared reference:partner
/// pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WigglePair {
    pub reference: String,
    pub partner: String,
    #[serde(rename = "referenceLength")]
    pub reference_length: u64,
    #[serde(rename = "binLength")]
    pub bin_length: u64,
    #[serde(rename = "numberOfBins")]
    pub number_of_bins: u64,
    #[serde(rename = "presentForward")]
    pub present_forward: Vec<u64>,
    #[serde(rename = "presentReverse")]
    pub present_reverse: Vec<u64>,
    #[serde(rename = "absentForward")]
    pub absent_forward: Vec<u64>,
    #[serde(rename = "absentReverse")]
    pub absent_reverse: Vec<u64>,
}

impl From<WiggleTrack> for WigglePair {
    fn from(track: WiggleTrack) -> Self {
        Self {
            number_of_bins: track.num_bins(),
            reference: track.reference,
            partner: track.partner,
            reference_length: track.ref_length,
            bin_length: track.bin_length,
            present_forward: track.present_forward,
            present_reverse: track.present_reverse,
            absent_forward: track.absent_forward,
            absent_reverse: track.absent_reverse,
        }
    }
}

/// The whole serialized report of one comparison run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(rename = "numberOfSamples")]
    pub number_of_samples: u64,
    pub near: u64,
    pub seed: u64,
    pub maf1: String,
    pub maf2: String,
    #[serde(rename = "numberOfPairsInMaf1")]
    pub number_of_pairs_in_maf1: u64,
    #[serde(rename = "numberOfPairsInMaf2")]
    pub number_of_pairs_in_maf2: u64,
    #[serde(rename = "bedFiles", skip_serializing_if = "Option::is_none")]
    pub bed_files: Option<Vec<String>>,
    pub version: String,
    #[serde(rename = "homology_tests")]
    pub homology_tests: Vec<HomologyTests>,
    #[serde(rename = "wigglePairs", skip_serializing_if = "Option::is_none")]
    pub wiggle_pairs: Option<Vec<WigglePair>>,
}

pub fn write_report(path: impl AsRef<Path>, report: &Report) -> Result<(), ComparatorError> {
    let mut writer = File::create(path).map(BufWriter::new)?;
    serde_json::to_writer_pretty(&mut writer, report)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

pub fn read_report(path: impl AsRef<Path>) -> Result<Report, ComparatorError> {
    let reader = File::open(path).map(BufReader::new)?;
    Ok(serde_json::from_reader(reader)?)
}
