//! Offline folding of independently produced comparison reports into one
//! cumulative report.
//!
//! Merging is the associative elementwise sum of every counter bucket.
//! Reports produced by incompatible comparator configurations (different
//! near setting, different region-category shape, different sequence
//! pairs) must not be silently summed and are rejected instead.

use itertools::{EitherOrBoth, Itertools};

use crate::errors::ComparatorError;
use crate::io::report::{AggregateResults, HomologyTest, HomologyTests, Report, ResultLeaf, WigglePair};

/// Fold the reports left to right. `labels` carries one provenance label
/// per report; per-sample detail records that are not yet tagged get
/// their originating report's label so they stay traceable after the
/// merge.
pub fn merge_all(mut reports: Vec<Report>, labels: &[String]) -> Result<Report, ComparatorError> {
    if reports.is_empty() {
        return Err(ComparatorError::Configuration(
            "no reports to merge".to_string(),
        ));
    }
    if reports.len() != labels.len() {
        return Err(ComparatorError::Configuration(format!(
            "{} reports but {} provenance labels",
            reports.len(),
            labels.len()
        )));
    }

    for (report, label) in reports.iter_mut().zip(labels) {
        tag_details(report, label);
    }

    let mut reports = reports.into_iter();
    let mut acc = reports.next().unwrap();
    for next in reports {
        merge_into(&mut acc, next)?;
    }
    Ok(acc)
}

fn tag_details(report: &mut Report, label: &str) {
    for section in report.homology_tests.iter_mut() {
        for test in section.tests.iter_mut() {
            for single in test.singles.iter_mut().flatten() {
                single.src_file.get_or_insert_with(|| label.to_string());
            }
        }
    }
}

fn merge_into(acc: &mut Report, next: Report) -> Result<(), ComparatorError> {
    if acc.near != next.near {
        return Err(ComparatorError::ShapeMismatch(format!(
            "near settings differ: {} != {}",
            acc.near, next.near
        )));
    }
    if acc.homology_tests.len() != next.homology_tests.len() {
        return Err(ComparatorError::ShapeMismatch(format!(
            "direction counts differ: {} != {}",
            acc.homology_tests.len(),
            next.homology_tests.len()
        )));
    }

    for (dst, src) in acc.homology_tests.iter_mut().zip(next.homology_tests) {
        merge_section(dst, src)?;
    }

    acc.number_of_samples += next.number_of_samples;
    acc.wiggle_pairs = merge_wiggles(acc.wiggle_pairs.take(), next.wiggle_pairs)?;
    // maf paths, seed and pair counts stay those of the left-most report
    Ok(())
}

fn merge_section(dst: &mut HomologyTests, src: HomologyTests) -> Result<(), ComparatorError> {
    if dst.aggregate.has_regions() != src.aggregate.has_regions() {
        return Err(ComparatorError::ShapeMismatch(
            "one report partitions by region categories, the other does not".to_string(),
        ));
    }

    dst.aggregate = merge_aggregates(&dst.aggregate, &src.aggregate)?;

    let pair_key = |t: &HomologyTest| (t.sequence_a.clone(), t.sequence_b.clone());
    let mut merged = Vec::with_capacity(dst.tests.len());
    let dst_tests = std::mem::take(&mut dst.tests)
        .into_iter()
        .sorted_by_key(pair_key);
    let src_tests = src.tests.into_iter().sorted_by_key(pair_key);

    for entry in dst_tests.merge_join_by(src_tests, |a, b| pair_key(a).cmp(&pair_key(b))) {
        match entry {
            EitherOrBoth::Both(mut a, b) => {
                a.aggregate = merge_aggregates(&a.aggregate, &b.aggregate)?;
                match (a.singles.as_mut(), b.singles) {
                    (Some(mine), Some(theirs)) => mine.extend(theirs),
                    (None, Some(theirs)) => a.singles = Some(theirs),
                    _ => {}
                }
                merged.push(a);
            }
            EitherOrBoth::Left(t) | EitherOrBoth::Right(t) => {
                return Err(ComparatorError::ShapeMismatch(format!(
                    "sequence pair {}:{} is present in only one of the reports",
                    t.sequence_a, t.sequence_b
                )));
            }
        }
    }

    dst.tests = merged;
    Ok(())
}

fn merge_aggregates(
    a: &AggregateResults,
    b: &AggregateResults,
) -> Result<AggregateResults, ComparatorError> {
    let sum_opt = |x: &Option<ResultLeaf>, y: &Option<ResultLeaf>, bucket: &str| match (x, y) {
        (Some(x), Some(y)) => Ok(Some(sum_leaves(x, y))),
        (None, None) => Ok(None),
        _ => Err(ComparatorError::ShapeMismatch(format!(
            "region bucket {bucket} is present in only one of the reports"
        ))),
    };

    Ok(AggregateResults {
        all: sum_leaves(&a.all, &b.all),
        both: sum_opt(&a.both, &b.both, "both")?,
        a: sum_opt(&a.a, &b.a, "A")?,
        b: sum_opt(&a.b, &b.b, "B")?,
        neither: sum_opt(&a.neither, &b.neither, "neither")?,
    })
}

fn sum_leaves(a: &ResultLeaf, b: &ResultLeaf) -> ResultLeaf {
    let mut tally = a.to_tally();
    tally.absorb(&b.to_tally());
    ResultLeaf::from_tally(&tally)
}

fn merge_wiggles(
    a: Option<Vec<WigglePair>>,
    b: Option<Vec<WigglePair>>,
) -> Result<Option<Vec<WigglePair>>, ComparatorError> {
    let (a, b) = match (a, b) {
        (None, None) => return Ok(None),
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(ComparatorError::ShapeMismatch(
                "only one of the reports carries wiggle tracks".to_string(),
            ))
        }
    };

    let key = |w: &WigglePair| (w.reference.clone(), w.partner.clone());
    let mut merged = Vec::with_capacity(a.len());
    let a = a.into_iter().sorted_by_key(key);
    let b = b.into_iter().sorted_by_key(key);
    for entry in a.merge_join_by(b, |x, y| key(x).cmp(&key(y))) {
        match entry {
            EitherOrBoth::Both(mut x, y) => {
                if x.reference_length != y.reference_length || x.bin_length != y.bin_length {
                    return Err(ComparatorError::ShapeMismatch(format!(
                        "wiggle track {}:{} was binned differently in the two reports",
                        x.reference, x.partner
                    )));
                }
                sum_bins(&mut x.present_forward, &y.present_forward);
                sum_bins(&mut x.present_reverse, &y.present_reverse);
                sum_bins(&mut x.absent_forward, &y.absent_forward);
                sum_bins(&mut x.absent_reverse, &y.absent_reverse);
                merged.push(x);
            }
            EitherOrBoth::Left(w) | EitherOrBoth::Right(w) => {
                return Err(ComparatorError::ShapeMismatch(format!(
                    "wiggle track {}:{} is present in only one of the reports",
                    w.reference, w.partner
                )));
            }
        }
    }
    Ok(Some(merged))
}

fn sum_bins(dst: &mut [u64], src: &[u64]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d += s;
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::ComparatorError;
    use crate::evaluate::SampleOutcome;
    use crate::io::report::{HomologyTests, Report};
    use crate::stats::Aggregator;

    use super::merge_all;

    fn report(seed: u64, near: u64, outcomes: &[(&str, &str, bool)], with_details: bool) -> Report {
        let mut agg = Aggregator::new();
        for &(s1, s2, outcome) in outcomes {
            agg.record(s1, s2, None, outcome);
        }
        let details = with_details.then(|| {
            outcomes
                .iter()
                .map(|&(s1, s2, outcome)| SampleOutcome {
                    seq1: s1.to_string(),
                    pos1: 0,
                    seq2: s2.to_string(),
                    pos2: 0,
                    passed: outcome,
                })
                .collect::<Vec<_>>()
        });

        Report {
            number_of_samples: outcomes.len() as u64,
            near,
            seed,
            maf1: "a.maf".to_string(),
            maf2: "b.maf".to_string(),
            number_of_pairs_in_maf1: 100,
            number_of_pairs_in_maf2: 100,
            bed_files: None,
            version: "test".to_string(),
            homology_tests: vec![
                HomologyTests::from_pass("a.maf", "b.maf", &agg, details),
                HomologyTests::from_pass("b.maf", "a.maf", &agg, None),
            ],
            wiggle_pairs: None,
        }
    }

    #[test]
    fn test_counters_sum_and_averages_recompute() {
        let x = report(1, 0, &[("apple", "pear", true), ("apple", "pear", true)], false);
        let y = report(2, 0, &[("apple", "pear", false), ("apple", "pear", true)], false);

        let merged = merge_all(vec![x, y], &["x.json".to_string(), "y.json".to_string()]).unwrap();
        let section = &merged.homology_tests[0];
        assert_eq!(section.aggregate.all.total_tests, 4);
        assert_eq!(section.aggregate.all.total_true, 3);
        assert_eq!(section.aggregate.all.total_false, 1);
        assert_eq!(section.aggregate.all.average, 0.75);
        assert_eq!(merged.number_of_samples, 4);
        assert_eq!(merged.seed, 1);
    }

    #[test]
    fn test_details_get_provenance_labels() {
        let x = report(1, 0, &[("apple", "pear", true)], true);
        let y = report(2, 0, &[("apple", "pear", false)], true);

        let merged = merge_all(vec![x, y], &["x.json".to_string(), "y.json".to_string()]).unwrap();
        let singles = merged.homology_tests[0].tests[0].singles.as_ref().unwrap();
        assert_eq!(singles.len(), 2);
        assert_eq!(singles[0].src_file.as_deref(), Some("x.json"));
        assert_eq!(singles[1].src_file.as_deref(), Some("y.json"));
    }

    #[test]
    fn test_three_way_fold() {
        let reports = vec![
            report(1, 0, &[("apple", "pear", true)], false),
            report(2, 0, &[("apple", "pear", true)], false),
            report(3, 0, &[("apple", "pear", false)], false),
        ];
        let labels: Vec<String> = (1..=3).map(|i| format!("r{i}.json")).collect();
        let merged = merge_all(reports, &labels).unwrap();
        let all = &merged.homology_tests[0].tests[0].aggregate.all;
        assert_eq!(all.total_tests, 3);
        assert_eq!(all.total_true, 2);
    }

    #[test]
    fn test_fold_order_does_not_change_counters() {
        let x = report(1, 0, &[("apple", "pear", true), ("apple", "kiwi", false)], false);
        let y = report(2, 0, &[("apple", "pear", false), ("apple", "kiwi", false)], false);

        let xy = merge_all(vec![x.clone(), y.clone()], &["x".to_string(), "y".to_string()]).unwrap();
        let yx = merge_all(vec![y, x], &["y".to_string(), "x".to_string()]).unwrap();

        for (a, b) in xy.homology_tests.iter().zip(&yx.homology_tests) {
            assert_eq!(a.aggregate, b.aggregate);
            assert_eq!(a.tests, b.tests);
        }
        assert_eq!(xy.number_of_samples, yx.number_of_samples);
    }

    #[test]
    fn test_near_mismatch_rejected() {
        let x = report(1, 0, &[("apple", "pear", true)], false);
        let y = report(2, 5, &[("apple", "pear", true)], false);
        assert!(matches!(
            merge_all(vec![x, y], &["x".to_string(), "y".to_string()]),
            Err(ComparatorError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_pair_set_mismatch_rejected() {
        let x = report(1, 0, &[("apple", "pear", true)], false);
        let y = report(2, 0, &[("apple", "kiwi", true)], false);
        assert!(matches!(
            merge_all(vec![x, y], &["x".to_string(), "y".to_string()]),
            Err(ComparatorError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(matches!(
            merge_all(Vec::new(), &[]),
            Err(ComparatorError::Configuration(_))
        ));
    }
}
