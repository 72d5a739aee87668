use std::io::{self, IsTerminal};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mafcompare::compare::{self, CompareOptions, DEFAULT_SAMPLES, DEFAULT_WIGGLE_BIN_LENGTH};
use mafcompare::errors::ComparatorError;
use mafcompare::io::write_report;

/// Compare the claimed base-to-base homologies of two MAF files.
///
/// For each ordered pair of the two inputs, a configurable number of
/// aligned position pairs is sampled from one file and checked against
/// the other; the proportions are reported per sequence pair in a JSON
/// report. Sampling is reproducible through the recorded seed.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct CliArgs {
    /// The first MAF file. When comparing true to predicted alignments,
    /// this is the truth.
    #[arg(long = "maf1")]
    maf1: PathBuf,

    /// The second MAF file. When comparing true to predicted alignments,
    /// this is the prediction.
    #[arg(long = "maf2")]
    maf2: PathBuf,

    /// The output JSON report file.
    #[arg(long = "out")]
    out: PathBuf,

    /// Number of homology tests to sample for each of the two directions.
    #[arg(long = "samples", default_value_t = DEFAULT_SAMPLES)]
    samples: u64,

    /// Number of bases a match may slip in the partner sequence and still
    /// count as true.
    #[arg(long = "near", default_value_t = 0)]
    near: u64,

    /// Seed for the random number generator, for exact reproduction of a
    /// prior run. If omitted a seed is generated; either way the seed is
    /// recorded in the report.
    #[arg(long = "seed")]
    seed: Option<u64>,

    /// Comma separated bed files whose intervals partition the sampled
    /// tests into region categories.
    #[arg(long = "bedFiles", value_delimiter = ',')]
    bed_files: Vec<PathBuf>,

    /// Comma separated reference:partner sequence name pairs to build
    /// per-base presence/absence wiggle tracks for.
    #[arg(long = "wigglePairs", value_delimiter = ',')]
    wiggle_pairs: Vec<String>,

    /// Bin length of the wiggle tracks.
    #[arg(long = "wiggleBinLength", default_value_t = DEFAULT_WIGGLE_BIN_LENGTH)]
    wiggle_bin_length: u64,

    /// Comma separated name:length declarations checked against the
    /// parsed inputs before any sampling happens.
    #[arg(long = "legitSequences", value_delimiter = ',')]
    legit_sequences: Vec<String>,

    /// The expected total number of alignable pairs in maf1 and maf2, as
    /// two comma separated integers, checked before any sampling happens.
    #[arg(long = "numberOfPairs")]
    number_of_pairs: Option<String>,

    /// Record every sampled test's outcome in the report.
    #[arg(long = "recordSamples")]
    record_samples: bool,

    /// Set verbosity level. Use multiple times to increase the verbosity level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .unwrap();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_file(false)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .with_env_filter(filter)
        .init();
}

fn parse_name_length(field: &str) -> Result<(String, u64), ComparatorError> {
    let bad = || {
        ComparatorError::Configuration(format!(
            "--legitSequences entries must look like name:length, got {field:?}"
        ))
    };
    let (name, length) = field.rsplit_once(':').ok_or_else(bad)?;
    if name.is_empty() {
        return Err(bad());
    }
    let length = length.parse::<u64>().map_err(|_| bad())?;
    Ok((name.to_string(), length))
}

fn parse_number_of_pairs(field: &str) -> Result<(u64, u64), ComparatorError> {
    let bad = || {
        ComparatorError::Configuration(format!(
            "--numberOfPairs must be two comma separated integers, got {field:?}"
        ))
    };
    let (first, second) = field.split_once(',').ok_or_else(bad)?;
    let first = first.trim().parse::<u64>().map_err(|_| bad())?;
    let second = second.trim().parse::<u64>().map_err(|_| bad())?;
    Ok((first, second))
}

fn build_options(args: &CliArgs) -> Result<CompareOptions, ComparatorError> {
    let mut options = CompareOptions::new(&args.maf1, &args.maf2);
    options.samples = args.samples;
    options.near = args.near;
    options.seed = args.seed;
    options.bed_files = args.bed_files.clone();
    options.wiggle_bin_length = args.wiggle_bin_length;
    options.record_samples = args.record_samples;

    for field in &args.legit_sequences {
        options.legit_sequences.push(parse_name_length(field)?);
    }
    for field in &args.wiggle_pairs {
        let (reference, partner) = field.split_once(':').ok_or_else(|| {
            ComparatorError::Configuration(format!(
                "--wigglePairs entries must look like reference:partner, got {field:?}"
            ))
        })?;
        options
            .wiggle_pairs
            .push((reference.to_string(), partner.to_string()));
    }
    if let Some(field) = &args.number_of_pairs {
        options.number_of_pairs = Some(parse_number_of_pairs(field)?);
    }

    Ok(options)
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    let options = build_options(&args)?;
    let report = compare::run(&options).with_context(|| {
        format!(
            "comparison of {} and {} failed",
            args.maf1.display(),
            args.maf2.display()
        )
    })?;

    write_report(&args.out, &report)
        .with_context(|| format!("could not write the report to {}", args.out.display()))?;
    info!("report written to {}", args.out.display());

    Ok(())
}
