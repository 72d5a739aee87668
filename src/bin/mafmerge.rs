use std::fs;
use std::io::{self, BufRead, BufReader, IsTerminal};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mafcompare::errors::ComparatorError;
use mafcompare::io::{read_report, write_report};
use mafcompare::merge::merge_all;

/// Fold previously produced comparison reports into one cumulative
/// report.
///
/// Counters are summed elementwise per sequence pair and bucket, and
/// per-sample detail records are tagged with the report they came from.
/// Reports produced by incompatible comparator configurations are
/// rejected rather than silently summed.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct CliArgs {
    /// Report files to merge.
    reports: Vec<PathBuf>,

    /// Merge every *.json report in this directory.
    #[arg(long = "dir", conflicts_with = "list")]
    dir: Option<PathBuf>,

    /// A file naming one report path per line.
    #[arg(long = "list")]
    list: Option<PathBuf>,

    /// The output file for the folded report.
    #[arg(long = "out")]
    out: PathBuf,

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

/// Gather report paths from the positional arguments, the --dir scan and
/// the --list file, in that order. Directory entries are sorted so the
/// fold order is stable.
fn collect_report_paths(args: &CliArgs) -> Result<Vec<PathBuf>> {
    let mut paths = args.reports.clone();

    if let Some(dir) = &args.dir {
        let mut found = Vec::new();
        for entry in fs::read_dir(dir)
            .with_context(|| format!("could not read the report directory {}", dir.display()))?
        {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                found.push(path);
            }
        }
        found.sort();
        paths.extend(found);
    }

    if let Some(list) = &args.list {
        let reader = fs::File::open(list)
            .map(BufReader::new)
            .with_context(|| format!("could not open the report list {}", list.display()))?;
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                paths.push(PathBuf::from(trimmed));
            }
        }
    }

    if paths.is_empty() {
        return Err(ComparatorError::Configuration(
            "no input reports given; pass report paths, --dir or --list".to_string(),
        )
        .into());
    }
    Ok(paths)
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.verbose);

    let paths = collect_report_paths(&args)?;
    info!("merging {} reports", paths.len());

    let mut reports = Vec::with_capacity(paths.len());
    let mut labels = Vec::with_capacity(paths.len());
    for path in &paths {
        let report = read_report(path)
            .with_context(|| format!("could not load the report {}", path.display()))?;
        reports.push(report);
        labels.push(path.to_string_lossy().to_string());
    }

    let merged = merge_all(reports, &labels).context("the reports could not be merged")?;
    write_report(&args.out, &merged)
        .with_context(|| format!("could not write the merged report to {}", args.out.display()))?;
    info!("merged report written to {}", args.out.display());

    Ok(())
}
