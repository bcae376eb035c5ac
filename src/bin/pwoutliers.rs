//! pwoutliers - find size outliers
//!
//! Walks a tree and reports children far from their directory's mean
//! size: unusually large subtrees by default, unusually small ones with
//! `--below`. Handy for spotting what actually fills a scratch
//! filesystem, or which of a thousand supposedly-identical result
//! directories came out truncated.

use anyhow::{Context, Result};
use clap::Parser;
use parwalk::config::{default_jobs, init_logging};
use parwalk::ops::outliers::{OutlierMode, OutlierVisitor};
use parwalk::{ExcludeSet, WalkOptions, Walker};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

const DEFAULT_ABOVE: f64 = 10.0;
const DEFAULT_BELOW: f64 = 100.0;

/// Report per-directory size outliers
#[derive(Parser, Debug)]
#[command(
    name = "pwoutliers",
    version,
    about = "Find entries far from their directory's mean size",
    after_help = "EXAMPLES:\n    \
        pwoutliers /mnt/scratch            # >= 10x the directory mean\n    \
        pwoutliers -g50 /mnt/scratch       # >= 50x\n    \
        pwoutliers -l /mnt/results         # <= 1/100 of the mean"
)]
struct Args {
    /// Trees to scan
    #[arg(value_name = "PATH", required = true)]
    paths: Vec<PathBuf>,

    /// Scan N files at a time
    #[arg(short, long, default_value_t = default_jobs(), value_name = "N")]
    jobs: usize,

    /// Exclude entries matching PATTERN (repeatable)
    #[arg(short, long, value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Report entries at least FACTOR times the mean (default mode)
    #[arg(
        short = 'g',
        long = "above",
        value_name = "FACTOR",
        num_args = 0..=1,
        default_missing_value = "10",
        conflicts_with = "below"
    )]
    above: Option<f64>,

    /// Report entries at most 1/FACTOR of the mean
    #[arg(
        short = 'l',
        long = "below",
        value_name = "FACTOR",
        num_args = 0..=1,
        default_missing_value = "100"
    )]
    below: Option<f64>,

    /// Log more (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("pwoutliers: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mode = if let Some(factor) = args.below {
        OutlierMode::Below(if factor > 0.0 { factor } else { DEFAULT_BELOW })
    } else {
        let factor = args.above.unwrap_or(DEFAULT_ABOVE);
        OutlierMode::Above(if factor > 0.0 { factor } else { DEFAULT_ABOVE })
    };

    let mut failed = false;
    for path in &args.paths {
        let exclude = ExcludeSet::new(&args.exclude).context("bad exclude pattern")?;
        let visitor = Arc::new(OutlierVisitor::new(mode, exclude, path.clone()));

        let walk = WalkOptions {
            threads: args.jobs,
            sort: true,
            ..WalkOptions::default()
        };
        if let Err(err) = Walker::new(walk).run(path, Arc::clone(&visitor)) {
            eprintln!("pwoutliers: {}: {:#}", path.display(), anyhow::Error::from(err));
            failed = true;
        }
        for outlier in visitor.take_report() {
            match mode {
                OutlierMode::Above(_) => {
                    println!("{:>12} {}", outlier.size, outlier.path.display())
                }
                OutlierMode::Below(_) => {
                    println!("{:>6} {}", outlier.size, outlier.path.display())
                }
            }
        }
        if visitor.had_errors() {
            failed = true;
        }
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
