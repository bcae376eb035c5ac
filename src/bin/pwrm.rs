//! pwrm - parallel recursive delete
//!
//! rm -r for parallel filesystems: unlinks run as their own pool tasks
//! so many deletes are in flight at once, and a directory is removed the
//! moment its last child is gone.

use anyhow::{Context, Result};
use clap::Parser;
use parwalk::config::{default_jobs, init_logging};
use parwalk::ops::rm::RmVisitor;
use parwalk::{ExcludeSet, WalkOptions, Walker};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Parallel recursive delete
#[derive(Parser, Debug)]
#[command(
    name = "pwrm",
    version,
    about = "Remove trees in parallel",
    after_help = "EXAMPLES:\n    \
        pwrm -j 32 /mnt/scratch/old-run\n    \
        pwrm -e '*.keep' /mnt/scratch/tmp"
)]
struct Args {
    /// Trees to remove
    #[arg(value_name = "PATH", required = true)]
    paths: Vec<PathBuf>,

    /// Remove N files at a time
    #[arg(short, long, default_value_t = default_jobs(), value_name = "N")]
    jobs: usize,

    /// Keep entries matching PATTERN (repeatable)
    #[arg(short, long, value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Print every removal
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("pwrm: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut failed = false;
    for path in &args.paths {
        let exclude = ExcludeSet::new(&args.exclude).context("bad exclude pattern")?;
        let visitor = Arc::new(RmVisitor::new(exclude, path.clone(), args.verbose > 0));

        let walk = WalkOptions {
            threads: args.jobs,
            sort: true,
            file_tasks: true,
            ..WalkOptions::default()
        };
        if let Err(err) = Walker::new(walk).run(path, Arc::clone(&visitor)) {
            eprintln!("pwrm: {}: {:#}", path.display(), anyhow::Error::from(err));
            failed = true;
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
