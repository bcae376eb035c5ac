//! pwdu - parallel disk usage
//!
//! du for parallel filesystems: directory sizes are aggregated by a
//! multi-threaded walk so metadata requests overlap instead of
//! serialising on one readdir/stat loop.

use anyhow::{Context, Result};
use clap::Parser;
use parwalk::config::{default_jobs, init_logging};
use parwalk::ops::du::{DuOptions, DuVisitor};
use parwalk::units::{display_size, SizeFormat};
use parwalk::{ExcludeSet, WalkOptions, Walker};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Parallel disk usage summary
#[derive(Parser, Debug)]
#[command(
    name = "pwdu",
    version,
    about = "Summarize disk usage in parallel",
    disable_help_flag = true,
    after_help = "EXAMPLES:\n    \
        pwdu -j 32 /mnt/scratch\n    \
        pwdu -sh /mnt/scratch/*\n    \
        pwdu -A -e '*.core' -c /data"
)]
struct Args {
    /// Paths to measure (default: current directory)
    #[arg(value_name = "PATH")]
    paths: Vec<PathBuf>,

    /// Measure N directories at a time
    #[arg(short, long, default_value_t = default_jobs(), value_name = "N")]
    jobs: usize,

    /// Exclude entries matching PATTERN (repeatable)
    #[arg(short, long, value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Report apparent sizes rather than disk usage
    #[arg(short = 'A', long)]
    apparent_size: bool,

    /// Print sizes in bytes
    #[arg(short, long, conflicts_with_all = ["mebibytes", "human_readable"])]
    bytes: bool,

    /// Print sizes in KiB (default)
    #[arg(short, long)]
    kibibytes: bool,

    /// Print sizes in MiB
    #[arg(short, long, conflicts_with = "human_readable")]
    mebibytes: bool,

    /// Print sizes in human readable form
    #[arg(short, long)]
    human_readable: bool,

    /// Print a line for every file, not just directories
    #[arg(short, long, conflicts_with = "summarize")]
    all: bool,

    /// Display only a total for each argument
    #[arg(short, long)]
    summarize: bool,

    /// Produce a grand total
    #[arg(short = 'c', long)]
    total: bool,

    /// Terminate lines with NUL instead of newline
    #[arg(short = '0', long)]
    null: bool,

    /// Do not cross filesystem boundaries
    #[arg(short = 'x', long)]
    one_file_system: bool,

    /// Log more (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    help: Option<bool>,
}

impl Args {
    fn format(&self) -> SizeFormat {
        if self.human_readable {
            SizeFormat::Human
        } else if self.bytes {
            SizeFormat::Bytes
        } else if self.mebibytes {
            SizeFormat::Blocks(1 << 20)
        } else {
            SizeFormat::Blocks(1 << 10)
        }
    }

    fn terminator(&self) -> u8 {
        if self.null {
            b'\0'
        } else {
            b'\n'
        }
    }
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("pwdu: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    let format = args.format();
    let terminator = args.terminator();
    let paths = if args.paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        args.paths.clone()
    };

    let mut failed = false;
    let mut grand_total: u64 = 0;

    for path in &paths {
        let meta = fs::symlink_metadata(path)
            .with_context(|| format!("cannot stat '{}'", path.display()))?;

        let exclude = ExcludeSet::new(&args.exclude).context("bad exclude pattern")?;
        let options = DuOptions {
            apparent_size: args.apparent_size,
            summarize: args.summarize,
            all_files: args.all,
            format,
            terminator,
            one_file_system: args.one_file_system,
            exclude,
        };
        let visitor = Arc::new(DuVisitor::new(options, path.clone(), meta.dev()));

        let walk = WalkOptions {
            threads: args.jobs,
            sort: true,
            ..WalkOptions::default()
        };
        match Walker::new(walk).run(path, Arc::clone(&visitor)) {
            Ok(Some(size)) => {
                if args.summarize || !meta.is_dir() {
                    visitor.print(size, path);
                }
                grand_total += size;
            }
            Ok(None) => {}
            Err(err) => {
                eprintln!("pwdu: {}: {:#}", path.display(), anyhow::Error::from(err));
                failed = true;
            }
        }
        if visitor.had_errors() {
            failed = true;
        }
    }

    if args.total {
        print!(
            "{}\ttotal{}",
            display_size(grand_total, format),
            terminator as char
        );
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
