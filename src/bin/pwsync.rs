//! pwsync - parallel one-way tree synchronisation
//!
//! Mirrors SOURCE onto DEST with many file copies in flight at once.
//! Unchanged files (same size and mtime) are skipped, extraneous
//! destination entries are deleted unless told otherwise, and rsync-like
//! flags opt into preserving permissions, ownership, times, and
//! hardlinks.

use anyhow::{Context, Result};
use clap::Parser;
use parwalk::config::{default_jobs, init_logging};
use parwalk::ops::sync::{SyncOptions, SyncVisitor};
use parwalk::{ExcludeSet, WalkOptions, Walker};
use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

/// Parallel one-way tree synchronisation
#[derive(Parser, Debug)]
#[command(
    name = "pwsync",
    version,
    about = "Synchronise a tree onto a destination in parallel",
    after_help = "EXAMPLES:\n    \
        pwsync -a /mnt/src/data /mnt/dst/data\n    \
        pwsync -j 32 -aH --exclude '.snapshot/' /tank/home /backup/home\n    \
        pwsync -t -w 1 /src /dst    # FAT-ish mtime granularity"
)]
struct Args {
    /// Source tree
    #[arg(value_name = "SOURCE")]
    source: PathBuf,

    /// Destination tree
    #[arg(value_name = "DEST")]
    dest: PathBuf,

    /// Copy N files at a time
    #[arg(short, long, default_value_t = default_jobs(), value_name = "N")]
    jobs: usize,

    /// Archive mode; same as -pot
    #[arg(short, long)]
    archive: bool,

    /// Preserve permissions
    #[arg(short, long)]
    perms: bool,

    /// Preserve ownership (uid only when running as root)
    #[arg(short, long)]
    owner: bool,

    /// Preserve modification times
    #[arg(short, long)]
    times: bool,

    /// Preserve hard links
    #[arg(short = 'H', long)]
    hard_links: bool,

    /// Do not delete extraneous files from the destination
    #[arg(short = 'D', long)]
    no_delete: bool,

    /// Never copy entries matching PATTERN (repeatable)
    #[arg(short, long, value_name = "PATTERN")]
    exclude: Vec<String>,

    /// Like --exclude, and also delete matches from the destination
    #[arg(short = 'E', long, value_name = "PATTERN")]
    exclude_delete: Vec<String>,

    /// Compare mtimes with sub-second precision
    #[arg(short, long)]
    subsecond: bool,

    /// Treat mtimes within SECS seconds as equal
    #[arg(
        short = 'w',
        long,
        value_name = "SECS",
        default_value_t = 0,
        value_parser = clap::value_parser!(i64).range(0..)
    )]
    modify_window: i64,

    /// Do not cross filesystem boundaries
    #[arg(short = 'x', long)]
    one_file_system: bool,

    /// Print changed paths; twice for directory markers
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("pwsync: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.verbose);

    let src_meta = fs::symlink_metadata(&args.source)
        .with_context(|| format!("cannot stat '{}'", args.source.display()))?;

    let options = SyncOptions {
        preserve_mode: args.archive || args.perms,
        preserve_ownership: args.archive || args.owner,
        preserve_mtime: args.archive || args.times,
        preserve_hardlinks: args.hard_links,
        delete: !args.no_delete,
        modify_window: args.modify_window,
        subsecond: args.subsecond,
        one_file_system: args.one_file_system,
        verbose: args.verbose,
        exclude: ExcludeSet::new(&args.exclude).context("bad exclude pattern")?,
        exclude_delete: ExcludeSet::new(&args.exclude_delete)
            .context("bad exclude-delete pattern")?,
    };
    let visitor = Arc::new(SyncVisitor::new(
        options,
        args.source.clone(),
        args.dest.clone(),
        src_meta.dev(),
    ));

    let walk = WalkOptions {
        threads: args.jobs,
        sort: true,
        file_tasks: true,
        ..WalkOptions::default()
    };
    let mut failed = false;
    if let Err(err) = Walker::new(walk).run(&args.source, Arc::clone(&visitor)) {
        eprintln!(
            "pwsync: {}: {:#}",
            args.source.display(),
            anyhow::Error::from(err)
        );
        failed = true;
    }
    if visitor.had_errors() {
        failed = true;
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
