//! Disk-usage visitor (`pwdu`)
//!
//! Folds sizes bottom-up: every file reports its size, every directory
//! sums its own size with its children's and passes the total upward.
//! Printing happens as directories close, so output streams while the
//! walk is still running; per-argument and grand totals are the caller's
//! job (it gets the root total back from the walk).

use crate::exclude::ExcludeSet;
use crate::ops::{match_path, report_io_error};
use crate::units::{display_size, SizeFormat};
use crate::walker::{DirEntry, Visitor};
use std::fs::Metadata;
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Options shared by the visitor and the CLI
pub struct DuOptions {
    /// Count `st_size` instead of allocated blocks
    pub apparent_size: bool,

    /// Suppress per-directory lines; the caller prints totals only
    pub summarize: bool,

    /// Also print a line for every file
    pub all_files: bool,

    /// How sizes are rendered
    pub format: SizeFormat,

    /// Line terminator (`\n`, or `\0` for `-0`)
    pub terminator: u8,

    /// Skip directories on other filesystems
    pub one_file_system: bool,

    pub exclude: ExcludeSet,
}

impl Default for DuOptions {
    fn default() -> Self {
        Self {
            apparent_size: false,
            summarize: false,
            all_files: false,
            format: SizeFormat::Blocks(1024),
            terminator: b'\n',
            one_file_system: false,
            exclude: ExcludeSet::default(),
        }
    }
}

/// Visitor accumulating disk usage for one walk root
pub struct DuVisitor {
    options: DuOptions,
    root: PathBuf,
    root_dev: u64,
    errors: AtomicBool,
}

impl DuVisitor {
    pub fn new(options: DuOptions, root: PathBuf, root_dev: u64) -> Self {
        Self {
            options,
            root,
            root_dev,
            errors: AtomicBool::new(false),
        }
    }

    pub fn had_errors(&self) -> bool {
        self.errors.load(Ordering::Relaxed)
    }

    fn node_size(&self, meta: &Metadata) -> u64 {
        if self.options.apparent_size {
            meta.len()
        } else {
            // st_blocks counts 512-byte units regardless of fs block size
            meta.blocks() * 512
        }
    }

    /// One output line; size column, tab, path, terminator.
    pub fn print(&self, size: u64, path: &Path) {
        print!(
            "{}\t{}{}",
            display_size(size, self.options.format),
            path.display(),
            self.options.terminator as char
        );
    }
}

impl Visitor for DuVisitor {
    type Data = u64;
    type Token = ();

    fn enter_dir(&self, path: &Path, meta: &Metadata, _parent: Option<&()>) -> Option<()> {
        if self.options.one_file_system && meta.dev() != self.root_dev {
            return None;
        }
        let rel = match_path(&self.root, path, true);
        if self.options.exclude.matches(rel, true) {
            return None;
        }
        Some(())
    }

    fn exit_dir(
        &self,
        path: &Path,
        meta: &Metadata,
        _token: (),
        entries: Vec<DirEntry<u64>>,
    ) -> Option<u64> {
        let size = self.node_size(meta) + entries.iter().filter_map(|e| e.data).sum::<u64>();
        if !self.options.summarize {
            self.print(size, path);
        }
        Some(size)
    }

    fn visit_file(&self, path: &Path, meta: &Metadata, _parent: Option<&()>) -> Option<u64> {
        let rel = match_path(&self.root, path, false);
        if self.options.exclude.matches(rel, false) {
            return None;
        }
        let size = self.node_size(meta);
        if self.options.all_files {
            self.print(size, path);
        }
        Some(size)
    }

    fn on_error(
        &self,
        path: &Path,
        _meta: Option<&Metadata>,
        _token: Option<()>,
        err: io::Error,
    ) -> Option<u64> {
        self.errors.store(true, Ordering::Relaxed);
        report_io_error(path, &err);
        None
    }
}
