//! Recursive-delete visitor (`pwrm`)
//!
//! Files are unlinked as they are visited (each in its own pool task so
//! deletes overlap); a directory is `rmdir`ed in `exit_dir` only when
//! every surviving entry reported success. An excluded or undeletable
//! entry therefore keeps its whole ancestor chain in place.

use crate::exclude::ExcludeSet;
use crate::ops::{match_path, report_io_error};
use crate::walker::{DirEntry, Visitor};
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Visitor removing one tree
pub struct RmVisitor {
    exclude: ExcludeSet,
    root: PathBuf,
    verbose: bool,
    errors: AtomicBool,
}

impl RmVisitor {
    pub fn new(exclude: ExcludeSet, root: PathBuf, verbose: bool) -> Self {
        Self {
            exclude,
            root,
            verbose,
            errors: AtomicBool::new(false),
        }
    }

    pub fn had_errors(&self) -> bool {
        self.errors.load(Ordering::Relaxed)
    }

    fn report(&self, path: &Path, err: &io::Error) {
        self.errors.store(true, Ordering::Relaxed);
        report_io_error(path, err);
    }
}

impl Visitor for RmVisitor {
    /// Presence marks "removed"; an absent result keeps the parent.
    type Data = ();
    type Token = ();

    fn enter_dir(&self, path: &Path, _meta: &Metadata, _parent: Option<&()>) -> Option<()> {
        let rel = match_path(&self.root, path, true);
        if self.exclude.matches(rel, true) {
            return None;
        }
        Some(())
    }

    fn exit_dir(
        &self,
        path: &Path,
        _meta: &Metadata,
        _token: (),
        entries: Vec<DirEntry<()>>,
    ) -> Option<()> {
        if entries.iter().any(|e| e.data.is_none()) {
            // Something below survived; the directory must stay.
            return None;
        }
        if let Err(err) = fs::remove_dir(path) {
            self.report(path, &err);
            return None;
        }
        if self.verbose {
            println!("removed directory '{}'", path.display());
        }
        Some(())
    }

    fn visit_file(&self, path: &Path, _meta: &Metadata, _parent: Option<&()>) -> Option<()> {
        let rel = match_path(&self.root, path, false);
        if self.exclude.matches(rel, false) {
            return None;
        }
        if let Err(err) = fs::remove_file(path) {
            self.report(path, &err);
            return None;
        }
        if self.verbose {
            println!("removed '{}'", path.display());
        }
        Some(())
    }

    fn on_error(
        &self,
        path: &Path,
        _meta: Option<&Metadata>,
        _token: Option<()>,
        err: io::Error,
    ) -> Option<()> {
        self.report(path, &err);
        None
    }
}
