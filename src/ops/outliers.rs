//! Size-outlier visitor (`pwoutliers`)
//!
//! Flags children whose size is far from their directory's mean. Every
//! regular file contributes its size; each directory compares its
//! children against `factor × mean` (or `mean / factor` in `--below`
//! mode). A subtree reported at some level is subtracted from the size
//! still "unreported" upward, so an outlier is flagged once, at the
//! deepest directory where it stands out.

use crate::exclude::ExcludeSet;
use crate::ops::{match_path, report_io_error};
use crate::walker::{DirEntry, Visitor};
use parking_lot::Mutex;
use std::fs::Metadata;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

/// Direction and factor of the outlier test
#[derive(Debug, Clone, Copy)]
pub enum OutlierMode {
    /// Children at least `factor` times the directory mean
    Above(f64),

    /// Children at most `1/factor` of the directory mean
    Below(f64),
}

/// Size bookkeeping passed up the tree
#[derive(Debug, Clone, Copy)]
pub struct SizeStats {
    /// Total size of the subtree
    pub total: u64,

    /// Portion not yet flagged at a deeper level
    pub unreported: u64,
}

/// One flagged child
#[derive(Debug)]
pub struct Outlier {
    pub path: PathBuf,
    pub size: u64,
}

/// Visitor collecting outliers for one walk root
pub struct OutlierVisitor {
    mode: OutlierMode,
    exclude: ExcludeSet,
    root: PathBuf,
    found: Mutex<Vec<Outlier>>,
    errors: AtomicBool,
}

impl OutlierVisitor {
    pub fn new(mode: OutlierMode, exclude: ExcludeSet, root: PathBuf) -> Self {
        Self {
            mode,
            exclude,
            root,
            found: Mutex::new(Vec::new()),
            errors: AtomicBool::new(false),
        }
    }

    pub fn had_errors(&self) -> bool {
        self.errors.load(Ordering::Relaxed)
    }

    /// Drain the outliers found so far (discovery order).
    pub fn take_report(&self) -> Vec<Outlier> {
        std::mem::take(&mut self.found.lock())
    }
}

impl Visitor for OutlierVisitor {
    type Data = SizeStats;
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
        entries: Vec<DirEntry<SizeStats>>,
    ) -> Option<SizeStats> {
        let mut total: u64 = 0;
        let mut unreported: u64 = 0;
        let mut count: u64 = 0;
        for entry in &entries {
            if let Some(stats) = entry.data {
                total += stats.total;
                unreported += stats.unreported;
                count += 1;
            }
        }

        if total > 0 {
            let mut found = self.found.lock();
            match self.mode {
                OutlierMode::Below(factor) => {
                    let cutoff = total as f64 / (factor * count as f64);
                    for entry in &entries {
                        if let Some(stats) = entry.data {
                            if stats.total as f64 <= cutoff {
                                found.push(Outlier {
                                    path: path.join(&entry.name),
                                    size: stats.total,
                                });
                            }
                        }
                    }
                }
                OutlierMode::Above(factor) => {
                    let cutoff = factor * total as f64 / count as f64;
                    for entry in &entries {
                        if let Some(stats) = entry.data {
                            if stats.unreported as f64 >= cutoff {
                                unreported -= stats.unreported;
                                found.push(Outlier {
                                    path: path.join(&entry.name),
                                    size: stats.total,
                                });
                            }
                        }
                    }
                }
            }
        }

        Some(SizeStats { total, unreported })
    }

    fn visit_file(&self, path: &Path, meta: &Metadata, _parent: Option<&()>) -> Option<SizeStats> {
        // Only regular files count toward directory means.
        if !meta.is_file() {
            return None;
        }
        let rel = match_path(&self.root, path, false);
        if self.exclude.matches(rel, false) {
            return None;
        }
        Some(SizeStats {
            total: meta.len(),
            unreported: meta.len(),
        })
    }

    fn on_error(
        &self,
        path: &Path,
        _meta: Option<&Metadata>,
        _token: Option<()>,
        err: io::Error,
    ) -> Option<SizeStats> {
        self.errors.store(true, Ordering::Relaxed);
        report_io_error(path, &err);
        None
    }
}
