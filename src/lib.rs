//! parwalk - Parallel File-Tree Utilities
//!
//! A suite of UNIX file-tree tools built around one idea: on a parallel
//! filesystem (distributed FS, striped RAID), a sequential
//! `readdir`/`stat` pipeline leaves the storage idle — the client is the
//! bottleneck. parwalk walks the tree with a pool of worker threads so
//! many directories are in flight at once.
//!
//! # Components
//!
//! - [`pool`] — worker pool with a FIFO or priority-heap task queue,
//!   bounded or unbounded.
//! - [`walker`] — the traversal engine: per-directory enter/exit
//!   callbacks with strict subtree ordering, per-file callbacks, and
//!   child results aggregated upward through a [`Visitor`].
//! - [`ops`] — the visitors behind the shipped tools: `pwdu` (disk
//!   usage), `pwrm` (recursive delete), `pwsync` (one-way sync),
//!   `pwoutliers` (per-directory size outliers).
//! - [`exclude`] — the glob exclude filter the tools share.
//!
//! # Example
//!
//! Summing file sizes across a tree with 16 threads:
//!
//! ```no_run
//! use parwalk::{DirEntry, Visitor, WalkOptions, Walker};
//! use std::{fs::Metadata, path::Path, sync::Arc};
//!
//! struct TotalSize;
//!
//! impl Visitor for TotalSize {
//!     type Data = u64;
//!     type Token = ();
//!
//!     fn enter_dir(&self, _: &Path, _: &Metadata, _: Option<&()>) -> Option<()> {
//!         Some(())
//!     }
//!     fn visit_file(&self, _: &Path, meta: &Metadata, _: Option<&()>) -> Option<u64> {
//!         Some(meta.len())
//!     }
//!     fn exit_dir(
//!         &self,
//!         _: &Path,
//!         _: &Metadata,
//!         _: (),
//!         entries: Vec<DirEntry<u64>>,
//!     ) -> Option<u64> {
//!         Some(entries.iter().filter_map(|e| e.data).sum())
//!     }
//! }
//!
//! let options = WalkOptions {
//!     threads: 16,
//!     ..WalkOptions::default()
//! };
//! let total = Walker::new(options).run("/mnt/scratch", Arc::new(TotalSize))?;
//! println!("{} bytes", total.unwrap_or(0));
//! # Ok::<(), parwalk::WalkError>(())
//! ```
//!
//! Symbolic links are never followed (`lstat` only), so symlink cycles
//! cannot occur. The walk is local-machine only.

pub mod config;
pub mod error;
pub mod exclude;
pub mod ops;
pub mod pool;
pub mod units;
pub mod walker;

pub use config::WalkOptions;
pub use error::{PoolError, SubmitError, WalkError};
pub use exclude::ExcludeSet;
pub use pool::{PoolBuilder, ThreadPool};
pub use walker::{DirEntry, Visitor, Walker};
