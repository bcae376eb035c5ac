//! Visitor interface for the traversal engine
//!
//! A [`Visitor`] receives the traversal callbacks and owns every value
//! flowing through them. The engine stores and forwards two opaque types
//! without ever interpreting them:
//!
//! - `Data` — the per-node result. A child's `Data` surfaces exactly once:
//!   in its parent's [`exit_dir`] entries, or as the value returned from
//!   the walk when the node is the root.
//! - `Token` — the per-directory continuation created by [`enter_dir`].
//!   Children may borrow it while the directory is open; [`exit_dir`]
//!   consumes it.
//!
//! All callbacks run concurrently on worker threads against `&self`;
//! implementations guard their own mutable state (atomics, mutexes).
//!
//! [`enter_dir`]: Visitor::enter_dir
//! [`exit_dir`]: Visitor::exit_dir

use std::ffi::OsString;
use std::fs::Metadata;
use std::io;
use std::path::Path;

/// One child record handed to [`Visitor::exit_dir`]
///
/// `data` is `None` when the child was skipped, was removed mid-walk, or
/// produced no result.
#[derive(Debug)]
pub struct DirEntry<D> {
    /// Name of the child within its directory
    pub name: OsString,

    /// Result produced by the child's visit
    pub data: Option<D>,
}

/// Traversal callbacks
///
/// Every method has a default except [`enter_dir`], mirroring the engine's
/// contract that a visitor must at least decide whether to descend.
///
/// [`enter_dir`]: Visitor::enter_dir
pub trait Visitor: Send + Sync + 'static {
    /// Per-node result forwarded into the parent's entry slot.
    type Data: Send + 'static;

    /// Per-directory continuation carried from `enter_dir` to `exit_dir`.
    type Token: Send + Sync + 'static;

    /// Called before a directory is read. Return `None` to skip the
    /// directory entirely: no children are visited, no `exit_dir` fires,
    /// and its entry's data stays `None`. `parent` is the enclosing
    /// directory's token (`None` at the root).
    fn enter_dir(
        &self,
        path: &Path,
        meta: &Metadata,
        parent: Option<&Self::Token>,
    ) -> Option<Self::Token>;

    /// Called after every child of the directory has finished. `entries`
    /// holds one record per surviving child, in name order when the walk
    /// was configured to sort. The return value becomes this directory's
    /// own entry data.
    fn exit_dir(
        &self,
        path: &Path,
        meta: &Metadata,
        token: Self::Token,
        entries: Vec<DirEntry<Self::Data>>,
    ) -> Option<Self::Data> {
        let _ = (path, meta, token, entries);
        None
    }

    /// Called for every non-directory, and for the root itself when the
    /// root is not a directory (in that case on the calling thread).
    fn visit_file(
        &self,
        path: &Path,
        meta: &Metadata,
        parent: Option<&Self::Token>,
    ) -> Option<Self::Data> {
        let _ = (path, meta, parent);
        None
    }

    /// Called when a directory cannot be opened or read, or a child
    /// cannot be stat'd. `meta` and `token` are present when the failing
    /// node is a directory that already passed `enter_dir`. The return
    /// value replaces the node's normal result.
    fn on_error(
        &self,
        path: &Path,
        meta: Option<&Metadata>,
        token: Option<Self::Token>,
        err: io::Error,
    ) -> Option<Self::Data> {
        let _ = (path, meta, token, err);
        None
    }
}
