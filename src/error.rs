//! Error types for parwalk
//!
//! The library splits errors by layer:
//! - `PoolError` — worker pool construction failures
//! - `SubmitError` — task submission failures, returning the task
//! - `WalkError` — traversal setup failures returned from [`Walker::run`]
//!
//! Everything that happens *during* a traversal (unreadable directories,
//! vanished files, permission problems) is routed to the visitor's
//! `on_error` callback instead, so a failing subtree degrades locally
//! rather than aborting the walk.
//!
//! [`Walker::run`]: crate::walker::Walker::run

use std::fmt;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building a worker pool
#[derive(Error, Debug)]
pub enum PoolError {
    /// The pool was configured with zero worker threads
    #[error("worker pool requires at least one thread")]
    NoWorkers,

    /// The OS refused to spawn a worker thread
    #[error("failed to spawn worker thread")]
    Spawn(#[from] io::Error),
}

/// Errors raised when submitting a task to a pool
///
/// Every variant hands the rejected task back to the caller so it can be
/// retried, executed inline, or dropped. Implemented by hand (rather than
/// via thiserror) so the generic payload carries no `Debug`/`Display`
/// bounds — the same shape as `std::sync::mpsc::SendError`.
pub enum SubmitError<T> {
    /// The queue is at its configured ceiling (bounded pools only)
    Full(T),

    /// The pool is shutting down and accepts no new work
    Stopped(T),

    /// The unbounded queue cannot grow any further
    Exhausted(T),
}

impl<T> SubmitError<T> {
    /// Recover the task that could not be queued.
    pub fn into_task(self) -> T {
        match self {
            SubmitError::Full(task) => task,
            SubmitError::Stopped(task) => task,
            SubmitError::Exhausted(task) => task,
        }
    }

    fn reason(&self) -> &'static str {
        match self {
            SubmitError::Full(_) => "task queue is full",
            SubmitError::Stopped(_) => "pool is shutting down",
            SubmitError::Exhausted(_) => "task queue cannot grow further",
        }
    }
}

impl<T> fmt::Debug for SubmitError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmitError::Full(_) => "Full",
            SubmitError::Stopped(_) => "Stopped",
            SubmitError::Exhausted(_) => "Exhausted",
        };
        f.debug_tuple(name).finish()
    }
}

impl<T> fmt::Display for SubmitError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

impl<T> std::error::Error for SubmitError<T> {}

/// Errors returned from [`Walker::run`]
///
/// These cover only traversal *setup*: once the root task is queued, all
/// further errors flow through the visitor.
///
/// [`Walker::run`]: crate::walker::Walker::run
#[derive(Error, Debug)]
pub enum WalkError {
    /// The root path could not be stat'd
    #[error("cannot stat '{}'", path.display())]
    Root {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The worker pool could not be brought up
    #[error("worker pool setup failed")]
    Pool(#[from] PoolError),

    /// The root task could not be scheduled
    #[error("failed to schedule the root task")]
    RootSubmit,
}

/// Result type alias for traversal entry points
pub type Result<T> = std::result::Result<T, WalkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_error_returns_task() {
        let err: SubmitError<String> = SubmitError::Full("task".to_string());
        assert_eq!(err.into_task(), "task");
    }

    #[test]
    fn test_submit_error_display() {
        let err: SubmitError<u32> = SubmitError::Stopped(7);
        assert_eq!(err.to_string(), "pool is shutting down");
        let err: SubmitError<u32> = SubmitError::Full(7);
        assert_eq!(format!("{:?}", err), "Full");
    }

    #[test]
    fn test_walk_error_preserves_os_error() {
        let source = io::Error::from_raw_os_error(libc::EACCES);
        let err = WalkError::Root {
            path: PathBuf::from("/root/secret"),
            source,
        };
        let source = std::error::Error::source(&err).expect("source present");
        let io_err = source.downcast_ref::<io::Error>().expect("io error");
        assert_eq!(io_err.raw_os_error(), Some(libc::EACCES));
    }
}
