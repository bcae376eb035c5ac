//! Multi-threaded path traversal
//!
//! The engine walks a directory tree with a pool of workers, invoking a
//! [`Visitor`] in two phases per directory and once per file:
//!
//! ```text
//!                 ┌────────────────────────────────┐
//!                 │          Walker::run           │
//!                 │  lstat root, seed DIR_ENTER,   │
//!                 │  block on the completion gate  │
//!                 └───────────────┬────────────────┘
//!                                 │
//!                     ┌───────────▼───────────┐
//!                     │  priority task queue  │
//!                     │  DIR_EXIT > FILE >    │
//!                     │  DIR_ENTER            │
//!                     └───┬───────┬───────┬───┘
//!                         │       │       │
//!                   ┌─────▼──┐ ┌──▼─────┐ ┌──▼─────┐
//!                   │Worker 1│ │Worker 2│ │Worker N│
//!                   └────────┘ └────────┘ └────────┘
//! ```
//!
//! `DIR_ENTER` reads a directory, stats each child, and schedules a task
//! per child (non-directories are visited inline unless `file_tasks` is
//! set). The last child to finish schedules the parent's `DIR_EXIT`,
//! which hands every child's result to the visitor in one batch. Draining
//! open directories before opening new ones keeps the working set
//! proportional to tree depth times parallelism rather than tree width.
//!
//! Ordering guarantees, and nothing more: `enter_dir(d)` happens before
//! every callback in `d`'s subtree, all of which happen before
//! `exit_dir(d)`; siblings interleave freely across workers.

mod engine;
mod task;
mod visitor;

pub use engine::Walker;
pub use visitor::{DirEntry, Visitor};
