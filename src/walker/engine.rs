//! Traversal engine entry point
//!
//! [`Walker`] owns the walk configuration and drives one traversal per
//! [`run`] call: stat the root, bring up a priority worker pool, seed it
//! with the root directory task, and block until the root's exit callback
//! (or the root file visit) has completed.
//!
//! [`run`]: Walker::run

use crate::config::WalkOptions;
use crate::error::{Result, WalkError};
use crate::pool::{PoolBuilder, ThreadPool};
use crate::walker::task::{self, DirTask, Task};
use crate::walker::visitor::Visitor;
use parking_lot::{Condvar, Mutex};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Per-traversal context shared by every task
pub(crate) struct Shared<V: Visitor> {
    pub visitor: Arc<V>,
    pub file_tasks: bool,
    pub sort: bool,
    pub pool: ThreadPool<Task<V>>,
    done: Mutex<Option<Option<V::Data>>>,
    done_cv: Condvar,
}

impl<V: Visitor> Shared<V> {
    /// Publish the root result and wake the caller.
    pub fn finish_root(&self, data: Option<V::Data>) {
        *self.done.lock() = Some(data);
        self.done_cv.notify_one();
    }

    fn wait_done(&self) -> Option<V::Data> {
        let mut done = self.done.lock();
        loop {
            if let Some(data) = done.take() {
                return data;
            }
            self.done_cv.wait(&mut done);
        }
    }
}

/// Multi-threaded path traversal
///
/// ```no_run
/// use parwalk::{WalkOptions, Walker};
/// # use parwalk::{DirEntry, Visitor};
/// # use std::{fs::Metadata, path::Path, sync::Arc};
/// struct Count;
/// impl Visitor for Count {
///     type Data = u64;
///     type Token = ();
///     fn enter_dir(&self, _: &Path, _: &Metadata, _: Option<&()>) -> Option<()> {
///         Some(())
///     }
///     fn visit_file(&self, _: &Path, _: &Metadata, _: Option<&()>) -> Option<u64> {
///         Some(1)
///     }
///     fn exit_dir(
///         &self,
///         _: &Path,
///         _: &Metadata,
///         _: (),
///         entries: Vec<DirEntry<u64>>,
///     ) -> Option<u64> {
///         Some(entries.iter().filter_map(|e| e.data).sum())
///     }
/// }
///
/// let walker = Walker::new(WalkOptions::default());
/// let files = walker.run("/some/tree", Arc::new(Count))?.unwrap_or(0);
/// # Ok::<(), parwalk::WalkError>(())
/// ```
pub struct Walker {
    options: WalkOptions,
}

impl Walker {
    pub fn new(options: WalkOptions) -> Self {
        Self { options }
    }

    /// Walk `root`, blocking until the traversal completes. Returns the
    /// data produced for the root node (by its `exit_dir`, its
    /// `visit_file` when the root is not a directory, or `on_error`).
    ///
    /// Fails only when the root cannot be stat'd or the pool cannot be
    /// brought up; everything after that reaches the visitor instead.
    pub fn run<V: Visitor>(&self, root: impl AsRef<Path>, visitor: Arc<V>) -> Result<Option<V::Data>> {
        let root = root.as_ref();
        let meta = fs::symlink_metadata(root).map_err(|source| WalkError::Root {
            path: root.to_path_buf(),
            source,
        })?;

        // A non-directory root is visited on the calling thread; no pool.
        if !meta.is_dir() {
            return Ok(visitor.visit_file(root, &meta, None));
        }

        debug!(
            root = %root.display(),
            threads = self.options.threads,
            file_tasks = self.options.file_tasks,
            sort = self.options.sort,
            "starting traversal"
        );

        let sort = self.options.sort;
        let mut builder = PoolBuilder::new()
            .threads(self.options.threads)
            .queue_limit(self.options.queue_limit)
            .name("walker")
            .priority(move |a: &Task<V>, b: &Task<V>| task::compare(sort, a, b));
        if let Some(bytes) = self.options.stack_size {
            builder = builder.stack_size(bytes);
        }
        let pool = builder.build(|task: Task<V>| task.run())?;

        let shared = Arc::new(Shared {
            visitor,
            file_tasks: self.options.file_tasks,
            sort,
            pool,
            done: Mutex::new(None),
            done_cv: Condvar::new(),
        });

        let root_task = DirTask::new(Arc::clone(&shared), root.to_path_buf(), meta, None);
        if shared.pool.submit(Task::EnterDir(root_task)).is_err() {
            shared.pool.shutdown();
            return Err(WalkError::RootSubmit);
        }

        let data = shared.wait_done();
        shared.pool.shutdown();
        debug!(root = %root.display(), "traversal complete");
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::task::{compare, DirTask};
    use std::cmp::Ordering;
    use std::fs::Metadata;
    use std::path::PathBuf;

    struct Noop;

    impl Visitor for Noop {
        type Data = ();
        type Token = ();

        fn enter_dir(&self, _: &Path, _: &Metadata, _: Option<&()>) -> Option<()> {
            Some(())
        }
    }

    fn shared() -> Arc<Shared<Noop>> {
        let pool = PoolBuilder::new()
            .threads(1)
            .build(|task: Task<Noop>| task.run())
            .expect("pool builds");
        Arc::new(Shared {
            visitor: Arc::new(Noop),
            file_tasks: false,
            sort: true,
            pool,
            done: Mutex::new(None),
            done_cv: Condvar::new(),
        })
    }

    fn enter(shared: &Arc<Shared<Noop>>, path: &str, meta: &Metadata) -> Task<Noop> {
        Task::EnterDir(DirTask::new(
            Arc::clone(shared),
            PathBuf::from(path),
            meta.clone(),
            None,
        ))
    }

    #[test]
    fn test_priority_finishes_open_dirs_and_later_paths_first() {
        let shared = shared();
        let meta = std::fs::metadata(".").expect("stat");

        let early = enter(&shared, "/t/a", &meta);
        let late = enter(&shared, "/t/z", &meta);
        let exit =
            Task::ExitDir(DirTask::new(Arc::clone(&shared), PathBuf::from("/t/a"), meta, None));

        // Greater means dequeued first: exits beat enters, and with
        // sorted walks the later path drains first.
        assert_eq!(compare(true, &exit, &late), Ordering::Greater);
        assert_eq!(compare(true, &late, &early), Ordering::Greater);
        assert_eq!(compare(true, &early, &late), Ordering::Less);
        assert_eq!(compare(false, &early, &late), Ordering::Equal);

        shared.pool.shutdown();
    }
}
