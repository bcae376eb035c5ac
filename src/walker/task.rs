//! Task types and handlers for the traversal state machine
//!
//! Every node of the walk is a task in one of three phases:
//!
//! - `DirEnter` — run the `enter_dir` callback, read the directory,
//!   stat and schedule its children.
//! - `File` — visit one non-directory (only scheduled when the walk runs
//!   with `file_tasks`; otherwise files are visited inline by the parent).
//! - `DirExit` — run after the last child finishes; aggregates the
//!   entries and notifies the parent in turn.
//!
//! A directory task is owned by whichever handler currently runs it; the
//! parent back-link is a non-owning `Arc` plus the index of the child's
//! entry slot. The mutex-guarded `children` counter is the join point:
//! the child that drops it to zero schedules the parent's `DirExit`.
//!
//! When the pool queue is full, a task that cannot be queued runs inline
//! on the submitting worker instead. That keeps a bounded queue from ever
//! deadlocking the walk: inline descent and inline completion are both
//! bounded by tree depth.

use crate::walker::engine::Shared;
use crate::walker::visitor::{DirEntry, Visitor};
use parking_lot::{Mutex, RwLock};
use std::cmp::Ordering;
use std::fs::{self, Metadata};
use std::io;
use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::trace;

/// Scheduling phase, ordered by dequeue priority (highest last)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum Phase {
    DirEnter = 0,
    File = 1,
    DirExit = 2,
}

/// Non-owning link to the parent directory and the child's entry slot
pub(crate) struct ParentSlot<V: Visitor> {
    pub task: Arc<DirTask<V>>,
    pub slot: usize,
}

/// State guarded by the directory task's mutex
pub(crate) struct DirState<V: Visitor> {
    /// Children scheduled but not yet finished
    pub children: usize,

    /// One slot per surviving child, filled in by the children
    pub entries: Vec<DirEntry<V::Data>>,
}

/// One directory node of the walk
pub(crate) struct DirTask<V: Visitor> {
    pub walk: Arc<Shared<V>>,
    pub path: PathBuf,
    pub meta: Metadata,
    pub parent: Option<ParentSlot<V>>,

    /// Continuation from `enter_dir`; children borrow it, `exit_dir`
    /// consumes it.
    pub token: RwLock<Option<V::Token>>,

    pub state: Mutex<DirState<V>>,
}

impl<V: Visitor> DirTask<V> {
    pub fn new(
        walk: Arc<Shared<V>>,
        path: PathBuf,
        meta: Metadata,
        parent: Option<ParentSlot<V>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            walk,
            path,
            meta,
            parent,
            token: RwLock::new(None),
            state: Mutex::new(DirState {
                children: 0,
                entries: Vec::new(),
            }),
        })
    }
}

/// One dispatched non-directory node (`file_tasks` mode)
pub(crate) struct FileTask<V: Visitor> {
    pub path: PathBuf,
    pub meta: Metadata,
    pub parent: ParentSlot<V>,
}

/// A unit of work on the pool queue
pub(crate) enum Task<V: Visitor> {
    EnterDir(Arc<DirTask<V>>),
    ExitDir(Arc<DirTask<V>>),
    File(Box<FileTask<V>>),
}

impl<V: Visitor> Task<V> {
    pub fn run(self) {
        match self {
            Task::EnterDir(task) => enter_dir(task),
            Task::ExitDir(task) => exit_dir(task),
            Task::File(task) => visit_file(task),
        }
    }

    fn phase(&self) -> Phase {
        match self {
            Task::EnterDir(_) => Phase::DirEnter,
            Task::ExitDir(_) => Phase::DirExit,
            Task::File(_) => Phase::File,
        }
    }

    fn path(&self) -> &Path {
        match self {
            Task::EnterDir(task) | Task::ExitDir(task) => &task.path,
            Task::File(task) => &task.path,
        }
    }
}

/// Queue priority: finish open directories before visiting files, and
/// visit files before opening new directories. With `sort`, ties within a
/// phase prefer the lexicographically later path, draining deep subtrees
/// first.
pub(crate) fn compare<V: Visitor>(sort: bool, a: &Task<V>, b: &Task<V>) -> Ordering {
    match a.phase().cmp(&b.phase()) {
        Ordering::Equal if sort => a.path().cmp(b.path()),
        order => order,
    }
}

/// DirEnter handler: callback, enumerate, stat and schedule children.
pub(crate) fn enter_dir<V: Visitor>(task: Arc<DirTask<V>>) {
    let walk = Arc::clone(&task.walk);
    trace!(path = %task.path.display(), "dir enter");

    let token = {
        let parent_guard = task.parent.as_ref().map(|p| p.task.token.read());
        let parent_token = parent_guard.as_deref().and_then(|t| t.as_ref());
        walk.visitor.enter_dir(&task.path, &task.meta, parent_token)
    };
    let Some(token) = token else {
        // Skipped: the entry's data stays empty and no exit fires.
        trace!(path = %task.path.display(), "dir skipped");
        finish(&task, None);
        return;
    };
    *task.token.write() = Some(token);

    let reader = match fs::read_dir(&task.path) {
        Ok(reader) => reader,
        Err(err) => return fail(&task, err),
    };
    let mut names = Vec::new();
    for entry in reader {
        match entry {
            Ok(entry) => names.push(entry.file_name()),
            // A mid-stream error poisons the whole listing.
            Err(err) => return fail(&task, err),
        }
    }
    if walk.sort {
        names.sort_unstable();
    }

    let mut overflow: Vec<Task<V>> = Vec::new();
    let mut state = task.state.lock();
    state.entries.reserve(names.len());
    for name in names {
        let child_path = task.path.join(&name);
        let child_meta = match fs::symlink_metadata(&child_path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                // Removed between readdir and stat; tolerate the churn.
                continue;
            }
            Err(err) => {
                walk.visitor.on_error(&child_path, None, None, err);
                state.entries.push(DirEntry { name, data: None });
                continue;
            }
        };

        let slot = state.entries.len();
        state.entries.push(DirEntry { name, data: None });

        if child_meta.is_dir() {
            let child = DirTask::new(
                Arc::clone(&walk),
                child_path,
                child_meta,
                Some(ParentSlot {
                    task: Arc::clone(&task),
                    slot,
                }),
            );
            state.children += 1;
            if let Err(err) = walk.pool.try_submit(Task::EnterDir(child)) {
                overflow.push(err.into_task());
            }
        } else if walk.file_tasks {
            let child = Box::new(FileTask {
                path: child_path,
                meta: child_meta,
                parent: ParentSlot {
                    task: Arc::clone(&task),
                    slot,
                },
            });
            state.children += 1;
            if let Err(err) = walk.pool.try_submit(Task::File(child)) {
                overflow.push(err.into_task());
            }
        } else {
            let token_guard = task.token.read();
            let data = walk
                .visitor
                .visit_file(&child_path, &child_meta, token_guard.as_ref());
            drop(token_guard);
            state.entries[slot].data = data;
        }
    }
    let no_children = state.children == 0;
    drop(state);

    if !overflow.is_empty() {
        trace!(
            path = %task.path.display(),
            inline = overflow.len(),
            "queue full, running children inline"
        );
        for child in overflow {
            child.run();
        }
    }
    if no_children {
        // Nothing outstanding; skip the round trip through the queue.
        exit_dir(task);
    }
}

/// DirExit handler: aggregate the entries and notify upward.
pub(crate) fn exit_dir<V: Visitor>(task: Arc<DirTask<V>>) {
    // This lock acquisition doubles as the completion barrier: the frame
    // that dropped `children` to zero cannot still hold the state mutex
    // once the entries are taken.
    let entries = mem::take(&mut task.state.lock().entries);
    let token = task
        .token
        .write()
        .take()
        .expect("continuation set by enter_dir");
    trace!(path = %task.path.display(), entries = entries.len(), "dir exit");
    let data = task.walk.visitor.exit_dir(&task.path, &task.meta, token, entries);
    finish(&task, data);
}

/// File task handler (`file_tasks` mode only).
fn visit_file<V: Visitor>(task: Box<FileTask<V>>) {
    let walk = &task.parent.task.walk;
    let data = {
        let token_guard = task.parent.task.token.read();
        walk.visitor
            .visit_file(&task.path, &task.meta, token_guard.as_ref())
    };
    child_finished(&task.parent, data);
}

/// Directory open/read failure: route through `on_error`, store its
/// result as this node's data, and complete the node without an exit.
fn fail<V: Visitor>(task: &Arc<DirTask<V>>, err: io::Error) {
    let token = task.token.write().take();
    let data = task
        .walk
        .visitor
        .on_error(&task.path, Some(&task.meta), token, err);
    finish(task, data);
}

/// Completion path shared by every handler.
fn finish<V: Visitor>(task: &Arc<DirTask<V>>, data: Option<V::Data>) {
    match &task.parent {
        Some(parent) => child_finished(parent, data),
        None => task.walk.finish_root(data),
    }
}

/// Record a finished child: store its data, drop the counter, and when
/// this was the last outstanding child, schedule the parent's exit. The
/// submission happens under the parent's mutex so the exit handler's
/// barrier orders after this frame; an inline run drops the lock first.
fn child_finished<V: Visitor>(parent: &ParentSlot<V>, data: Option<V::Data>) {
    let dir = &parent.task;
    let mut state = dir.state.lock();
    state.entries[parent.slot].data = data;
    state.children -= 1;
    if state.children > 0 {
        return;
    }
    if let Err(err) = dir.walk.pool.try_submit(Task::ExitDir(Arc::clone(dir))) {
        drop(state);
        err.into_task().run();
    }
}
