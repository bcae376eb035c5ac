//! Integration tests for the traversal engine
//!
//! Builds real trees under a tempdir and checks the ordering contract:
//! enter-before-subtree, subtree-before-exit, exactly one exit per
//! visited directory, and identical aggregation regardless of thread
//! count or queue bound.

use parwalk::{DirEntry, Visitor, WalkError, WalkOptions, Walker};
use std::ffi::OsString;
use std::fs::{self, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

#[derive(Debug)]
enum Event {
    Enter(PathBuf),
    Exit {
        path: PathBuf,
        names: Vec<OsString>,
        data: Vec<Option<u64>>,
    },
    File(PathBuf),
    Error(PathBuf),
}

/// Records every callback; sums sizes upward like a tiny du.
struct Recorder {
    events: Mutex<Vec<Event>>,
    skip: Option<PathBuf>,
    error_marker: u64,
}

impl Recorder {
    fn new() -> Self {
        Self {
            events: Mutex::new(Vec::new()),
            skip: None,
            error_marker: 999,
        }
    }

    fn skipping(path: PathBuf) -> Self {
        Self {
            skip: Some(path),
            ..Self::new()
        }
    }

    fn events(&self) -> std::sync::MutexGuard<'_, Vec<Event>> {
        self.events.lock().expect("events lock")
    }
}

impl Visitor for Recorder {
    type Data = u64;
    type Token = ();

    fn enter_dir(&self, path: &Path, _meta: &Metadata, _parent: Option<&()>) -> Option<()> {
        if self.skip.as_deref() == Some(path) {
            return None;
        }
        self.events().push(Event::Enter(path.to_path_buf()));
        Some(())
    }

    fn exit_dir(
        &self,
        path: &Path,
        _meta: &Metadata,
        _token: (),
        entries: Vec<DirEntry<u64>>,
    ) -> Option<u64> {
        let sum = entries.iter().filter_map(|e| e.data).sum();
        self.events().push(Event::Exit {
            path: path.to_path_buf(),
            names: entries.iter().map(|e| e.name.clone()).collect(),
            data: entries.iter().map(|e| e.data).collect(),
        });
        Some(sum)
    }

    fn visit_file(&self, path: &Path, meta: &Metadata, _parent: Option<&()>) -> Option<u64> {
        self.events().push(Event::File(path.to_path_buf()));
        Some(meta.len())
    }

    fn on_error(
        &self,
        path: &Path,
        _meta: Option<&Metadata>,
        _token: Option<()>,
        _err: io::Error,
    ) -> Option<u64> {
        self.events().push(Event::Error(path.to_path_buf()));
        Some(self.error_marker)
    }
}

fn write_file(path: &Path, len: usize) {
    fs::write(path, vec![b'x'; len]).expect("write file");
}

fn options(threads: usize, sort: bool, file_tasks: bool) -> WalkOptions {
    WalkOptions {
        threads,
        sort,
        file_tasks,
        ..WalkOptions::default()
    }
}

fn pos(events: &[Event], pred: impl Fn(&Event) -> bool) -> usize {
    events.iter().position(pred).expect("expected event")
}

fn is_exit_of(event: &Event, target: &Path) -> bool {
    matches!(event, Event::Exit { path, .. } if path == target)
}

#[test]
fn test_empty_directory() {
    let tmp = tempdir().expect("tempdir");
    let recorder = Arc::new(Recorder::new());
    let result = Walker::new(options(4, true, false))
        .run(tmp.path(), Arc::clone(&recorder))
        .expect("walk");
    assert_eq!(result, Some(0));

    let events = recorder.events();
    assert_eq!(events.len(), 2);
    assert!(matches!(&events[0], Event::Enter(p) if p == tmp.path()));
    match &events[1] {
        Event::Exit { path, names, .. } => {
            assert_eq!(path, tmp.path());
            assert!(names.is_empty());
        }
        other => panic!("expected exit, got {:?}", other),
    }
}

#[test]
fn test_flat_directory_unsorted() {
    let tmp = tempdir().expect("tempdir");
    for name in ["a", "b", "c", "d", "e"] {
        write_file(&tmp.path().join(name), 10);
    }
    let recorder = Arc::new(Recorder::new());
    let result = Walker::new(options(4, false, false))
        .run(tmp.path(), Arc::clone(&recorder))
        .expect("walk");
    assert_eq!(result, Some(50));

    let events = recorder.events();
    assert!(matches!(&events[0], Event::Enter(_)));
    assert!(matches!(events.last(), Some(Event::Exit { .. })));
    let files = events
        .iter()
        .filter(|e| matches!(e, Event::File(_)))
        .count();
    assert_eq!(files, 5);
    match events.last() {
        Some(Event::Exit { names, .. }) => {
            let mut sorted: Vec<_> = names.clone();
            sorted.sort();
            assert_eq!(sorted, ["a", "b", "c", "d", "e"]);
        }
        _ => unreachable!(),
    }
}

#[test]
fn test_flat_directory_sorted_entries() {
    let tmp = tempdir().expect("tempdir");
    for name in ["e", "c", "a", "d", "b"] {
        write_file(&tmp.path().join(name), 10);
    }
    let recorder = Arc::new(Recorder::new());
    Walker::new(options(4, true, true))
        .run(tmp.path(), Arc::clone(&recorder))
        .expect("walk");

    let events = recorder.events();
    match events.last() {
        Some(Event::Exit { names, .. }) => {
            assert_eq!(names, &["a", "b", "c", "d", "e"]);
        }
        other => panic!("expected exit last, got {:?}", other),
    }
}

#[test]
fn test_two_level_ordering() {
    let tmp = tempdir().expect("tempdir");
    let root = tmp.path();
    let sub = root.join("sub");
    fs::create_dir(&sub).expect("mkdir");
    write_file(&sub.join("x"), 1);
    write_file(&sub.join("y"), 2);
    write_file(&root.join("z"), 4);

    for file_tasks in [false, true] {
        let recorder = Arc::new(Recorder::new());
        let result = Walker::new(options(4, true, file_tasks))
            .run(root, Arc::clone(&recorder))
            .expect("walk");
        assert_eq!(result, Some(7));

        let events = recorder.events();
        let enter_root = pos(&events, |e| matches!(e, Event::Enter(p) if p == root));
        let enter_sub = pos(&events, |e| matches!(e, Event::Enter(p) if p == &sub));
        let file_x = pos(&events, |e| matches!(e, Event::File(p) if p == &sub.join("x")));
        let file_y = pos(&events, |e| matches!(e, Event::File(p) if p == &sub.join("y")));
        let file_z = pos(&events, |e| matches!(e, Event::File(p) if p == &root.join("z")));
        let exit_sub = pos(&events, |e| is_exit_of(e, &sub));
        let exit_root = pos(&events, |e| is_exit_of(e, root));

        assert!(enter_root < enter_sub);
        assert!(enter_sub < file_x && enter_sub < file_y);
        assert!(file_x < exit_sub && file_y < exit_sub);
        assert!(exit_sub < exit_root);
        assert!(enter_root < file_z && file_z < exit_root);
        assert_eq!(exit_root, events.len() - 1);
    }
}

#[test]
fn test_skipped_subtree() {
    let tmp = tempdir().expect("tempdir");
    let sub = tmp.path().join("sub");
    fs::create_dir(&sub).expect("mkdir");
    write_file(&sub.join("x"), 11);

    let recorder = Arc::new(Recorder::skipping(sub.clone()));
    Walker::new(options(2, true, false))
        .run(tmp.path(), Arc::clone(&recorder))
        .expect("walk");

    let events = recorder.events();
    assert!(!events.iter().any(|e| is_exit_of(e, &sub)));
    assert!(!events
        .iter()
        .any(|e| matches!(e, Event::File(p) if p.starts_with(&sub))));
    match events.last() {
        Some(Event::Exit { names, data, .. }) => {
            assert_eq!(names, &["sub"]);
            assert_eq!(data, &[None]);
        }
        other => panic!("expected root exit, got {:?}", other),
    }
}

#[cfg(unix)]
#[test]
fn test_unreadable_subdirectory_reports_error() {
    use std::os::unix::fs::PermissionsExt;

    // Root bypasses permission checks; nothing to test then.
    if unsafe { libc::geteuid() } == 0 {
        return;
    }

    let tmp = tempdir().expect("tempdir");
    let sub = tmp.path().join("sub");
    fs::create_dir(&sub).expect("mkdir");
    fs::set_permissions(&sub, fs::Permissions::from_mode(0o000)).expect("chmod");

    let recorder = Arc::new(Recorder::new());
    let result = Walker::new(options(2, true, false))
        .run(tmp.path(), Arc::clone(&recorder))
        .expect("walk");

    fs::set_permissions(&sub, fs::Permissions::from_mode(0o755)).expect("chmod back");

    let events = recorder.events();
    let error = pos(&events, |e| matches!(e, Event::Error(p) if p == &sub));
    let exit_root = pos(&events, |e| is_exit_of(e, tmp.path()));
    assert!(error < exit_root);
    assert!(!events.iter().any(|e| is_exit_of(e, &sub)));
    match &events[exit_root] {
        Event::Exit { names, data, .. } => {
            assert_eq!(names, &["sub"]);
            // The error handler's result lands in the entry.
            assert_eq!(data, &[Some(999)]);
        }
        _ => unreachable!(),
    }
    // And it propagates into the root aggregate.
    assert_eq!(result, Some(999));
}

/// Deletes a sibling when visiting the first file, so the engine's
/// subsequent stat of that sibling hits a vanished path.
struct DeletingVisitor {
    inner: Recorder,
    victim: PathBuf,
}

impl Visitor for DeletingVisitor {
    type Data = u64;
    type Token = ();

    fn enter_dir(&self, path: &Path, meta: &Metadata, parent: Option<&()>) -> Option<()> {
        self.inner.enter_dir(path, meta, parent)
    }

    fn exit_dir(
        &self,
        path: &Path,
        meta: &Metadata,
        token: (),
        entries: Vec<DirEntry<u64>>,
    ) -> Option<u64> {
        self.inner.exit_dir(path, meta, token, entries)
    }

    fn visit_file(&self, path: &Path, meta: &Metadata, parent: Option<&()>) -> Option<u64> {
        if path.file_name().is_some_and(|n| n == "a") {
            fs::remove_file(&self.victim).expect("remove victim");
        }
        self.inner.visit_file(path, meta, parent)
    }

    fn on_error(
        &self,
        path: &Path,
        meta: Option<&Metadata>,
        token: Option<()>,
        err: io::Error,
    ) -> Option<u64> {
        self.inner.on_error(path, meta, token, err)
    }
}

#[test]
fn test_child_removed_between_readdir_and_stat() {
    let tmp = tempdir().expect("tempdir");
    for name in ["a", "b", "c"] {
        write_file(&tmp.path().join(name), 5);
    }
    let visitor = Arc::new(DeletingVisitor {
        inner: Recorder::new(),
        victim: tmp.path().join("c"),
    });
    // Single thread + sorted + inline files: "a" is visited before "c"
    // is stat'd, deterministically.
    Walker::new(options(1, true, false))
        .run(tmp.path(), Arc::clone(&visitor))
        .expect("walk");

    let events = visitor.inner.events();
    assert!(!events.iter().any(|e| matches!(e, Event::Error(_))));
    match events.last() {
        Some(Event::Exit { names, .. }) => {
            // No entry at all for the vanished child.
            assert_eq!(names, &["a", "b"]);
        }
        other => panic!("expected exit last, got {:?}", other),
    }
}

#[test]
fn test_root_is_a_file() {
    let tmp = tempdir().expect("tempdir");
    let file = tmp.path().join("lonely");
    write_file(&file, 17);

    let recorder = Arc::new(Recorder::new());
    let result = Walker::new(options(4, true, false))
        .run(&file, Arc::clone(&recorder))
        .expect("walk");
    assert_eq!(result, Some(17));

    let events = recorder.events();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], Event::File(p) if p == &file));
}

#[test]
fn test_missing_root_is_an_error() {
    let tmp = tempdir().expect("tempdir");
    let recorder = Arc::new(Recorder::new());
    let err = Walker::new(options(2, false, false))
        .run(tmp.path().join("nope"), recorder)
        .unwrap_err();
    assert!(matches!(err, WalkError::Root { .. }));
}

/// Deterministic pseudo-random tree builder.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        self.0 >> 33
    }
}

fn build_tree(dir: &Path, depth: usize, rng: &mut Lcg, total: &mut u64, dirs: &mut u64) {
    let n_files = (rng.next() % 8) as usize;
    for i in 0..n_files {
        let len = (rng.next() % 2048) as usize;
        write_file(&dir.join(format!("f{i}")), len);
        *total += len as u64;
    }
    if depth == 0 {
        return;
    }
    let n_dirs = (rng.next() % 4) as usize;
    for i in 0..n_dirs {
        let sub = dir.join(format!("d{i}"));
        fs::create_dir(&sub).expect("mkdir");
        *dirs += 1;
        build_tree(&sub, depth - 1, rng, total, dirs);
    }
}

#[test]
fn test_aggregation_independent_of_parallelism() {
    let tmp = tempdir().expect("tempdir");
    let mut rng = Lcg(42);
    let mut total = 0;
    let mut dirs = 1;
    build_tree(tmp.path(), 5, &mut rng, &mut total, &mut dirs);

    for threads in [1, 2, 4, 16] {
        for file_tasks in [false, true] {
            let recorder = Arc::new(Recorder::new());
            let result = Walker::new(options(threads, true, file_tasks))
                .run(tmp.path(), Arc::clone(&recorder))
                .expect("walk");
            assert_eq!(result, Some(total), "threads={threads} file_tasks={file_tasks}");

            // Exactly one exit per directory, each after its whole subtree.
            let events = recorder.events();
            let exits: Vec<_> = events
                .iter()
                .enumerate()
                .filter_map(|(i, e)| match e {
                    Event::Exit { path, .. } => Some((i, path.clone())),
                    _ => None,
                })
                .collect();
            assert_eq!(exits.len() as u64, dirs);
            for (exit_at, dir) in &exits {
                for (i, event) in events.iter().enumerate() {
                    let path = match event {
                        Event::Enter(p) | Event::File(p) | Event::Error(p) => p,
                        Event::Exit { path, .. } => path,
                    };
                    if path.starts_with(dir) && path != dir {
                        assert!(
                            i < *exit_at,
                            "event under {} after its exit",
                            dir.display()
                        );
                    }
                }
            }
        }
    }
}

#[test]
fn test_tiny_queue_completes() {
    let tmp = tempdir().expect("tempdir");
    let mut rng = Lcg(7);
    let mut total = 0;
    let mut dirs = 1;
    build_tree(tmp.path(), 4, &mut rng, &mut total, &mut dirs);

    for threads in [1, 2, 4] {
        let walk = WalkOptions {
            threads,
            sort: true,
            file_tasks: true,
            queue_limit: Some(1),
            ..WalkOptions::default()
        };
        let recorder = Arc::new(Recorder::new());
        let result = Walker::new(walk)
            .run(tmp.path(), Arc::clone(&recorder))
            .expect("walk");
        assert_eq!(result, Some(total), "threads={threads}");
    }
}

#[test]
fn test_deep_narrow_tree() {
    // One directory per level; exercises the exit chain bottom-to-top.
    let tmp = tempdir().expect("tempdir");
    let mut dir = tmp.path().to_path_buf();
    for i in 0..64 {
        dir = dir.join(format!("level{i}"));
        fs::create_dir(&dir).expect("mkdir");
    }
    write_file(&dir.join("leaf"), 123);

    let recorder = Arc::new(Recorder::new());
    let result = Walker::new(options(4, true, false))
        .run(tmp.path(), Arc::clone(&recorder))
        .expect("walk");
    assert_eq!(result, Some(123));

    let events = recorder.events();
    let exits = events
        .iter()
        .filter(|e| matches!(e, Event::Exit { .. }))
        .count();
    assert_eq!(exits, 65);
}
