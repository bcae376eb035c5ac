//! One-way tree synchronisation visitor (`pwsync`)
//!
//! Mirrors a source tree onto a destination: directories are created on
//! the way down (`enter_dir`), files are synchronised as they are
//! visited (each in its own pool task so copies overlap), and extraneous
//! destination entries are swept on the way back up (`exit_dir`), where
//! the sorted source listing is available for comparison.
//!
//! A regular file is copied only when the destination is missing or
//! differs in size or mtime — the same cheap quick-check rsync uses
//! locally. Symlinks are compared by target, device nodes by type and
//! device number. Mode, ownership, and mtime preservation are opt-in,
//! applied to directories only after their contents settled so a
//! restrictive directory mode cannot block its own sync.

use crate::exclude::ExcludeSet;
use crate::ops::{match_path, report_io_error};
use crate::walker::{DirEntry, Visitor};
use filetime::FileTime;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use std::ffi::CString;
use std::fs::{self, File, Metadata, OpenOptions};
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{
    chown, fchown, lchown, symlink, DirBuilderExt, FileTypeExt, MetadataExt, PermissionsExt,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Options shared by the visitor and the CLI
pub struct SyncOptions {
    /// Copy permission bits
    pub preserve_mode: bool,

    /// Copy gid always, uid when running as root
    pub preserve_ownership: bool,

    /// Copy modification times
    pub preserve_mtime: bool,

    /// Recreate hardlink groups on the destination
    pub preserve_hardlinks: bool,

    /// Delete destination entries absent from the source
    pub delete: bool,

    /// mtimes within this many seconds compare equal
    pub modify_window: i64,

    /// Compare mtimes at sub-second precision
    pub subsecond: bool,

    /// Skip source directories on other filesystems
    pub one_file_system: bool,

    /// 0 quiet, 1 changed paths, 2 directory markers too
    pub verbose: u8,

    /// Never copy these
    pub exclude: ExcludeSet,

    /// Never copy these and delete them from the destination
    pub exclude_delete: ExcludeSet,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            preserve_mode: false,
            preserve_ownership: false,
            preserve_mtime: false,
            preserve_hardlinks: false,
            delete: true,
            modify_window: 0,
            subsecond: false,
            one_file_system: false,
            verbose: 0,
            exclude: ExcludeSet::default(),
            exclude_delete: ExcludeSet::default(),
        }
    }
}

/// Continuation carried from `enter_dir` to `exit_dir`
pub struct DirSync {
    /// Destination directory existed before this sync
    dst_exists: bool,

    /// Destination stat from before any mutation
    dst_meta: Option<Metadata>,
}

/// Where an already-synced hardlinked inode landed on the destination
struct LinkTarget {
    dev: u64,
    ino: u64,
    path: PathBuf,
}

/// Visitor mirroring `src_root` onto `dst_root`
pub struct SyncVisitor {
    options: SyncOptions,
    src_root: PathBuf,
    dst_root: PathBuf,
    root_dev: u64,
    euid: u32,
    hardlinks: Mutex<HashMap<(u64, u64), LinkTarget>>,
    errors: AtomicBool,
}

impl SyncVisitor {
    pub fn new(options: SyncOptions, src_root: PathBuf, dst_root: PathBuf, root_dev: u64) -> Self {
        Self {
            options,
            src_root,
            dst_root,
            root_dev,
            euid: unsafe { libc::geteuid() },
            hardlinks: Mutex::new(HashMap::new()),
            errors: AtomicBool::new(false),
        }
    }

    pub fn had_errors(&self) -> bool {
        self.errors.load(Ordering::Relaxed)
    }

    fn error(&self, path: &Path, err: &io::Error) {
        self.errors.store(true, Ordering::Relaxed);
        report_io_error(path, err);
    }

    /// Destination path for a source path.
    fn dst_for(&self, src: &Path) -> PathBuf {
        match src.strip_prefix(&self.src_root) {
            Ok(rel) if !rel.as_os_str().is_empty() => self.dst_root.join(rel),
            _ => self.dst_root.clone(),
        }
    }

    fn same_mtime(&self, a: &Metadata, b: &Metadata) -> bool {
        let diff_s = a.mtime() - b.mtime();
        if self.options.subsecond {
            let diff_ns = a.mtime_nsec() - b.mtime_nsec();
            if self.options.modify_window == 0 {
                return diff_s == 0 && diff_ns.abs() < 1000;
            }
            // Fold the nanosecond part into a whole-second distance.
            let mut distance = diff_s;
            if diff_ns.abs() >= 1000 {
                if diff_ns < 0 {
                    distance -= 1;
                }
                if distance < 0 {
                    distance = -distance - 1;
                }
            }
            return distance < self.options.modify_window;
        }
        if self.options.modify_window != 0 {
            diff_s.abs() <= self.options.modify_window
        } else {
            diff_s == 0
        }
    }

    /// Remove a destination entry of whatever kind, subtree included.
    fn remove_dst(&self, path: &Path, meta: &Metadata) {
        let result = if meta.is_dir() {
            fs::remove_dir_all(path)
        } else {
            fs::remove_file(path)
        };
        if let Err(err) = result {
            if err.kind() != io::ErrorKind::NotFound {
                self.error(path, &err);
            }
        }
    }

    /// Ownership to apply, if any: `(uid, gid)` per the preserve rules —
    /// uid only when running as root, and only when something differs.
    fn wanted_ownership(
        &self,
        src: &Metadata,
        dst: Option<&Metadata>,
    ) -> Option<(Option<u32>, Option<u32>)> {
        if !self.options.preserve_ownership {
            return None;
        }
        let needed = match dst {
            None => true,
            Some(d) => (self.euid == 0 && src.uid() != d.uid()) || src.gid() != d.gid(),
        };
        if !needed {
            return None;
        }
        let uid = (self.euid == 0).then(|| src.uid());
        Some((uid, Some(src.gid())))
    }

    fn apply_times(&self, dst: &Path, src_meta: &Metadata) {
        let atime = FileTime::from_last_access_time(src_meta);
        let mtime = FileTime::from_last_modification_time(src_meta);
        if let Err(err) = filetime::set_file_times(dst, atime, mtime) {
            self.error(dst, &err);
        }
    }

    fn announce(&self, rel: &Path) {
        if self.options.verbose > 0 {
            println!("{}", rel.display());
        }
    }

    /// Copy-or-skip for one regular file.
    fn sync_regular(&self, src: &Path, src_meta: &Metadata, dst: &Path, rel: &Path) {
        let mut dst_meta = match lstat_opt(dst) {
            Ok(meta) => meta,
            Err(err) => return self.error(dst, &err),
        };

        if self.options.exclude_delete.matches(rel, false) {
            if let Some(meta) = &dst_meta {
                self.remove_dst(dst, meta);
            }
            return;
        }

        if let Some(meta) = &dst_meta {
            if !meta.is_file() {
                self.remove_dst(dst, meta);
                dst_meta = None;
            }
        }

        let unchanged = dst_meta
            .as_ref()
            .is_some_and(|d| src_meta.len() == d.len() && self.same_mtime(src_meta, d));

        if unchanged {
            // Quick-check hit; touch up metadata only.
            if let Some(d) = &dst_meta {
                if self.options.preserve_mode && src_meta.mode() != d.mode() {
                    if let Err(err) = fs::set_permissions(dst, src_meta.permissions()) {
                        return self.error(dst, &err);
                    }
                }
                if let Some((uid, gid)) = self.wanted_ownership(src_meta, Some(d)) {
                    if let Err(err) = chown(dst, uid, gid) {
                        return self.error(dst, &err);
                    }
                }
            }
            return;
        }

        let mut src_file = match File::open(src) {
            Ok(file) => file,
            // Source vanished mid-walk; nothing to sync anymore.
            Err(err) if err.kind() == io::ErrorKind::NotFound => return,
            Err(err) => return self.error(src, &err),
        };

        self.announce(rel);

        let mut dst_file = match self.open_dst(dst, dst_meta.as_ref()) {
            Ok(file) => file,
            Err(err) => return self.error(dst, &err),
        };

        let copied = match io::copy(&mut src_file, &mut dst_file) {
            Ok(n) => n,
            Err(err) => return self.error(dst, &err),
        };
        // Trim whatever an older, longer destination left behind.
        if let Err(err) = dst_file.set_len(copied) {
            return self.error(dst, &err);
        }

        if self.options.preserve_mode {
            let differs = dst_meta.as_ref().map_or(true, |d| d.mode() != src_meta.mode());
            if differs {
                if let Err(err) = dst_file.set_permissions(src_meta.permissions()) {
                    return self.error(dst, &err);
                }
            }
        }
        if let Some((uid, gid)) = self.wanted_ownership(src_meta, dst_meta.as_ref()) {
            if let Err(err) = fchown(&dst_file, uid, gid) {
                return self.error(dst, &err);
            }
        }
        drop(dst_file);

        if self.options.preserve_mtime {
            self.apply_times(dst, src_meta);
        }
    }

    /// Open the destination for writing, loosening its mode once when an
    /// existing file denies us (restrictive modes are common on synced
    /// read-only trees; the final mode is restored by preserve-mode).
    fn open_dst(&self, dst: &Path, dst_meta: Option<&Metadata>) -> io::Result<File> {
        let open = || OpenOptions::new().write(true).create(true).open(dst);
        match open() {
            Ok(file) => Ok(file),
            Err(err) if err.kind() == io::ErrorKind::PermissionDenied && self.euid != 0 => {
                let Some(meta) = dst_meta else {
                    return Err(err);
                };
                let mut mode = meta.mode() | 0o200;
                if meta.uid() != self.euid {
                    // Not ours; maybe group access gets us through.
                    mode |= 0o020;
                }
                fs::set_permissions(dst, fs::Permissions::from_mode(mode & 0o7777))?;
                open()
            }
            Err(err) => Err(err),
        }
    }

    /// Symlinks are replaced whenever the target differs.
    fn sync_symlink(&self, src: &Path, src_meta: &Metadata, dst: &Path, rel: &Path) {
        let mut dst_meta = match lstat_opt(dst) {
            Ok(meta) => meta,
            Err(err) => return self.error(dst, &err),
        };

        if self.options.exclude_delete.matches(rel, false) {
            if let Some(meta) = &dst_meta {
                self.remove_dst(dst, meta);
            }
            return;
        }

        let target = match fs::read_link(src) {
            Ok(target) => target,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                // Source vanished; drop any stale destination link.
                if dst_meta.is_some() {
                    let _ = fs::remove_file(dst);
                }
                return;
            }
            Err(err) => return self.error(src, &err),
        };

        if let Some(meta) = &dst_meta {
            if !meta.file_type().is_symlink() {
                self.remove_dst(dst, meta);
                dst_meta = None;
            }
        }
        if dst_meta.is_some() {
            match fs::read_link(dst) {
                Ok(existing) if existing == target => {}
                _ => {
                    let _ = fs::remove_file(dst);
                    dst_meta = None;
                }
            }
        }

        if dst_meta.is_none() {
            self.announce(rel);
            if let Err(err) = symlink(&target, dst) {
                return self.error(dst, &err);
            }
        }

        if let Some((uid, gid)) = self.wanted_ownership(src_meta, dst_meta.as_ref()) {
            if let Err(err) = lchown(dst, uid, gid) {
                self.error(dst, &err);
            }
        }
    }

    /// FIFOs, sockets, and device nodes are recreated via mknod when the
    /// type (or device number, where one applies) differs.
    fn sync_special(&self, src_meta: &Metadata, dst: &Path, rel: &Path, use_dev: bool) {
        let mut dst_meta = match lstat_opt(dst) {
            Ok(meta) => meta,
            Err(err) => return self.error(dst, &err),
        };

        if self.options.exclude_delete.matches(rel, false) {
            if let Some(meta) = &dst_meta {
                self.remove_dst(dst, meta);
            }
            return;
        }

        let fmt = src_meta.mode() & libc::S_IFMT as u32;
        if let Some(meta) = &dst_meta {
            if meta.mode() & libc::S_IFMT as u32 != fmt {
                self.remove_dst(dst, meta);
                dst_meta = None;
            }
        }
        if use_dev {
            if let Some(meta) = &dst_meta {
                if meta.rdev() != src_meta.rdev() {
                    let _ = fs::remove_file(dst);
                    dst_meta = None;
                }
            }
        }

        if dst_meta.is_none() {
            self.announce(rel);
            let dev = if use_dev { src_meta.rdev() } else { 0 };
            if let Err(err) = mknod(dst, src_meta.mode(), dev) {
                return self.error(dst, &err);
            }
        } else if self.options.preserve_mode {
            if let Some(meta) = &dst_meta {
                if src_meta.mode() != meta.mode() {
                    if let Err(err) = fs::set_permissions(dst, src_meta.permissions()) {
                        return self.error(dst, &err);
                    }
                }
            }
        }

        if let Some((uid, gid)) = self.wanted_ownership(src_meta, dst_meta.as_ref()) {
            if let Err(err) = chown(dst, uid, gid) {
                self.error(dst, &err);
            }
        }
    }

    /// Second and later occurrences of a hardlinked inode become links to
    /// the first occurrence's destination.
    fn link_existing(&self, target: &LinkTarget, dst: &Path, rel: &Path) {
        match lstat_opt(dst) {
            Ok(Some(meta)) => {
                if meta.dev() == target.dev && meta.ino() == target.ino {
                    return;
                }
                self.remove_dst(dst, &meta);
            }
            Ok(None) => {}
            Err(err) => return self.error(dst, &err),
        }
        self.announce(rel);
        if let Err(err) = fs::hard_link(&target.path, dst) {
            self.error(dst, &err);
        }
    }

    /// Sweep destination entries that no longer exist in the source.
    /// `entries` is the source listing, sorted by name.
    fn delete_extraneous(&self, dst: &Path, entries: &[DirEntry<()>]) {
        let reader = match fs::read_dir(dst) {
            Ok(reader) => reader,
            Err(err) => return self.error(dst, &err),
        };
        for item in reader {
            let item = match item {
                Ok(item) => item,
                Err(err) => return self.error(dst, &err),
            };
            let name = item.file_name();
            if entries.binary_search_by(|e| e.name.cmp(&name)).is_ok() {
                continue;
            }
            let path = dst.join(&name);
            if self.options.verbose > 0 {
                println!("deleting {}", path.display());
            }
            let is_dir = item.file_type().map(|t| t.is_dir()).unwrap_or(false);
            let result = if is_dir {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            if let Err(err) = result {
                if err.kind() != io::ErrorKind::NotFound {
                    self.error(&path, &err);
                }
            }
        }
    }
}

impl Visitor for SyncVisitor {
    type Data = ();
    type Token = DirSync;

    fn enter_dir(&self, src: &Path, src_meta: &Metadata, _parent: Option<&DirSync>) -> Option<DirSync> {
        if self.options.one_file_system && src_meta.dev() != self.root_dev {
            return None;
        }
        let rel = match_path(&self.src_root, src, true);
        if self.options.exclude.matches(rel, true) {
            return None;
        }
        if self.options.verbose > 1 {
            println!(">>> {}/", src.display());
        }

        let dst = self.dst_for(src);
        let dst_meta = match lstat_opt(&dst) {
            Ok(meta) => meta,
            Err(err) => {
                self.error(&dst, &err);
                return None;
            }
        };

        if self.options.exclude_delete.matches(rel, true) {
            if let Some(meta) = &dst_meta {
                self.remove_dst(&dst, meta);
            }
            return None;
        }

        let mut dst_exists = dst_meta.is_some();
        if let Some(meta) = &dst_meta {
            if !meta.is_dir() {
                self.remove_dst(&dst, meta);
                dst_exists = false;
            }
        }

        if !dst_exists {
            if self.options.verbose > 0 {
                println!("{}/", rel.display());
            }
            // Created private; the final mode lands in exit_dir.
            let result = fs::DirBuilder::new().mode(0o700).create(&dst);
            if let Err(err) = result {
                if err.kind() != io::ErrorKind::AlreadyExists {
                    self.error(&dst, &err);
                    return None;
                }
            }
        }

        Some(DirSync {
            dst_exists,
            dst_meta,
        })
    }

    fn exit_dir(
        &self,
        src: &Path,
        src_meta: &Metadata,
        token: DirSync,
        entries: Vec<DirEntry<()>>,
    ) -> Option<()> {
        let dst = self.dst_for(src);

        if self.options.delete && token.dst_exists {
            let same = token
                .dst_meta
                .as_ref()
                .is_some_and(|d| self.same_mtime(src_meta, d));
            if !same {
                self.delete_extraneous(&dst, &entries);
            }
        }

        if self.options.verbose > 1 {
            println!("<<< {}/", src.display());
        }

        let old_meta = token.dst_meta.as_ref().filter(|_| token.dst_exists);
        if self.options.preserve_mode {
            let differs = old_meta.map_or(true, |d| d.mode() != src_meta.mode());
            if differs {
                if let Err(err) = fs::set_permissions(&dst, src_meta.permissions()) {
                    self.error(&dst, &err);
                    return None;
                }
            }
        }
        if let Some((uid, gid)) = self.wanted_ownership(src_meta, old_meta) {
            if let Err(err) = chown(&dst, uid, gid) {
                self.error(&dst, &err);
                return None;
            }
        }
        if self.options.preserve_mtime {
            self.apply_times(&dst, src_meta);
        }
        None
    }

    fn visit_file(&self, src: &Path, src_meta: &Metadata, _parent: Option<&DirSync>) -> Option<()> {
        let rel = match_path(&self.src_root, src, false);
        if self.options.exclude.matches(rel, false) {
            return None;
        }
        let dst = self.dst_for(src);

        // A hardlinked inode is synced once; the table lock is held
        // across the first occurrence's sync so the group cannot race.
        let key = (src_meta.dev(), src_meta.ino());
        let mut table: Option<MutexGuard<'_, HashMap<(u64, u64), LinkTarget>>> =
            (self.options.preserve_hardlinks && src_meta.nlink() > 1)
                .then(|| self.hardlinks.lock());
        if let Some(table) = table.as_mut() {
            if let Some(existing) = table.get(&key) {
                self.link_existing(existing, &dst, rel);
                return None;
            }
        }

        let file_type = src_meta.file_type();
        if file_type.is_file() {
            self.sync_regular(src, src_meta, &dst, rel);
        } else if file_type.is_symlink() {
            self.sync_symlink(src, src_meta, &dst, rel);
        } else if file_type.is_fifo() {
            self.sync_special(src_meta, &dst, rel, false);
        } else if file_type.is_socket() {
            self.sync_special(src_meta, &dst, rel, false);
        } else if file_type.is_block_device() {
            self.sync_special(src_meta, &dst, rel, true);
        } else if file_type.is_char_device() {
            self.sync_special(src_meta, &dst, rel, true);
        } else {
            self.errors.store(true, Ordering::Relaxed);
            eprintln!("file type not supported: {}", rel.display());
            return None;
        }

        if let Some(mut table) = table {
            match fs::symlink_metadata(&dst) {
                Ok(meta) => {
                    debug!(path = %dst.display(), "hardlink group anchored");
                    table.insert(
                        key,
                        LinkTarget {
                            dev: meta.dev(),
                            ino: meta.ino(),
                            path: dst,
                        },
                    );
                }
                Err(err) => self.error(&dst, &err),
            }
        }
        None
    }

    fn on_error(
        &self,
        path: &Path,
        _meta: Option<&Metadata>,
        _token: Option<DirSync>,
        err: io::Error,
    ) -> Option<()> {
        self.error(path, &err);
        None
    }
}

fn lstat_opt(path: &Path) -> io::Result<Option<Metadata>> {
    match fs::symlink_metadata(path) {
        Ok(meta) => Ok(Some(meta)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

fn mknod(path: &Path, mode: u32, dev: u64) -> io::Result<()> {
    let c_path = CString::new(path.as_os_str().as_bytes())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "path contains NUL byte"))?;
    let rc = unsafe { libc::mknod(c_path.as_ptr(), mode as libc::mode_t, dev as libc::dev_t) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}
