//! The utilities built on the traversal engine
//!
//! Each submodule is a [`Visitor`](crate::walker::Visitor) implementation
//! plus its option set; the binaries under `src/bin/` are thin argument
//! parsers around them. What the original tools kept in process-wide
//! globals lives on the visitor structs here, shared across workers
//! through `&self` with atomics and mutexes.

pub mod du;
pub mod outliers;
pub mod rm;
pub mod sync;

use std::io;
use std::path::Path;
use tracing::warn;

/// Path as the exclude patterns see it: relative to the walk root. The
/// root directory itself reads as `.`; a root that is itself a file
/// reads as its file name.
pub(crate) fn match_path<'a>(root: &Path, path: &'a Path, is_dir: bool) -> &'a Path {
    match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel,
        _ => {
            if is_dir {
                Path::new(".")
            } else {
                path.file_name().map(Path::new).unwrap_or(Path::new("."))
            }
        }
    }
}

/// User-facing error line plus a log record, the way the tools report
/// every non-fatal problem before continuing.
pub(crate) fn report_io_error(path: &Path, err: &io::Error) {
    warn!(path = %path.display(), error = %err, "operation failed");
    eprintln!("{}: {}", path.display(), err);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_path_inside_root() {
        let root = Path::new("/data");
        assert_eq!(
            match_path(root, Path::new("/data/a/b"), false),
            Path::new("a/b")
        );
    }

    #[test]
    fn test_match_path_root_dir_is_dot() {
        let root = Path::new("/data");
        assert_eq!(match_path(root, Path::new("/data"), true), Path::new("."));
    }

    #[test]
    fn test_match_path_root_file_is_basename() {
        let root = Path::new("/data/file.txt");
        assert_eq!(
            match_path(root, Path::new("/data/file.txt"), false),
            Path::new("file.txt")
        );
    }
}
