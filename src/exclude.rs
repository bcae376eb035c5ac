//! Exclude filter shared by the utilities
//!
//! Patterns are glob-style, matched against the path *relative to the
//! walk root*, and wildcards never cross a `/`:
//!
//! - `name` / `*.o` — unanchored: matches at any depth
//!   (`*.o` excludes `x.o` and `build/deep/x.o`).
//! - `/build/*` — a leading `/` anchors the pattern at the walk root.
//! - `cache/` — a trailing `/` restricts the pattern to directories.
//!
//! Excluding a directory prunes its whole subtree.

use globset::{GlobBuilder, GlobMatcher};
use std::path::Path;
use thiserror::Error;

/// A pattern that could not be compiled
#[derive(Error, Debug)]
#[error("invalid exclude pattern '{pattern}'")]
pub struct ExcludeError {
    pub pattern: String,
    #[source]
    source: globset::Error,
}

#[derive(Debug)]
struct Pattern {
    /// Match against the whole relative path
    exact: GlobMatcher,

    /// Match at any depth (unanchored patterns only)
    nested: Option<GlobMatcher>,

    /// Restrict to directories (trailing-`/` patterns)
    dir_only: bool,
}

/// Compiled set of exclude patterns
#[derive(Default, Debug)]
pub struct ExcludeSet {
    patterns: Vec<Pattern>,
}

impl ExcludeSet {
    /// Compile `patterns`; fails on the first malformed one.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ExcludeError> {
        let mut compiled = Vec::with_capacity(patterns.len());
        for raw in patterns {
            let raw = raw.as_ref();
            let (body, dir_only) = match raw.strip_suffix('/') {
                Some(body) if !body.is_empty() => (body, true),
                _ => (raw, false),
            };
            let (body, anchored) = match body.strip_prefix('/') {
                Some(body) => (body, true),
                None => (body, false),
            };

            let compile = |pat: &str| {
                GlobBuilder::new(pat)
                    .literal_separator(true)
                    .build()
                    .map(|g| g.compile_matcher())
                    .map_err(|source| ExcludeError {
                        pattern: raw.to_string(),
                        source,
                    })
            };

            let exact = compile(body)?;
            let nested = if anchored {
                None
            } else {
                Some(compile(&format!("**/{body}"))?)
            };
            compiled.push(Pattern {
                exact,
                nested,
                dir_only,
            });
        }
        Ok(Self { patterns: compiled })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// True when `rel` (relative to the walk root) is excluded.
    pub fn matches(&self, rel: &Path, is_dir: bool) -> bool {
        self.patterns.iter().any(|p| {
            if p.dir_only && !is_dir {
                return false;
            }
            p.exact.is_match(rel) || p.nested.as_ref().is_some_and(|m| m.is_match(rel))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(patterns: &[&str]) -> ExcludeSet {
        ExcludeSet::new(patterns).expect("patterns compile")
    }

    #[test]
    fn test_unanchored_matches_any_depth() {
        let ex = set(&["*.o"]);
        assert!(ex.matches(Path::new("x.o"), false));
        assert!(ex.matches(Path::new("build/deep/x.o"), false));
        assert!(!ex.matches(Path::new("x.c"), false));
    }

    #[test]
    fn test_wildcard_does_not_cross_separator() {
        let ex = set(&["a*b"]);
        assert!(ex.matches(Path::new("axxb"), false));
        assert!(!ex.matches(Path::new("ax/xb"), false));
    }

    #[test]
    fn test_anchored_at_root_only() {
        let ex = set(&["/build"]);
        assert!(ex.matches(Path::new("build"), true));
        assert!(!ex.matches(Path::new("src/build"), true));
    }

    #[test]
    fn test_dir_only_pattern() {
        let ex = set(&["cache/"]);
        assert!(ex.matches(Path::new("cache"), true));
        assert!(!ex.matches(Path::new("cache"), false));
        assert!(ex.matches(Path::new("var/cache"), true));
    }

    #[test]
    fn test_dir_only_does_not_shadow_later_patterns() {
        let ex = set(&["cache/", "*.tmp"]);
        assert!(ex.matches(Path::new("a.tmp"), false));
    }

    #[test]
    fn test_invalid_pattern_reports_source() {
        let err = ExcludeSet::new(&["a[b"]).unwrap_err();
        assert_eq!(err.pattern, "a[b");
    }

    #[test]
    fn test_empty_set_matches_nothing() {
        let ex = ExcludeSet::default();
        assert!(ex.is_empty());
        assert!(!ex.matches(Path::new("anything"), true));
    }
}
