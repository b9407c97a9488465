// src/watch/scanner.rs

//! Directory scanner: walks a root and produces a [`Snapshot`].

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use globset::{Glob, GlobSet, GlobSetBuilder};
use thiserror::Error;
use tracing::{debug, trace};

use crate::fs::FileSystem;
use crate::watch::path_utils::relative_str;
use crate::watch::snapshot::Snapshot;

pub const DEFAULT_MAX_DEPTH: usize = 64;
pub const DEFAULT_MAX_FILES: usize = 200_000;

/// Why a root could not be scanned.
///
/// A failed scan never yields a partial snapshot; the caller keeps the
/// previous one for that root.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("permission denied while scanning {root:?}: {message}")]
    PermissionDenied { root: PathBuf, message: String },

    #[error("watched root {0:?} does not exist")]
    RootMissing(PathBuf),

    #[error("scan of {root:?} stopped after {limit} files")]
    LimitExceeded { root: PathBuf, limit: usize },

    #[error("I/O error while scanning {root:?}: {message}")]
    Io { root: PathBuf, message: String },
}

impl ScanError {
    pub fn root(&self) -> &Path {
        match self {
            ScanError::PermissionDenied { root, .. }
            | ScanError::LimitExceeded { root, .. }
            | ScanError::Io { root, .. } => root,
            ScanError::RootMissing(root) => root,
        }
    }
}

/// Bounds that keep a single tick from growing without limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanLimits {
    pub max_depth: usize,
    pub max_files: usize,
}

impl Default for ScanLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_files: DEFAULT_MAX_FILES,
        }
    }
}

/// Compile root-relative exclude globs (e.g. `"**/.git/**"`).
pub fn build_exclude_set(patterns: &[String]) -> anyhow::Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat)
            .map_err(|e| anyhow::anyhow!("invalid exclude pattern '{}': {}", pat, e))?;
        builder.add(glob);
    }
    Ok(Some(builder.build()?))
}

/// Recursively lists regular files under a root.
///
/// Symlinks are never followed and never reported; special files are
/// skipped. Excludes are applied during the walk, so excluded files never
/// count towards `max_files` and a matching directory is not entered.
#[derive(Debug, Clone)]
pub struct Scanner {
    fs: Arc<dyn FileSystem>,
    limits: ScanLimits,
    exclude: Option<GlobSet>,
}

impl Scanner {
    pub fn new(fs: Arc<dyn FileSystem>, limits: ScanLimits, exclude: Option<GlobSet>) -> Self {
        Self { fs, limits, exclude }
    }

    /// Produce the current snapshot of `root`. Pure read.
    pub fn scan(&self, root: &Path) -> Result<Snapshot, ScanError> {
        if !self.fs.is_dir(root) {
            return Err(ScanError::RootMissing(root.to_path_buf()));
        }

        let cap = self.limits.max_files.saturating_add(1);
        let files = self
            .fs
            .walk_files(root, self.limits.max_depth, cap, &|path| {
                self.is_excluded(root, path)
            })
            .map_err(|err| classify(root, err))?;

        if files.len() > self.limits.max_files {
            return Err(ScanError::LimitExceeded {
                root: root.to_path_buf(),
                limit: self.limits.max_files,
            });
        }

        let snapshot: Snapshot = files.into_iter().collect();

        debug!(root = ?root, files = snapshot.len(), "scanned root");
        Ok(snapshot)
    }

    fn is_excluded(&self, root: &Path, path: &Path) -> bool {
        let Some(set) = &self.exclude else {
            return false;
        };
        match relative_str(root, path) {
            Some(rel) if set.is_match(&rel) => {
                trace!(rel = %rel, "excluded from snapshot");
                true
            }
            _ => false,
        }
    }
}

fn classify(root: &Path, err: anyhow::Error) -> ScanError {
    let root = root.to_path_buf();
    let message = format!("{err:#}");
    match err.downcast_ref::<io::Error>().map(io::Error::kind) {
        Some(io::ErrorKind::PermissionDenied) => ScanError::PermissionDenied { root, message },
        Some(io::ErrorKind::NotFound) => ScanError::RootMissing(root),
        _ => ScanError::Io { root, message },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn scanner(fs: &MockFileSystem, limits: ScanLimits, exclude: &[&str]) -> Scanner {
        let patterns: Vec<String> = exclude.iter().map(|s| s.to_string()).collect();
        Scanner::new(
            Arc::new(fs.clone()),
            limits,
            build_exclude_set(&patterns).unwrap(),
        )
    }

    #[test]
    fn missing_root_is_reported_as_such() {
        let fs = MockFileSystem::new();
        let err = scanner(&fs, ScanLimits::default(), &[])
            .scan(Path::new("/nope"))
            .unwrap_err();
        assert!(matches!(err, ScanError::RootMissing(_)));
    }

    #[test]
    fn permission_errors_are_classified() {
        let fs = MockFileSystem::new();
        fs.add_file("/w/locked/a.txt", "a");
        fs.deny("/w/locked");

        let err = scanner(&fs, ScanLimits::default(), &[])
            .scan(Path::new("/w"))
            .unwrap_err();
        assert!(matches!(err, ScanError::PermissionDenied { .. }), "{err:?}");
    }

    #[test]
    fn exceeding_max_files_fails_instead_of_truncating() {
        let fs = MockFileSystem::new();
        for i in 0..5 {
            fs.add_file(format!("/w/{i}.txt"), "x");
        }
        let limits = ScanLimits {
            max_depth: 8,
            max_files: 4,
        };
        let err = scanner(&fs, limits, &[]).scan(Path::new("/w")).unwrap_err();
        assert!(matches!(err, ScanError::LimitExceeded { limit: 4, .. }));

        let limits = ScanLimits {
            max_depth: 8,
            max_files: 5,
        };
        assert_eq!(scanner(&fs, limits, &[]).scan(Path::new("/w")).unwrap().len(), 5);
    }

    #[test]
    fn excluded_paths_never_enter_the_snapshot() {
        let fs = MockFileSystem::new();
        fs.add_file("/w/keep.txt", "k");
        fs.add_file("/w/.git/HEAD", "ref");

        let snap = scanner(&fs, ScanLimits::default(), &["**/.git/**", ".git/**"])
            .scan(Path::new("/w"))
            .unwrap();
        assert_eq!(snap.len(), 1);
        assert!(snap.get(Path::new("/w/keep.txt")).is_some());
    }

    #[test]
    fn excluded_files_do_not_count_towards_max_files() {
        let fs = MockFileSystem::new();
        for i in 0..50 {
            fs.add_file(format!("/w/.git/objects/{i:02}"), "o");
        }
        fs.add_file("/w/node_modules/pkg/index.js", "x");
        fs.add_file("/w/keep.txt", "k");
        let limits = ScanLimits {
            max_depth: 8,
            max_files: 2,
        };

        let snap = scanner(&fs, limits, &["**/.git/**", ".git/**", "node_modules"])
            .scan(Path::new("/w"))
            .unwrap();
        assert_eq!(snap.len(), 1);
        assert!(snap.get(Path::new("/w/keep.txt")).is_some());
    }

    #[test]
    fn empty_root_scans_to_empty_snapshot() {
        let fs = MockFileSystem::new();
        fs.add_dir("/w");
        let snap = scanner(&fs, ScanLimits::default(), &[]).scan(Path::new("/w")).unwrap();
        assert!(snap.is_empty());
    }
}
