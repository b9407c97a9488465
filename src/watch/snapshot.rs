// src/watch/snapshot.rs

//! Snapshots of watched roots and the diff between two of them.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::fs::FileStamp;
use crate::types::ChangeKind;

/// Point-in-time mapping of file path to modification time for one root.
///
/// Only regular files are ever inserted (the scanner never reports
/// directories). Backed by a `BTreeMap` so iteration is lexicographic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    files: BTreeMap<PathBuf, SystemTime>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, mtime: SystemTime) {
        self.files.insert(path.into(), mtime);
    }

    pub fn get(&self, path: &Path) -> Option<SystemTime> {
        self.files.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, SystemTime)> {
        self.files.iter().map(|(p, t)| (p.as_path(), *t))
    }
}

impl FromIterator<FileStamp> for Snapshot {
    fn from_iter<I: IntoIterator<Item = FileStamp>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().map(|f| (f.path, f.mtime)).collect(),
        }
    }
}

impl FromIterator<(PathBuf, SystemTime)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (PathBuf, SystemTime)>>(iter: I) -> Self {
        Self {
            files: iter.into_iter().collect(),
        }
    }
}

/// A change found by diffing two snapshots, before its origin is known.
///
/// `mtime` is the timestamp in the newer snapshot, or the last known one
/// for deletions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChange {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub mtime: SystemTime,
}

/// Diff two snapshots of the same root.
///
/// - present now, absent before → `Created`
/// - present in both, strictly newer now → `Modified`
/// - absent now, present before → `Deleted`
///
/// Equal (or older) timestamps produce nothing. Both inputs are sorted maps,
/// so a single merge pass yields exactly one change per path, ordered
/// lexicographically by path.
pub fn diff(previous: &Snapshot, current: &Snapshot) -> Vec<RawChange> {
    let mut changes = Vec::new();
    let mut prev = previous.files.iter().peekable();
    let mut cur = current.files.iter().peekable();

    loop {
        match (prev.peek(), cur.peek()) {
            (None, None) => break,
            (Some(&(p, &old)), None) => {
                changes.push(change(p, ChangeKind::Deleted, old));
                prev.next();
            }
            (None, Some(&(c, &new))) => {
                changes.push(change(c, ChangeKind::Created, new));
                cur.next();
            }
            (Some(&(p, &old)), Some(&(c, &new))) => match p.cmp(c) {
                std::cmp::Ordering::Less => {
                    changes.push(change(p, ChangeKind::Deleted, old));
                    prev.next();
                }
                std::cmp::Ordering::Greater => {
                    changes.push(change(c, ChangeKind::Created, new));
                    cur.next();
                }
                std::cmp::Ordering::Equal => {
                    if new > old {
                        changes.push(change(c, ChangeKind::Modified, new));
                    }
                    prev.next();
                    cur.next();
                }
            },
        }
    }

    changes
}

fn change(path: &Path, kind: ChangeKind, mtime: SystemTime) -> RawChange {
    RawChange {
        path: path.to_path_buf(),
        kind,
        mtime,
    }
}

/// Most recent snapshot per watched root.
///
/// Owned by the watch core; nothing else mutates it.
#[derive(Debug, Default)]
pub struct SnapshotStore {
    by_root: HashMap<PathBuf, Snapshot>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, root: &Path) -> Option<&Snapshot> {
        self.by_root.get(root)
    }

    pub fn contains(&self, root: &Path) -> bool {
        self.by_root.contains_key(root)
    }

    /// Store `snapshot` for `root`, returning the one it replaced.
    pub fn replace(&mut self, root: &Path, snapshot: Snapshot) -> Option<Snapshot> {
        self.by_root.insert(root.to_path_buf(), snapshot)
    }
}
