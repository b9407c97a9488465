// src/fs/mock.rs

use super::{FileStamp, FileSystem};
use anyhow::{anyhow, Result};
use std::collections::{BTreeMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { content: Vec<u8>, mtime: SystemTime },
    Dir,
    Symlink(PathBuf),
}

#[derive(Debug, Default)]
struct MockState {
    entries: BTreeMap<PathBuf, MockEntry>,
    denied: HashSet<PathBuf>,
    /// Logical clock in seconds; every write moves it forward by one.
    clock: u64,
}

/// In-memory filesystem with a logical modification clock.
///
/// Every write or append stamps the file with a fresh, strictly increasing
/// mtime, which keeps change detection tests deterministic.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut state = self.state();
        ensure_dirs(&mut state, path.as_ref());
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let mut state = self.state();
        state.clock += 1;
        let mtime = UNIX_EPOCH + Duration::from_secs(state.clock);
        insert_file(&mut state, path.as_ref(), content.into(), mtime);
    }

    pub fn add_symlink(&self, path: impl AsRef<Path>, target: impl Into<PathBuf>) {
        let path = path.as_ref();
        let mut state = self.state();
        if let Some(parent) = path.parent() {
            ensure_dirs(&mut state, parent);
        }
        state.entries.insert(path.to_path_buf(), MockEntry::Symlink(target.into()));
    }

    /// Overwrite the mtime of an existing file without touching its content.
    pub fn set_modified(&self, path: impl AsRef<Path>, mtime: SystemTime) {
        let mut state = self.state();
        if let Some(MockEntry::File { mtime: current, .. }) = state.entries.get_mut(path.as_ref()) {
            *current = mtime;
        }
    }

    /// Remove a file, or a directory together with everything below it.
    pub fn remove(&self, path: impl AsRef<Path>) {
        let path = path.as_ref();
        let mut state = self.state();
        state.entries.retain(|p, _| !p.starts_with(path));
    }

    /// Make every read below `path` fail with `PermissionDenied`.
    pub fn deny(&self, path: impl AsRef<Path>) {
        self.state().denied.insert(path.as_ref().to_path_buf());
    }

    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        match self.state().entries.get(path.as_ref()) {
            Some(MockEntry::File { content, .. }) => Some(content.clone()),
            _ => None,
        }
    }
}

fn ensure_dirs(state: &mut MockState, path: &Path) {
    for ancestor in path.ancestors() {
        if ancestor.as_os_str().is_empty() {
            continue;
        }
        state
            .entries
            .entry(ancestor.to_path_buf())
            .or_insert(MockEntry::Dir);
    }
}

fn insert_file(state: &mut MockState, path: &Path, content: Vec<u8>, mtime: SystemTime) {
    if let Some(parent) = path.parent() {
        ensure_dirs(state, parent);
    }
    state
        .entries
        .insert(path.to_path_buf(), MockEntry::File { content, mtime });
}

fn check_access(state: &MockState, path: &Path) -> Result<()> {
    if state.denied.iter().any(|d| path.starts_with(d)) {
        let err = io::Error::new(io::ErrorKind::PermissionDenied, "permission denied");
        return Err(anyhow!(err).context(format!("accessing {:?}", path)));
    }
    Ok(())
}

fn not_found(path: &Path) -> anyhow::Error {
    anyhow!(io::Error::new(io::ErrorKind::NotFound, "no such file")).context(format!("{:?}", path))
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let state = self.state();
        check_access(&state, path)?;
        match state.entries.get(path) {
            Some(MockEntry::File { content, .. }) => Ok(content.clone()),
            Some(_) => Err(anyhow!("Not a regular file: {:?}", path)),
            None => Err(not_found(path)),
        }
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        check_access(&self.state(), path)?;
        self.add_file(path, contents);
        Ok(())
    }

    fn append(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let mut state = self.state();
        check_access(&state, path)?;
        state.clock += 1;
        let stamp = UNIX_EPOCH + Duration::from_secs(state.clock);
        match state.entries.get_mut(path) {
            Some(MockEntry::File { content, mtime }) => {
                content.extend_from_slice(contents);
                *mtime = stamp;
                Ok(())
            }
            Some(_) => Err(anyhow!("Not a regular file: {:?}", path)),
            None => Err(not_found(path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        self.state().entries.contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.state().entries.get(path), Some(MockEntry::File { .. }))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.state().entries.get(path), Some(MockEntry::Dir))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.add_dir(path);
        Ok(())
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        // Tests use absolute paths throughout.
        Ok(path.to_path_buf())
    }

    fn modified(&self, path: &Path) -> Result<SystemTime> {
        match self.state().entries.get(path) {
            Some(MockEntry::File { mtime, .. }) => Ok(*mtime),
            Some(_) => Err(anyhow!("Not a regular file: {:?}", path)),
            None => Err(not_found(path)),
        }
    }

    fn walk_files(
        &self,
        root: &Path,
        max_depth: usize,
        cap: usize,
        skip: &dyn Fn(&Path) -> bool,
    ) -> Result<Vec<FileStamp>> {
        let state = self.state();
        check_access(&state, root)?;
        if !matches!(state.entries.get(root), Some(MockEntry::Dir)) {
            return Err(not_found(root));
        }

        let mut files = Vec::new();
        for (path, entry) in state.entries.range(root.to_path_buf()..) {
            let Ok(rel) = path.strip_prefix(root) else {
                break;
            };
            if rel.components().count() > max_depth {
                continue;
            }
            // The entry itself or any directory between it and the root.
            if path.ancestors().take_while(|a| *a != root).any(skip) {
                continue;
            }
            if let MockEntry::File { mtime, .. } = entry {
                check_access(&state, path)?;
                files.push(FileStamp {
                    path: path.clone(),
                    mtime: *mtime,
                });
                if files.len() >= cap {
                    break;
                }
            }
        }
        Ok(files)
    }
}
