// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use anyhow::{Context, Result};
use walkdir::WalkDir;

pub mod mock;

/// A regular file found while walking a root, with its modification time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStamp {
    pub path: PathBuf,
    pub mtime: SystemTime,
}

/// Abstract filesystem interface.
///
/// The scanner and the built-in handlers only touch the disk through this
/// trait, so tests can swap in [`mock::MockFileSystem`].
pub trait FileSystem: Send + Sync + Debug {
    fn read(&self, path: &Path) -> Result<Vec<u8>>;
    fn read_to_string(&self, path: &Path) -> Result<String>;
    /// Replace the file contents, creating parent directories as needed.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn append(&self, path: &Path, contents: &[u8]) -> Result<()>;
    fn exists(&self, path: &Path) -> bool;
    fn is_file(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    fn canonicalize(&self, path: &Path) -> Result<PathBuf>;
    fn modified(&self, path: &Path) -> Result<SystemTime>;

    /// Recursively list regular files under `root`.
    ///
    /// Symlinks are neither followed nor reported and special files are
    /// skipped. Paths for which `skip` returns true are left out during the
    /// walk: a skipped directory is not descended into, and skipped files
    /// do not count towards `cap`. Stops after `cap` files; callers pass
    /// one more than they are willing to accept to detect overflow.
    fn walk_files(
        &self,
        root: &Path,
        max_depth: usize,
        cap: usize,
        skip: &dyn Fn(&Path) -> bool,
    ) -> Result<Vec<FileStamp>>;
}

/// Implementation that uses `std::fs` and `walkdir`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        fs::read(path).with_context(|| format!("reading file {:?}", path))
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        fs::read_to_string(path).with_context(|| format!("reading file {:?}", path))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("creating dir {:?}", parent))?;
        }
        let mut file = fs::File::create(path).with_context(|| format!("creating file {:?}", path))?;
        file.write_all(contents).with_context(|| format!("writing to file {:?}", path))?;
        Ok(())
    }

    fn append(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let mut file = fs::OpenOptions::new()
            .append(true)
            .open(path)
            .with_context(|| format!("opening file {:?} for append", path))?;
        file.write_all(contents).with_context(|| format!("appending to file {:?}", path))?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).with_context(|| format!("creating dir {:?}", path))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        fs::canonicalize(path).with_context(|| format!("canonicalizing {:?}", path))
    }

    fn modified(&self, path: &Path) -> Result<SystemTime> {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .with_context(|| format!("reading mtime of {:?}", path))
    }

    fn walk_files(
        &self,
        root: &Path,
        max_depth: usize,
        cap: usize,
        skip: &dyn Fn(&Path) -> bool,
    ) -> Result<Vec<FileStamp>> {
        let mut files = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !skip(e.path()));

        for entry in walker {
            let entry = entry
                .map_err(io::Error::from)
                .with_context(|| format!("walking {:?}", root))?;

            // `file_type` comes from the directory listing (lstat semantics),
            // so symlinks and special files never look like regular files.
            if !entry.file_type().is_file() {
                continue;
            }

            let mtime = match entry.metadata() {
                Ok(meta) => meta
                    .modified()
                    .with_context(|| format!("reading mtime of {:?}", entry.path()))?,
                // Deleted between listing and stat: it is simply not there.
                Err(err)
                    if err.io_error().map(io::Error::kind) == Some(io::ErrorKind::NotFound) =>
                {
                    continue;
                }
                Err(err) => {
                    return Err(io::Error::from(err))
                        .with_context(|| format!("reading metadata under {:?}", root));
                }
            };

            files.push(FileStamp {
                path: entry.into_path(),
                mtime,
            });

            if files.len() >= cap {
                break;
            }
        }

        Ok(files)
    }
}
