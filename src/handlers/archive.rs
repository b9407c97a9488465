// src/handlers/archive.rs

//! Unpacks tar, gzip-compressed tar and zip archives dropped into a watched
//! root.
//!
//! Entries are checked and size-capped while they are read; nothing is
//! written until the whole archive has been read successfully.

use std::io::{Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use flate2::bufread::GzDecoder;
use tar::Archive;
use thiserror::Error;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::dispatch::{Handler, HandlerError, HandlerFuture};
use crate::engine::ChangeRecord;
use crate::fs::FileSystem;
use crate::types::ChangeKind;
use crate::watch::hash::state_key;
use crate::watch::path_utils::has_suffix;
use crate::watch::{LedgerHandle, ProcessedStates};

/// Default cap on the total decompressed size of one archive.
pub const DEFAULT_MAX_EXTRACTED_BYTES: u64 = 256 * 1024 * 1024;

const TAR: &[&str] = &[".tar"];
const TAR_GZ: &[&str] = &[".tar.gz", ".tgz"];
const ZIP: &[&str] = &[".zip"];

/// Unix file-type bits of a symlink, as stored in zip external attributes.
const S_IFMT: u32 = 0o170_000;
const S_IFLNK: u32 = 0o120_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArchiveKind {
    Tar,
    TarGz,
    Zip,
}

impl ArchiveKind {
    fn detect(path: &Path) -> Option<Self> {
        if has_suffix(path, TAR_GZ) {
            Some(Self::TarGz)
        } else if has_suffix(path, TAR) {
            Some(Self::Tar)
        } else if has_suffix(path, ZIP) {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

#[derive(Debug, Error)]
enum ExtractError {
    /// Truncated or malformed; the file may still be being copied in.
    #[error("unreadable archive: {0:#}")]
    Corrupt(#[from] anyhow::Error),

    #[error("entry escapes the destination: {}", .0.display())]
    Escapes(PathBuf),

    #[error("archive expands to more than {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("archive has no extractable entries")]
    Empty,
}

impl From<ExtractError> for HandlerError {
    fn from(err: ExtractError) -> Self {
        match &err {
            ExtractError::Corrupt(_) | ExtractError::Empty => HandlerError::transient(err.to_string()),
            ExtractError::Escapes(_) | ExtractError::TooLarge { .. } => {
                HandlerError::fatal(err.to_string())
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Entry {
    Dir(PathBuf),
    File(PathBuf, Vec<u8>),
}

/// Running total of decompressed bytes for one archive.
struct Budget {
    limit: u64,
    used: u64,
}

impl Budget {
    fn new(limit: u64) -> Self {
        Self { limit, used: 0 }
    }

    /// Read one entry's data, failing as soon as the total passes the limit.
    fn read(&mut self, reader: impl Read, rel: &Path) -> Result<Vec<u8>, ExtractError> {
        let remaining = self.limit.saturating_sub(self.used);
        let mut data = Vec::new();
        reader
            .take(remaining.saturating_add(1))
            .read_to_end(&mut data)
            .with_context(|| format!("reading {}", rel.display()))?;

        if data.len() as u64 > remaining {
            return Err(ExtractError::TooLarge { limit: self.limit });
        }
        self.used += data.len() as u64;
        Ok(data)
    }
}

#[derive(Debug)]
pub struct ArchiveHandler {
    fs: Arc<dyn FileSystem>,
    ledger: LedgerHandle,
    extract_to: PathBuf,
    max_extracted_bytes: u64,
    processed: ProcessedStates,
}

impl ArchiveHandler {
    pub fn new(
        fs: Arc<dyn FileSystem>,
        ledger: LedgerHandle,
        extract_to: impl Into<PathBuf>,
        max_extracted_bytes: u64,
    ) -> Self {
        Self {
            fs,
            ledger,
            extract_to: extract_to.into(),
            max_extracted_bytes,
            processed: ProcessedStates::default(),
        }
    }

    async fn extract(&self, path: &Path, kind: ArchiveKind) -> Result<(), HandlerError> {
        if !self.fs.is_file(path) {
            warn!(path = ?path, "archive vanished before it could be extracted");
            return Ok(());
        }

        let key = state_key(path, self.fs.modified(path)?);
        if self.processed.is_processed(&key) {
            debug!(path = ?path, "archive already extracted; skipping");
            return Ok(());
        }

        let bytes = self.fs.read(path)?;
        let limit = self.max_extracted_bytes;
        let entries = tokio::task::spawn_blocking(move || read_entries(&bytes, kind, limit))
            .await
            .map_err(|e| HandlerError::transient(format!("archive worker failed: {e}")))?
            .map_err(|err| {
                warn!(path = ?path, error = %err, "archive rejected");
                HandlerError::from(err)
            })?;

        // Scanned paths are canonical, so ledger entries must be too.
        self.fs.create_dir_all(&self.extract_to)?;
        let dest = self.fs.canonicalize(&self.extract_to)?;

        let mut files = 0usize;
        for entry in entries {
            match entry {
                Entry::Dir(rel) => self.fs.create_dir_all(&dest.join(rel))?,
                Entry::File(rel, data) => {
                    let target = dest.join(rel);
                    self.ledger.mark_self_modified(&target);
                    self.fs.write(&target, &data)?;
                    files += 1;
                }
            }
        }

        self.processed.remember(key);
        info!(path = ?path, dest = ?dest, files, "archive extracted");
        Ok(())
    }
}

impl Handler for ArchiveHandler {
    fn name(&self) -> &str {
        "archive"
    }

    fn handle<'a>(&'a self, record: &'a ChangeRecord) -> HandlerFuture<'a> {
        Box::pin(async move {
            if record.kind != ChangeKind::Created || !record.is_external() {
                return Ok(());
            }
            match ArchiveKind::detect(&record.path) {
                Some(kind) => self.extract(&record.path, kind).await,
                None => Ok(()),
            }
        })
    }
}

/// Relative, without `..`, and not empty.
fn is_contained(rel: &Path) -> bool {
    let mut normal = 0;
    for component in rel.components() {
        match component {
            Component::Normal(_) => normal += 1,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    normal > 0
}

fn checked(rel: PathBuf) -> Result<PathBuf, ExtractError> {
    if is_contained(&rel) {
        Ok(rel)
    } else {
        Err(ExtractError::Escapes(rel))
    }
}

fn read_entries(bytes: &[u8], kind: ArchiveKind, limit: u64) -> Result<Vec<Entry>, ExtractError> {
    let mut budget = Budget::new(limit);
    let entries = match kind {
        ArchiveKind::Tar => read_tar(bytes, &mut budget)?,
        ArchiveKind::TarGz => read_tar(GzDecoder::new(bytes), &mut budget)?,
        ArchiveKind::Zip => read_zip(bytes, &mut budget)?,
    };

    if entries.is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(entries)
}

/// Directory and regular-file entries only; links and special entries are
/// skipped.
fn read_tar(reader: impl Read, budget: &mut Budget) -> Result<Vec<Entry>, ExtractError> {
    let mut archive = Archive::new(reader);

    let mut out = Vec::new();
    for entry in archive.entries().context("reading archive")? {
        let entry = entry.context("reading archive entry")?;
        let rel = entry.path().context("decoding entry path")?.into_owned();
        let kind = entry.header().entry_type();

        if kind.is_dir() {
            out.push(Entry::Dir(checked(rel)?));
        } else if kind.is_file() {
            let rel = checked(rel)?;
            let data = budget.read(entry, &rel)?;
            out.push(Entry::File(rel, data));
        } else {
            debug!(entry = ?rel, kind = ?kind, "skipping non-regular archive entry");
        }
    }
    Ok(out)
}

fn read_zip(bytes: &[u8], budget: &mut Budget) -> Result<Vec<Entry>, ExtractError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).context("reading zip directory")?;

    let mut out = Vec::new();
    for index in 0..archive.len() {
        let file = archive
            .by_index(index)
            .with_context(|| format!("reading zip entry {index}"))?;
        let rel = PathBuf::from(file.name());

        if file.unix_mode().is_some_and(|mode| mode & S_IFMT == S_IFLNK) {
            debug!(entry = ?rel, "skipping symlink archive entry");
        } else if file.is_dir() {
            out.push(Entry::Dir(checked(rel)?));
        } else {
            let rel = checked(rel)?;
            let data = budget.read(file, &rel)?;
            out.push(Entry::File(rel, data));
        }
    }
    Ok(out)
}
