// src/watch/path_utils.rs

//! Utility functions for path handling in the scanner and handlers.

use std::path::Path;

/// Convert a path into a string relative to `root`, with forward slashes.
///
/// Returns `None` if `path` does not live under `root`. Scanned paths are
/// always produced by joining onto the (canonical) root, so no
/// canonicalization fallback is attempted here.
pub fn relative_str(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}

/// Lower-cased extension of `path`, without the dot.
pub fn extension_lower(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

/// True if the lower-cased file name ends with one of `suffixes`.
///
/// Used for multi-part extensions such as `.tar.gz`.
pub fn has_suffix(path: &Path, suffixes: &[&str]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let name = name.to_ascii_lowercase();
    suffixes.iter().any(|s| name.ends_with(s))
}
