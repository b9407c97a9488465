// src/watch/hash.rs

//! Hashing helpers used by handlers to recognise file states they have
//! already processed.

use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use blake3::Hasher;

/// Hex blake3 digest of `bytes`.
pub fn hash_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Identity of one observed state of a file: its path plus its mtime.
///
/// Two records for the same path with the same timestamp describe the same
/// state, so a handler that remembers this key can skip duplicates cheaply
/// without reading the file.
pub fn state_key(path: &Path, mtime: SystemTime) -> String {
    let nanos = mtime
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();

    let mut hasher = Hasher::new();
    hasher.update(path.as_os_str().as_encoded_bytes());
    hasher.update(b"\0");
    hasher.update(&nanos.to_le_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Identity of a file's content at a path.
pub fn content_key(path: &Path, content: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(path.as_os_str().as_encoded_bytes());
    hasher.update(b"\0");
    hasher.update(content);
    hasher.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn content_hash_matches_blake3() {
        assert_eq!(
            hash_bytes(b"hello world"),
            "d74981efa70a0c880b8d8c1985d075dbcbf679b99a5f9914e5aaf96b831a9e24"
        );
    }

    #[test]
    fn state_key_tracks_path_and_mtime() {
        let t = UNIX_EPOCH + Duration::from_secs(100);
        let a = state_key(Path::new("/w/a.png"), t);

        assert_eq!(a, state_key(Path::new("/w/a.png"), t));
        assert_ne!(a, state_key(Path::new("/w/b.png"), t));
        assert_ne!(a, state_key(Path::new("/w/a.png"), t + Duration::from_nanos(1)));
    }

    #[test]
    fn content_key_is_path_scoped() {
        assert_ne!(
            content_key(Path::new("/w/a.json"), b"{}"),
            content_key(Path::new("/w/b.json"), b"{}")
        );
    }
}
