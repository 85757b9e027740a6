//! Cache locations derived from a document's identity.
//!
//! Everything lives under `.cache/`. Document identities are hashed so that
//! arbitrary names never leak into file names or storage keys.

use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub const CACHE_DIR: &str = ".cache";

/// Stable storage key for a document identity.
pub fn document_key(document_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Synthesized audio is shared between documents; the file name already
/// hashes model, text and rate.
pub fn speech_dir() -> PathBuf {
    Path::new(CACHE_DIR).join("tts")
}

/// Sibling path for staging a write before it is renamed into place.
pub fn unique_temp_path(path: &Path) -> PathBuf {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let nonce = SEQ.fetch_add(1, Ordering::Relaxed);
    let ts_nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let mut temp_name = path
        .file_name()
        .and_then(|f| f.to_str())
        .unwrap_or("cache")
        .to_string();
    temp_name.push_str(&format!(".tmp-{ts_nanos}-{nonce}"));
    path.with_file_name(temp_name)
}

/// Move a staged file over `path`, copying when rename is not possible.
pub fn commit_temp(temp_path: &Path, path: &Path) -> io::Result<()> {
    if fs::rename(temp_path, path).is_err() {
        fs::copy(temp_path, path)?;
        let _ = fs::remove_file(temp_path);
    }
    Ok(())
}

/// Write `contents` so readers never observe a partial file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let temp_path = unique_temp_path(path);
    fs::write(&temp_path, contents)?;
    commit_temp(&temp_path, path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_key_is_stable_hex() {
        let key = document_key("moby-dick.epub");
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key, document_key("moby-dick.epub"));
        assert_ne!(key, document_key("moby-dick.txt"));
    }

    #[test]
    fn speech_cache_sits_under_cache_root() {
        assert!(speech_dir().starts_with(CACHE_DIR));
    }

    #[test]
    fn write_atomic_replaces_contents_without_leftovers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("state.toml");
        write_atomic(&path, b"first").expect("first write");
        write_atomic(&path, b"second").expect("second write");
        assert_eq!(fs::read_to_string(&path).expect("read"), "second");
        let entries = fs::read_dir(path.parent().expect("parent"))
            .expect("list")
            .count();
        assert_eq!(entries, 1);
    }
}
