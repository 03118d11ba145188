//! Blake3 hashing for figure deduplication

use std::io;
use std::path::Path;

/// Hash a file's contents with blake3.
pub fn hash_file(path: &Path) -> io::Result<blake3::Hash> {
    let mut hasher = blake3::Hasher::new();
    hasher.update_mmap(path)?;
    Ok(hasher.finalize())
}

/// Hash raw bytes with blake3.
pub fn hash_bytes(data: &[u8]) -> blake3::Hash {
    blake3::hash(data)
}

/// Hex digest of a file, or `None` when it cannot be read.
///
/// Unreadable images keep their figure entry with a null hash.
pub fn file_digest(path: &Path) -> Option<String> {
    match hash_file(path) {
        Ok(h) => Some(h.to_hex().to_string()),
        Err(e) => {
            log::debug!("hash {}: {e}", path.display());
            None
        }
    }
}
