//! Cache key hashing and sharded path derivation
//!
//! Every cached artifact lives at a location computed purely from its key:
//! the first characters of the key become one directory level each, the full
//! key becomes the filename. Same key = same path, across calls and across
//! processes.

use crate::error::{MillError, MillResult};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Number of leading key characters promoted to directory levels.
///
/// Changing this changes the on-disk layout, which is an external contract
/// for anyone inspecting the cache directly.
pub const SHARD_DEPTH: usize = 4;

/// Hash a source identifier (URL or local path string) into a cache key.
///
/// The key is the lowercase hex SHA-256 of the identifier, so identical
/// sources always address the same cache entry.
pub fn source_key(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hex::encode(hasher.finalize())
}

/// Derive the sharded cache path for a key.
///
/// A key `abcdef...` maps to `<root>/a/b/c/d/abcdef...`. Keys shorter than
/// [`SHARD_DEPTH`] use every character they have. The key must have a
/// non-empty basename; path separators in the key are ignored (only the
/// final component is used), matching filename semantics.
pub fn shard_path(root: &Path, key: &str) -> MillResult<PathBuf> {
    let file = Path::new(key)
        .file_name()
        .and_then(|f| f.to_str())
        .ok_or_else(|| MillError::InvalidParams("cache key must not be empty".to_string()))?;

    let mut path = root.to_path_buf();
    for c in file.chars().take(SHARD_DEPTH) {
        path.push(c.to_string());
    }
    path.push(file);
    Ok(path)
}
