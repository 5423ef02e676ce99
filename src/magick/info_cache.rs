//! Bounded in-memory cache for identify results
//!
//! Spawning `identify` for a file that was introspected moments ago is
//! wasted work: cache files are never mutated in place, so a signature's
//! metadata never goes stale. Entries are keyed by the exact command
//! signature and evicted only by capacity.

use crate::magick::engine::ImageInfo;
use moka::sync::Cache;

/// Default maximum number of cached identify results
pub const DEFAULT_MAX_ENTRIES: u64 = 10_240;

/// Bounded command-signature → [`ImageInfo`] cache.
///
/// An explicit object owned by the engine instance, so tests can construct
/// an isolated cache rather than sharing ambient global state.
pub struct InfoCache {
    cache: Cache<String, ImageInfo>,
}

impl InfoCache {
    /// Create a cache bounded to `max_entries`
    pub fn new(max_entries: u64) -> Self {
        Self {
            cache: Cache::builder().max_capacity(max_entries).build(),
        }
    }

    /// Look up a cached result by command signature
    pub fn get(&self, signature: &str) -> Option<ImageInfo> {
        self.cache.get(signature)
    }

    /// Cache the result for a command signature
    pub fn insert(&self, signature: String, info: ImageInfo) {
        self.cache.insert(signature, info);
    }

    /// Number of entries currently cached (approximate under concurrency)
    pub fn len(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InfoCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}
