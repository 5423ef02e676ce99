//! Lock-coordinated access to cache entries
//!
//! An entry's state is inferred entirely from file existence plus the
//! outcome of a non-blocking flock attempt; there is no on-disk state file.
//! This is what makes the protocol crash-safe: a partially written file
//! whose exclusive lock is held is unambiguously in progress to any
//! observer, and the OS revokes the lock when the holder dies.
//!
//! Locks are advisory OS locks, valid across processes, so independent
//! workers sharing one cache root coordinate without any IPC.

use crate::cache::path::shard_path;
use crate::error::{MillError, MillResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// A locked cache entry handle.
///
/// The flock is held for the lifetime of this value; dropping it (via
/// [`Claim::publish`] or [`Claim::release`]) releases the lock.
#[derive(Debug)]
pub struct EntryLock {
    path: PathBuf,
    file: File,
}

impl EntryLock {
    /// Path of the locked entry
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The open file the lock is held on; the lock lives exactly as long
    /// as this handle
    pub fn file(&self) -> &File {
        &self.file
    }
}

/// Outcome of a successful [`CacheStore::claim_or_read`]
#[derive(Debug)]
pub enum Claim {
    /// Sole writer for this entry, holding the exclusive lock. The holder
    /// must eventually [`publish`](Claim::publish), even after a failure,
    /// so waiters are not stranded.
    Producer(EntryLock),

    /// Reader of a complete entry, holding a shared lock.
    Consumer(EntryLock),
}

impl Claim {
    /// Path of the claimed entry
    pub fn path(&self) -> &Path {
        match self {
            Self::Producer(lock) | Self::Consumer(lock) => lock.path(),
        }
    }

    /// Whether this claim carries the producer role
    pub fn is_producer(&self) -> bool {
        matches!(self, Self::Producer(_))
    }

    /// Release the exclusive lock and close the handle.
    ///
    /// This is the only transition to the Ready state. The lock is released
    /// when the handle is dropped.
    pub fn publish(self) {
        trace!("published {}", self.path().display());
    }

    /// Release a shared lock after a successful read.
    pub fn release(self) {
        trace!("released {}", self.path().display());
    }
}

/// Filesystem-backed cache with advisory-lock coordination
#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    /// Create a store rooted at the given cache directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The cache root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sharded on-disk path for a cache key
    pub fn entry_path(&self, key: &str) -> MillResult<PathBuf> {
        shard_path(&self.root, key)
    }

    /// Claim an entry for production or open it for reading.
    ///
    /// Without `force`, an existing file is opened read-only under a shared
    /// non-blocking lock: success means the entry is Ready and complete.
    /// A missing file (or `force`) leads to an exclusive non-blocking lock
    /// on an append-opened file: success makes the caller the sole Producer.
    ///
    /// Either lock attempt failing with `WouldBlock` yields
    /// [`MillError::LockContended`]; the caller is expected to re-run the
    /// whole operation after one cooperative scheduler yield.
    pub fn claim_or_read(&self, key: &str, force: bool) -> MillResult<Claim> {
        let path = self.entry_path(key)?;

        if !force && path.exists() {
            return self.read_shared(path);
        }
        self.claim_exclusive(path)
    }

    fn read_shared(&self, path: PathBuf) -> MillResult<Claim> {
        let file = match File::open(&path) {
            Ok(f) => f,
            // Deleted between the existence check and the open; let the
            // caller retry and re-evaluate.
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(MillError::LockContended),
            Err(e) => {
                return Err(MillError::io(
                    format!("opening cache entry {}", path.display()),
                    e,
                ))
            }
        };

        match FileExt::try_lock_shared(&file) {
            Ok(()) => {
                trace!("shared lock on {}", path.display());
                Ok(Claim::Consumer(EntryLock { path, file }))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                debug!("{} is still being produced", path.display());
                Err(MillError::LockContended)
            }
            Err(e) => Err(MillError::io(
                format!("locking cache entry {}", path.display()),
                e,
            )),
        }
    }

    fn claim_exclusive(&self, path: PathBuf) -> MillResult<Claim> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                MillError::io(format!("creating cache directory {}", parent.display()), e)
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| MillError::io(format!("opening cache entry {}", path.display()), e))?;

        match FileExt::try_lock_exclusive(&file) {
            Ok(()) => {
                debug!("claimed {} for production", path.display());
                Ok(Claim::Producer(EntryLock { path, file }))
            }
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                debug!("{} is claimed by another producer", path.display());
                Err(MillError::LockContended)
            }
            Err(e) => Err(MillError::io(
                format!("locking cache entry {}", path.display()),
                e,
            )),
        }
    }

    /// Remove a partial entry after a failed production.
    ///
    /// Only ever called by the producer that claimed the entry, after
    /// publishing. Ready entries are never deleted.
    pub fn remove_partial(&self, path: &Path) -> MillResult<()> {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!("removed partial entry {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(MillError::io(
                format!("removing partial entry {}", path.display()),
                e,
            )),
        }
    }
}
