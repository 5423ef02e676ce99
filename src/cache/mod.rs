//! Sharded on-disk cache with cross-process producer coordination
//!
//! Every artifact, fetched sources and derived variants alike, lives at a
//! path computed purely from its cache key. Advisory file locks decide who
//! may write an entry and when it is safe to read.
//!
//! # Entry States
//!
//! | State | Inferred from |
//! |---------|----------------------------------------------|
//! | Missing | No file at the derived path |
//! | Claimed | File exists, exclusive lock held by producer |
//! | Ready | File exists, shared lock obtainable |
//!
//! There is no separate state file: existence plus lock outcome is the whole
//! state machine, and the OS tears the lock down with its holder.

pub mod path;
pub mod store;

pub use path::{shard_path, source_key, SHARD_DEPTH};
pub use store::{CacheStore, Claim, EntryLock};
