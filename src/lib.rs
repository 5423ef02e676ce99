//! imagemill - Caching image-transformation proxy
//!
//! Fetches source images by URL, applies resize/crop/stretch operations
//! via ImageMagick, and persists every source and derived variant on disk
//! behind advisory-lock coordination so concurrent workers sharing one
//! cache never duplicate work.

pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod magick;
pub mod server;
pub mod transform;

pub use error::{MillError, MillResult};
