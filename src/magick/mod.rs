//! ImageMagick integration
//!
//! The pixel work itself is delegated to external `convert` and `identify`
//! processes. [`ImageEngine`] is the seam: the pipeline only ever talks to
//! the trait, so tests substitute a scripted engine and never spawn a
//! process.

pub mod engine;
pub mod imagemagick;
pub mod info_cache;

pub use engine::{ConvertJob, Gravity, ImageEngine, ImageInfo};
pub use imagemagick::ImageMagick;
pub use info_cache::InfoCache;
