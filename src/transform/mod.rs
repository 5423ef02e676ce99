//! Transform orchestration
//!
//! Validates request parameters, derives the composite cache key for the
//! requested variant, and coordinates production of the derived file
//! through the store's claim protocol. The pixel work is delegated to an
//! [`ImageEngine`].

use crate::cache::{CacheStore, Claim};
use crate::error::{MillError, MillResult};
use crate::magick::{ConvertJob, Gravity, ImageEngine, ImageInfo};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Requested manipulation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Fit within width x height, preserving aspect ratio
    Resize,
    /// Extract exactly width x height at an anchor
    Crop,
    /// Resize to exactly width x height, ignoring aspect ratio
    Stretch,
    /// Download and cache only, no derived variant
    Cache,
}

impl Operation {
    /// Parse an operation name, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "resize" => Some(Self::Resize),
            "crop" => Some(Self::Crop),
            "stretch" => Some(Self::Stretch),
            "cache" => Some(Self::Cache),
            _ => None,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Resize => "resize",
            Self::Crop => "crop",
            Self::Stretch => "stretch",
            Self::Cache => "cache",
        };
        write!(f, "{}", name)
    }
}

/// A fully specified transform request.
///
/// Immutable once validated; the derived cache key is a pure function of
/// these fields plus the source basename.
#[derive(Debug, Clone)]
pub struct TransformRequest {
    pub operation: Operation,
    /// Target width; 0 = unconstrained where the operation allows it
    pub width: u32,
    /// Target height; 0 = unconstrained, or defaulted per operation
    pub height: u32,
    /// JPEG quality, 1-100
    pub quality: u8,
    /// Crop x offset
    pub x: i32,
    /// Crop y offset
    pub y: i32,
    /// Crop anchor
    pub gravity: Gravity,
}

/// Default quality, chosen to avoid downsampling chroma channels
pub const DEFAULT_QUALITY: u8 = 92;

impl TransformRequest {
    /// A request with defaults for everything but the operation
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            width: 0,
            height: 0,
            quality: DEFAULT_QUALITY,
            x: 0,
            y: 0,
            gravity: Gravity::Center,
        }
    }

    /// Validate per-operation requirements and apply documented defaults,
    /// returning the normalized request. No filesystem activity happens on
    /// the failure path.
    ///
    /// - resize: at least one of width/height
    /// - crop: width required; height defaults to width
    /// - stretch: both width and height required
    /// - cache: no geometry
    pub fn validated(&self) -> MillResult<Self> {
        let mut request = self.clone();

        match request.operation {
            Operation::Resize => {
                if request.width == 0 && request.height == 0 {
                    return Err(MillError::InvalidParams(
                        "one of width or height must be specified".to_string(),
                    ));
                }
            }
            Operation::Crop => {
                if request.width == 0 {
                    return Err(MillError::InvalidParams(
                        "width must be specified for crop".to_string(),
                    ));
                }
                if request.height == 0 {
                    request.height = request.width;
                }
            }
            Operation::Stretch => {
                if request.width == 0 || request.height == 0 {
                    return Err(MillError::InvalidParams(
                        "both width and height must be specified and greater than 0".to_string(),
                    ));
                }
            }
            Operation::Cache => {}
        }

        Ok(request)
    }

    /// Composite cache key for the variant derived from `source`:
    /// `{basename}_{operation}_q{quality}_{width}x{height}`
    pub fn cache_key(&self, source: &Path) -> MillResult<String> {
        let basename = source
            .file_name()
            .and_then(|f| f.to_str())
            .ok_or_else(|| {
                MillError::InvalidParams(format!(
                    "source path {} has no basename",
                    source.display()
                ))
            })?;

        Ok(format!(
            "{}_{}_q{}_{}x{}",
            basename, self.operation, self.quality, self.width, self.height
        ))
    }
}

/// Coordinates derived-variant production over the cache store
pub struct Transformer {
    store: CacheStore,
    engine: Arc<dyn ImageEngine>,
}

impl Transformer {
    /// Create a transformer over the given store and engine
    pub fn new(store: CacheStore, engine: Arc<dyn ImageEngine>) -> Self {
        Self { store, engine }
    }

    /// Produce (or read) the variant of `source` described by `request`.
    ///
    /// Returns the derived file's path and metadata. For
    /// [`Operation::Cache`] the source itself is returned. With `force`,
    /// the variant is re-produced even when a Ready entry exists.
    pub async fn transform(
        &self,
        source: &Path,
        request: &TransformRequest,
        force: bool,
    ) -> MillResult<(PathBuf, ImageInfo)> {
        let request = request.validated()?;

        if request.operation == Operation::Cache {
            return self.identify_source(source, force).await;
        }

        let key = request.cache_key(source)?;

        loop {
            match self.store.claim_or_read(&key, force) {
                Ok(claim @ Claim::Consumer(_)) => {
                    let path = claim.path().to_path_buf();
                    claim.release();
                    debug!("{} already converted and cached, skipping", path.display());
                    let info = self.engine.identify(&path, false).await?;
                    return Ok((path, info));
                }
                Ok(claim @ Claim::Producer(_)) => {
                    let path = claim.path().to_path_buf();
                    debug!("claimed {}, starting conversion", path.display());

                    let result = self.produce(source, &path, &request, force).await;
                    claim.publish();
                    return match result {
                        Ok(info) => {
                            info!("converted {} to {}", source.display(), path.display());
                            Ok((path, info))
                        }
                        Err(e) => {
                            self.store.remove_partial(&path)?;
                            Err(e)
                        }
                    };
                }
                Err(MillError::LockContended) => {
                    tokio::task::yield_now().await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Run the conversion and introspect the result, with the exclusive
    /// claim held throughout
    async fn produce(
        &self,
        source: &Path,
        dst: &Path,
        request: &TransformRequest,
        force: bool,
    ) -> MillResult<ImageInfo> {
        let job = ConvertJob {
            src: source.to_path_buf(),
            dst: dst.to_path_buf(),
            width: request.width,
            height: request.height,
            x: request.x,
            y: request.y,
            quality: request.quality,
            gravity: request.gravity,
        };

        match request.operation {
            Operation::Resize => self.engine.resize(&job).await?,
            Operation::Crop => self.engine.crop(&job).await?,
            Operation::Stretch => self.engine.stretch(&job).await?,
            Operation::Cache => unreachable!("cache requests never claim a derived entry"),
        }

        // Forced requests bypass the metadata cache so a stale record for a
        // re-produced entry is never returned
        self.engine.identify(dst, force).await
    }

    /// Metadata for a cache-only request. An unrecognizable download is
    /// removed rather than kept.
    async fn identify_source(&self, source: &Path, force: bool) -> MillResult<(PathBuf, ImageInfo)> {
        match self.engine.identify(source, force).await {
            Ok(info) => Ok((source.to_path_buf(), info)),
            Err(e) => {
                self.store.remove_partial(source)?;
                Err(e)
            }
        }
    }
}
