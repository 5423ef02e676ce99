//! Image engine abstraction
//!
//! Provides a trait for the external image-processing capability so the
//! pipeline can be exercised without ImageMagick installed.

use crate::error::MillResult;
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Crop anchor positions understood by ImageMagick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Gravity {
    NorthWest,
    North,
    NorthEast,
    West,
    #[default]
    Center,
    East,
    SouthWest,
    South,
    SouthEast,
}

impl Gravity {
    /// Parse a gravity name, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "northwest" => Some(Self::NorthWest),
            "north" => Some(Self::North),
            "northeast" => Some(Self::NorthEast),
            "west" => Some(Self::West),
            "center" => Some(Self::Center),
            "east" => Some(Self::East),
            "southwest" => Some(Self::SouthWest),
            "south" => Some(Self::South),
            "southeast" => Some(Self::SouthEast),
            _ => None,
        }
    }
}

impl fmt::Display for Gravity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NorthWest => "NorthWest",
            Self::North => "North",
            Self::NorthEast => "NorthEast",
            Self::West => "West",
            Self::Center => "Center",
            Self::East => "East",
            Self::SouthWest => "SouthWest",
            Self::South => "South",
            Self::SouthEast => "SouthEast",
        };
        write!(f, "{}", name)
    }
}

/// One conversion to perform: source, destination, and geometry parameters.
///
/// Requiredness of the fields is enforced by the caller per operation; a
/// width or height of 0 means "unconstrained" where the operation allows it.
#[derive(Debug, Clone)]
pub struct ConvertJob {
    pub src: PathBuf,
    pub dst: PathBuf,
    pub width: u32,
    pub height: u32,
    pub x: i32,
    pub y: i32,
    pub quality: u8,
    pub gravity: Gravity,
}

/// Basic information about an image file
#[derive(Debug, Clone, Serialize)]
pub struct ImageInfo {
    /// Image format as reported by ImageMagick (e.g. "JPEG", "PNG")
    #[serde(rename = "type")]
    pub kind: String,
    /// Color depth in bits
    pub depth: u32,
    pub width: u32,
    pub height: u32,
    /// File size in bytes
    pub size: u64,
    /// Filename component
    pub name: String,
}

/// External image-processing capability
///
/// Implementations must leave a complete file at `job.dst` on success and
/// report failure otherwise; the caller owns cleanup of partial output.
#[async_trait]
pub trait ImageEngine: Send + Sync {
    /// Fit the image within width x height, preserving aspect ratio.
    /// A zero dimension leaves that axis unconstrained.
    async fn resize(&self, job: &ConvertJob) -> MillResult<()>;

    /// Extract exactly width x height anchored at (x, y) under the gravity
    async fn crop(&self, job: &ConvertJob) -> MillResult<()>;

    /// Resize to exactly width x height, ignoring aspect ratio
    async fn stretch(&self, job: &ConvertJob) -> MillResult<()>;

    /// Introspect an image file. `force` bypasses any metadata cache read
    /// (the result is still cached).
    async fn identify(&self, path: &Path, force: bool) -> MillResult<ImageInfo>;
}
