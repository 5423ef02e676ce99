//! ImageMagick-backed engine
//!
//! Spawns the `convert` and `identify` binaries. Identify results are
//! served from the bounded [`InfoCache`] keyed by the exact command line,
//! avoiding a process spawn for repeated introspection of the same file.

use crate::config::MagickConfig;
use crate::error::{MillError, MillResult};
use crate::magick::engine::{ConvertJob, ImageEngine, ImageInfo};
use crate::magick::info_cache::InfoCache;
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// `identify` format producing type, depth, width, height, size, and name,
/// one per line
const IDENTIFY_FORMAT: &str = "%m\n%z\n%w\n%h\n%b\n%f";

/// Engine invoking ImageMagick processes
pub struct ImageMagick {
    convert_bin: String,
    identify_bin: String,
    info_cache: InfoCache,
}

impl ImageMagick {
    /// Create an engine from configuration
    pub fn new(config: &MagickConfig) -> Self {
        Self {
            convert_bin: config.convert_bin.clone(),
            identify_bin: config.identify_bin.clone(),
            info_cache: InfoCache::new(config.info_cache_entries),
        }
    }

    /// Geometry string for a resize: `100x`, `x50`, `100x50`.
    /// A zero dimension renders empty, leaving that axis unconstrained.
    fn geometry(width: u32, height: u32) -> String {
        let w = if width > 0 {
            width.to_string()
        } else {
            String::new()
        };
        let h = if height > 0 {
            height.to_string()
        } else {
            String::new()
        };
        format!("{}x{}", w, h)
    }

    /// Arguments for a resize or stretch conversion
    fn resize_args(job: &ConvertJob, exact: bool) -> Vec<String> {
        let adjustment = if exact { "!" } else { "" };
        vec![
            job.src.display().to_string(),
            "-resize".to_string(),
            format!("{}{}", Self::geometry(job.width, job.height), adjustment),
            "-quality".to_string(),
            job.quality.to_string(),
            job.dst.display().to_string(),
        ]
    }

    /// Arguments for a crop conversion
    fn crop_args(job: &ConvertJob) -> Vec<String> {
        vec![
            job.src.display().to_string(),
            "-gravity".to_string(),
            job.gravity.to_string(),
            "-crop".to_string(),
            format!("{}x{}{:+}{:+}", job.width, job.height, job.x, job.y),
            "-quality".to_string(),
            job.quality.to_string(),
            job.dst.display().to_string(),
        ]
    }

    /// Execute a binary and return its output
    async fn exec(&self, bin: &str, args: &[String]) -> MillResult<std::process::Output> {
        debug!("Executing: {} {:?}", bin, args);

        Command::new(bin)
            .args(args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| MillError::command_failed(format!("{} {:?}", bin, args), e))
    }

    /// Run a convert invocation, mapping failure to `TransformFailed`
    async fn run_convert(&self, operation: &str, args: Vec<String>) -> MillResult<()> {
        let output = self.exec(&self.convert_bin, &args).await?;

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(MillError::transform_failed(operation, stderr.trim()))
        }
    }

    fn parse_info(stdout: &str, path: &Path) -> MillResult<ImageInfo> {
        let mut lines = stdout.lines();
        let mut next = |field: &str| {
            lines.next().ok_or_else(|| MillError::IdentifyFailed {
                path: path.to_path_buf(),
                reason: format!("missing {} in identify output", field),
            })
        };

        let kind = next("type")?.to_string();
        let depth = parse_numeric(next("depth")?, "depth", path)?;
        let width = parse_numeric(next("width")?, "width", path)?;
        let height = parse_numeric(next("height")?, "height", path)?;
        let size = parse_size(next("size")?, path)?;
        let name = next("name")?.to_string();

        Ok(ImageInfo {
            kind,
            depth,
            width,
            height,
            size,
            name,
        })
    }
}

#[async_trait]
impl ImageEngine for ImageMagick {
    async fn resize(&self, job: &ConvertJob) -> MillResult<()> {
        self.run_convert("resize", Self::resize_args(job, false))
            .await
    }

    async fn crop(&self, job: &ConvertJob) -> MillResult<()> {
        self.run_convert("crop", Self::crop_args(job)).await
    }

    async fn stretch(&self, job: &ConvertJob) -> MillResult<()> {
        self.run_convert("stretch", Self::resize_args(job, true))
            .await
    }

    async fn identify(&self, path: &Path, force: bool) -> MillResult<ImageInfo> {
        let args = vec![
            "-format".to_string(),
            IDENTIFY_FORMAT.to_string(),
            path.display().to_string(),
        ];
        let signature = format!("{} {}", self.identify_bin, args.join(" "));

        if !force {
            if let Some(info) = self.info_cache.get(&signature) {
                debug!("identify cache hit for {}", path.display());
                return Ok(info);
            }
        }

        let output = self.exec(&self.identify_bin, &args).await?;
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() || stderr.starts_with("identify:") {
            return Err(MillError::IdentifyFailed {
                path: path.to_path_buf(),
                reason: stderr.trim().to_string(),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        if stdout.is_empty() {
            return Err(MillError::IdentifyFailed {
                path: path.to_path_buf(),
                reason: "got empty output from identify".to_string(),
            });
        }

        let info = Self::parse_info(&stdout, path)?;
        self.info_cache.insert(signature, info.clone());
        Ok(info)
    }
}

fn parse_numeric(value: &str, field: &str, path: &Path) -> MillResult<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| MillError::IdentifyFailed {
            path: path.to_path_buf(),
            reason: format!("non-numeric {}: {:?}", field, value),
        })
}

/// Parse identify's `%b` file size, which carries a unit suffix
/// (`24943B`, `4.1KB`, `2MB`).
fn parse_size(value: &str, path: &Path) -> MillResult<u64> {
    let value = value.trim();
    let split = value
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(value.len());
    let (number, suffix) = value.split_at(split);

    let number: f64 = number.parse().map_err(|_| MillError::IdentifyFailed {
        path: path.to_path_buf(),
        reason: format!("unparseable size: {:?}", value),
    })?;

    let multiplier: f64 = match suffix {
        "" | "B" => 1.0,
        "KB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        _ => {
            return Err(MillError::IdentifyFailed {
                path: path.to_path_buf(),
                reason: format!("unknown size suffix: {:?}", suffix),
            })
        }
    };

    Ok((number * multiplier) as u64)
}
