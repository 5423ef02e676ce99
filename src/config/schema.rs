//! Configuration schema for imagemill
//!
//! Configuration is stored at `~/.config/imagemill/config.toml`

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// HTTP server settings
    pub server: ServerConfig,

    /// On-disk cache settings
    pub cache: CacheConfig,

    /// Source fetching settings
    pub fetch: FetchConfig,

    /// ImageMagick settings
    pub magick: MagickConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Enable verbose logging
    pub verbose: bool,

    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_format: "text".to_string(),
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on
    pub listen: String,

    /// Optional leading path segment for all routes (e.g. "img" serves
    /// /img/resize instead of /resize)
    pub namespace: String,

    /// Cache-Control max-age for served images, in seconds
    pub cache_max_age: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8000".to_string(),
            namespace: String::new(),
            // 28 days
            cache_max_age: 2_419_200,
        }
    }
}

/// On-disk cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache root directory; fetched sources and derived variants live here
    pub dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join("imagemill"),
        }
    }
}

/// Source fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Hostname patterns allowed as image sources. `*` matches any run of
    /// characters, so "*.example.com" allows any subdomain. An empty list
    /// denies every host.
    pub allowed_hosts: Vec<String>,

    /// Request timeout in seconds. 0 disables the timeout, leaving a hung
    /// upstream to block only its own producer chain.
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: vec![],
            timeout_secs: 0,
        }
    }
}

/// ImageMagick configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MagickConfig {
    /// Path or name of the convert binary
    pub convert_bin: String,

    /// Path or name of the identify binary
    pub identify_bin: String,

    /// Maximum entries in the in-memory identify cache
    pub info_cache_entries: u64,
}

impl Default for MagickConfig {
    fn default() -> Self {
        Self {
            convert_bin: "convert".to_string(),
            identify_bin: "identify".to_string(),
            info_cache_entries: 10_240,
        }
    }
}
