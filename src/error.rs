//! Error types for imagemill
//!
//! All modules use `MillResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for imagemill operations
pub type MillResult<T> = Result<T, MillError>;

/// All errors that can occur in imagemill
#[derive(Error, Debug)]
pub enum MillError {
    // Request errors
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("Missing required \"url\" parameter")]
    MissingUrl,

    #[error("Host not allowed: {0}")]
    HostNotAllowed(String),

    // Pipeline errors
    #[error("Failed to fetch {url}: {reason}")]
    FetchFailed { url: String, reason: String },

    #[error("Transform {operation} failed: {reason}")]
    TransformFailed { operation: String, reason: String },

    #[error("Failed to identify {path}: {reason}")]
    IdentifyFailed { path: PathBuf, reason: String },

    /// Internal signal: the entry is claimed by another producer.
    /// Drives the cooperative retry loop; never surfaced to requesters.
    #[error("Cache entry is locked by another producer")]
    LockContended,

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid listen address {addr}: {reason}")]
    AddrInvalid { addr: String, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Process errors
    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MillError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Create a fetch error for a URL
    pub fn fetch_failed(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::FetchFailed {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Create a transform error for an operation
    pub fn transform_failed(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TransformFailed {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error is a caller mistake rather than a server fault
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidParams(_) | Self::MissingUrl | Self::HostNotAllowed(_)
        )
    }
}
