//! CLI argument definitions using clap derive

use clap::{ArgAction, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// imagemill - caching image-transformation proxy
///
/// Fetches source images by URL, applies resize/crop/stretch operations via
/// ImageMagick, and persists every source and variant on disk.
#[derive(Parser, Debug)]
#[command(name = "imagemill")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Configuration file path
    #[arg(short, long, global = true, env = "IMAGEMILL_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP worker
    Serve(ServeArgs),

    /// Fetch and transform a single image from the command line
    Transform(TransformArgs),

    /// Show or initialize configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Arguments for the serve command
#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Listen address, overriding the configured one
    #[arg(short, long)]
    pub listen: Option<String>,

    /// Cache directory, overriding the configured one
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,
}

/// Arguments for the transform command
#[derive(Parser, Debug)]
pub struct TransformArgs {
    /// Source image URL (or local path with --local)
    pub url: String,

    /// Treat the source as a local file path
    #[arg(long)]
    pub local: bool,

    /// Operation to apply
    #[arg(short, long, default_value = "resize")]
    pub operation: String,

    /// Target width
    #[arg(short, long, default_value_t = 0)]
    pub width: u32,

    /// Target height
    #[arg(long, default_value_t = 0)]
    pub height: u32,

    /// JPEG quality (1-100)
    #[arg(short, long, default_value_t = 92)]
    pub quality: u8,

    /// Crop x offset
    #[arg(short, long, default_value_t = 0)]
    pub x: i32,

    /// Crop y offset
    #[arg(short, long, default_value_t = 0)]
    pub y: i32,

    /// Crop gravity anchor
    #[arg(short, long, default_value = "Center")]
    pub gravity: String,

    /// Re-fetch and re-transform even when cached
    #[arg(short, long)]
    pub force: bool,

    /// Cache directory, overriding the configured one
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,
}

/// Arguments for the config command
#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Action to perform
    #[command(subcommand)]
    pub action: Option<ConfigAction>,
}

/// Config subcommand actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Print the config file path
    Path,

    /// Write a default config file
    Init {
        /// Overwrite an existing config file
        #[arg(short, long)]
        force: bool,
    },
}

/// Arguments for the completions command
#[derive(Parser, Debug)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
