//! imagemill - Caching image-transformation proxy
//!
//! CLI entry point that dispatches to subcommands.

use clap::Parser;
use console::style;
use imagemill::cli::{Cli, Commands};
use imagemill::config::{Config, ConfigManager};
use imagemill::error::MillResult;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> MillResult<()> {
    let cli = Cli::parse();

    // Completions don't need config loading
    if let Commands::Completions(args) = cli.command {
        return imagemill::cli::commands::completions(args);
    }

    // Load configuration
    let manager = if let Some(ref path) = cli.config {
        ConfigManager::with_path(path.clone())
    } else {
        ConfigManager::new()
    };
    let config = manager.load().await?;

    init_tracing(cli.verbose, &config);

    match cli.command {
        Commands::Serve(args) => imagemill::cli::commands::serve(args, &config).await,
        Commands::Transform(args) => imagemill::cli::commands::transform(args, &config).await,
        Commands::Config(args) => imagemill::cli::commands::config(args, &config, &manager).await,
        Commands::Completions(_) => unreachable!("handled before config loading"),
    }
}

/// Initialize logging: 0 = warn (or info with config verbose), 1 = info,
/// 2+ = debug
fn init_tracing(verbose: u8, config: &Config) {
    let filter = match verbose {
        0 if !config.general.verbose => EnvFilter::new("imagemill=warn"),
        0 | 1 => EnvFilter::new("imagemill=info,tower_http=info"),
        _ => EnvFilter::new("imagemill=debug,tower_http=debug"),
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    if config.general.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}
