//! Serve command - run the HTTP worker

use crate::cli::args::ServeArgs;
use crate::config::Config;
use crate::error::MillResult;
use crate::server;
use tracing::info;

/// Execute the serve command
pub async fn execute(args: ServeArgs, config: &Config) -> MillResult<()> {
    let mut config = config.clone();

    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if let Some(dir) = args.cache_dir {
        config.cache.dir = dir;
    }

    info!(
        "Starting worker: cache at {}, {} allowed host pattern(s)",
        config.cache.dir.display(),
        config.fetch.allowed_hosts.len()
    );

    server::serve(config).await
}
