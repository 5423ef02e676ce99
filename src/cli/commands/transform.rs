//! Transform command - one-shot fetch and transform

use crate::cache::CacheStore;
use crate::cli::args::TransformArgs;
use crate::config::Config;
use crate::error::{MillError, MillResult};
use crate::fetch::{normalize_url, Fetcher};
use crate::magick::{Gravity, ImageMagick};
use crate::transform::{Operation, TransformRequest, Transformer};
use std::path::Path;
use std::sync::Arc;

/// Execute the transform command: fetch, transform, print the cached path
/// and metadata as JSON
pub async fn execute(args: TransformArgs, config: &Config) -> MillResult<()> {
    let operation = Operation::parse(&args.operation)
        .ok_or_else(|| MillError::InvalidParams(format!("unknown operation: {}", args.operation)))?;
    let gravity = Gravity::parse(&args.gravity)
        .ok_or_else(|| MillError::InvalidParams(format!("unknown gravity: {}", args.gravity)))?;

    let cache_dir = args.cache_dir.unwrap_or_else(|| config.cache.dir.clone());
    let store = CacheStore::new(cache_dir);
    let engine = Arc::new(ImageMagick::new(&config.magick));
    let fetcher = Fetcher::new(store.clone(), &config.fetch)?;
    let transformer = Transformer::new(store, engine);

    let source = if args.local {
        fetcher.import(Path::new(&args.url), args.force).await?
    } else {
        fetcher.fetch(&normalize_url(&args.url), args.force).await?
    };

    let request = TransformRequest {
        operation,
        width: args.width,
        height: args.height,
        quality: args.quality,
        x: args.x,
        y: args.y,
        gravity,
    };

    let (path, info) = transformer.transform(&source, &request, args.force).await?;

    println!("{}", path.display());
    println!("{}", serde_json::to_string_pretty(&info)?);

    Ok(())
}
