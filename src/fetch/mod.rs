//! Source acquisition into the cache
//!
//! Downloads remote images (or copies local files) into store entries keyed
//! by a hash of the source identifier. The claim protocol guarantees one
//! download per source no matter how many requests race for it.

use crate::cache::{source_key, CacheStore, Claim};
use crate::config::FetchConfig;
use crate::error::{MillError, MillResult};
use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Prepend `http://` to a scheme-less URL
pub fn normalize_url(url: &str) -> String {
    if url.contains("://") {
        url.to_string()
    } else {
        format!("http://{}", url)
    }
}

/// Fetches remote and local sources into the cache
pub struct Fetcher {
    store: CacheStore,
    client: reqwest::Client,
}

impl Fetcher {
    /// Create a fetcher over the given store
    pub fn new(store: CacheStore, config: &FetchConfig) -> MillResult<Self> {
        let mut builder = reqwest::Client::builder();
        if config.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| MillError::Internal(format!("building HTTP client: {}", e)))?;

        Ok(Self { store, client })
    }

    /// The store this fetcher writes into
    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Fetch a URL into the cache, returning the cached path.
    ///
    /// A Ready entry short-circuits the download unless `force` is set.
    /// Contention with another producer yields to the scheduler and retries
    /// the whole operation.
    pub async fn fetch(&self, url: &str, force: bool) -> MillResult<PathBuf> {
        let key = source_key(url);

        loop {
            match self.store.claim_or_read(&key, force) {
                Ok(claim @ Claim::Consumer(_)) => {
                    let path = claim.path().to_path_buf();
                    debug!("{} already downloaded, skipping", path.display());
                    claim.release();
                    return Ok(path);
                }
                Ok(claim @ Claim::Producer(_)) => {
                    let path = claim.path().to_path_buf();
                    let result = self.download(url, &path).await;
                    claim.publish();
                    return match result {
                        Ok(()) => {
                            info!("downloaded {} to {}", url, path.display());
                            Ok(path)
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

    /// Copy a local file into the cache, returning the cached path.
    ///
    /// The cache key is derived from the path string, so the same source
    /// path always lands in the same entry.
    pub async fn import(&self, source: &Path, force: bool) -> MillResult<PathBuf> {
        if !source.exists() {
            return Err(MillError::fetch_failed(
                source.display().to_string(),
                "path does not exist",
            ));
        }

        let key = source_key(&source.display().to_string());

        loop {
            match self.store.claim_or_read(&key, force) {
                Ok(claim @ Claim::Consumer(_)) => {
                    let path = claim.path().to_path_buf();
                    debug!("{} already in cache, skipping", path.display());
                    claim.release();
                    return Ok(path);
                }
                Ok(claim @ Claim::Producer(_)) => {
                    let path = claim.path().to_path_buf();
                    let result = tokio::fs::copy(source, &path).await;
                    claim.publish();
                    return match result {
                        Ok(_) => {
                            info!("copied {} to {}", source.display(), path.display());
                            Ok(path)
                        }
                        Err(e) => {
                            self.store.remove_partial(&path)?;
                            Err(MillError::fetch_failed(
                                source.display().to_string(),
                                e.to_string(),
                            ))
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

    /// Stream a URL's bytes into the destination file
    async fn download(&self, url: &str, dst: &Path) -> MillResult<()> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| MillError::fetch_failed(url, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(MillError::fetch_failed(url, format!("HTTP {}", status)));
        }

        // Truncates the claimed entry in place; the flock stays held by the
        // claim handle, which references the same inode.
        let mut file = tokio::fs::File::create(dst)
            .await
            .map_err(|e| MillError::io(format!("creating {}", dst.display()), e))?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| MillError::fetch_failed(url, e.to_string()))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| MillError::io(format!("writing {}", dst.display()), e))?;
        }

        file.flush()
            .await
            .map_err(|e| MillError::io(format!("flushing {}", dst.display()), e))
    }
}
