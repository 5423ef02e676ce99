//! Pipeline tests against a scripted engine
//!
//! The engine is substituted so no ImageMagick process is spawned; the
//! tests exercise claim coordination, caching, force semantics, and
//! failure cleanup.

use async_trait::async_trait;
use imagemill::cache::CacheStore;
use imagemill::error::{MillError, MillResult};
use imagemill::magick::{ConvertJob, ImageEngine, ImageInfo};
use imagemill::transform::{Operation, TransformRequest, Transformer};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Engine that writes a marker file and counts its invocations
struct CountingEngine {
    convert_calls: AtomicUsize,
    identify_calls: AtomicUsize,
    fail_convert: bool,
}

impl CountingEngine {
    fn new() -> Self {
        Self {
            convert_calls: AtomicUsize::new(0),
            identify_calls: AtomicUsize::new(0),
            fail_convert: false,
        }
    }

    fn failing() -> Self {
        Self {
            fail_convert: true,
            ..Self::new()
        }
    }

    fn conversions(&self) -> usize {
        self.convert_calls.load(Ordering::SeqCst)
    }

    async fn convert(&self, job: &ConvertJob) -> MillResult<()> {
        self.convert_calls.fetch_add(1, Ordering::SeqCst);
        // Give racing claimants a window to contend
        tokio::time::sleep(Duration::from_millis(20)).await;

        if self.fail_convert {
            return Err(MillError::transform_failed("resize", "simulated failure"));
        }

        tokio::fs::write(&job.dst, b"derived-image-bytes")
            .await
            .map_err(|e| MillError::io("writing derived file", e))?;
        Ok(())
    }
}

#[async_trait]
impl ImageEngine for CountingEngine {
    async fn resize(&self, job: &ConvertJob) -> MillResult<()> {
        self.convert(job).await
    }

    async fn crop(&self, job: &ConvertJob) -> MillResult<()> {
        self.convert(job).await
    }

    async fn stretch(&self, job: &ConvertJob) -> MillResult<()> {
        self.convert(job).await
    }

    async fn identify(&self, path: &Path, _force: bool) -> MillResult<ImageInfo> {
        self.identify_calls.fetch_add(1, Ordering::SeqCst);

        let len = tokio::fs::metadata(path)
            .await
            .map_err(|e| MillError::IdentifyFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?
            .len();
        if len == 0 {
            return Err(MillError::IdentifyFailed {
                path: path.to_path_buf(),
                reason: "empty file".to_string(),
            });
        }

        Ok(ImageInfo {
            kind: "JPEG".to_string(),
            depth: 8,
            width: 100,
            height: 50,
            size: len,
            name: path
                .file_name()
                .map(|f| f.to_string_lossy().into_owned())
                .unwrap_or_default(),
        })
    }
}

struct Harness {
    store: CacheStore,
    engine: Arc<CountingEngine>,
    transformer: Arc<Transformer>,
    source: std::path::PathBuf,
    _cache_dir: TempDir,
    _source_dir: TempDir,
}

fn harness(engine: CountingEngine) -> Harness {
    let cache_dir = TempDir::new().unwrap();
    let source_dir = TempDir::new().unwrap();

    let source = source_dir.path().join("a123face");
    std::fs::write(&source, b"source-image-bytes").unwrap();

    let store = CacheStore::new(cache_dir.path());
    let engine = Arc::new(engine);
    let transformer = Arc::new(Transformer::new(
        store.clone(),
        engine.clone() as Arc<dyn ImageEngine>,
    ));

    Harness {
        store,
        engine,
        transformer,
        source,
        _cache_dir: cache_dir,
        _source_dir: source_dir,
    }
}

fn resize_request(width: u32) -> TransformRequest {
    let mut request = TransformRequest::new(Operation::Resize);
    request.width = width;
    request
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_identical_requests_convert_once() {
    let h = harness(CountingEngine::new());
    let request = resize_request(100);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let transformer = h.transformer.clone();
        let source = h.source.clone();
        let request = request.clone();
        handles.push(tokio::spawn(async move {
            transformer.transform(&source, &request, false).await
        }));
    }

    let mut paths = Vec::new();
    for handle in handles {
        let (path, info) = handle.await.unwrap().unwrap();
        assert_eq!(info.kind, "JPEG");
        paths.push(path);
    }

    paths.dedup();
    assert_eq!(paths.len(), 1, "all callers must receive the same path");
    assert_eq!(h.engine.conversions(), 1, "engine must be invoked exactly once");
}

#[tokio::test]
async fn repeat_request_served_from_cache() {
    let h = harness(CountingEngine::new());
    let request = resize_request(100);

    let (first, _) = h.transformer.transform(&h.source, &request, false).await.unwrap();
    let (second, _) = h.transformer.transform(&h.source, &request, false).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.engine.conversions(), 1);
}

#[tokio::test]
async fn distinct_params_produce_distinct_entries() {
    let h = harness(CountingEngine::new());

    let (small, _) = h
        .transformer
        .transform(&h.source, &resize_request(100), false)
        .await
        .unwrap();
    let (large, _) = h
        .transformer
        .transform(&h.source, &resize_request(200), false)
        .await
        .unwrap();

    assert_ne!(small, large);
    assert_eq!(h.engine.conversions(), 2);
}

#[tokio::test]
async fn force_reconverts_ready_entry() {
    let h = harness(CountingEngine::new());
    let request = resize_request(100);

    h.transformer.transform(&h.source, &request, false).await.unwrap();
    assert_eq!(h.engine.conversions(), 1);

    h.transformer.transform(&h.source, &request, true).await.unwrap();
    assert_eq!(h.engine.conversions(), 2);
}

#[tokio::test]
async fn failed_conversion_leaves_no_file() {
    let h = harness(CountingEngine::failing());
    let request = resize_request(100);

    let err = h
        .transformer
        .transform(&h.source, &request, false)
        .await
        .unwrap_err();
    assert!(matches!(err, MillError::TransformFailed { .. }));

    let key = request.validated().unwrap().cache_key(&h.source).unwrap();
    let derived = h.store.entry_path(&key).unwrap();
    assert!(!derived.exists(), "partial entry must be cleaned up");

    // The source entry is untouched
    assert!(h.source.exists());
}

#[tokio::test]
async fn retry_after_failure_can_succeed() {
    let h = harness(CountingEngine::failing());
    let request = resize_request(100);

    h.transformer
        .transform(&h.source, &request, false)
        .await
        .unwrap_err();

    // A fresh attempt with a working engine claims the now-missing entry
    let engine = Arc::new(CountingEngine::new());
    let transformer = Transformer::new(h.store.clone(), engine.clone() as Arc<dyn ImageEngine>);
    let (path, _) = transformer.transform(&h.source, &request, false).await.unwrap();
    assert!(path.exists());
    assert_eq!(engine.conversions(), 1);
}

#[tokio::test]
async fn invalid_params_touch_nothing() {
    let h = harness(CountingEngine::new());
    let request = TransformRequest::new(Operation::Stretch); // both dims missing

    let err = h
        .transformer
        .transform(&h.source, &request, false)
        .await
        .unwrap_err();
    assert!(matches!(err, MillError::InvalidParams(_)));
    assert_eq!(h.engine.conversions(), 0);

    // No entries were created under the cache root
    let mut entries = std::fs::read_dir(h.store.root()).unwrap();
    assert!(entries.next().is_none());
}

#[tokio::test]
async fn cache_operation_returns_source() {
    let h = harness(CountingEngine::new());
    let request = TransformRequest::new(Operation::Cache);

    let (path, info) = h
        .transformer
        .transform(&h.source, &request, false)
        .await
        .unwrap();
    assert_eq!(path, h.source);
    assert_eq!(info.size, b"source-image-bytes".len() as u64);
    assert_eq!(h.engine.conversions(), 0);
}

#[tokio::test]
async fn unrecognizable_cached_source_is_removed() {
    let h = harness(CountingEngine::new());
    let request = TransformRequest::new(Operation::Cache);

    // Truncate the source so identify rejects it
    std::fs::write(&h.source, b"").unwrap();

    let err = h
        .transformer
        .transform(&h.source, &request, false)
        .await
        .unwrap_err();
    assert!(matches!(err, MillError::IdentifyFailed { .. }));
    assert!(!h.source.exists(), "unrecognizable files are not kept");
}
