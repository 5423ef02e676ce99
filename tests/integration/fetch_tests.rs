//! Fetcher tests against a local mock HTTP server

use imagemill::cache::{source_key, CacheStore};
use imagemill::config::FetchConfig;
use imagemill::error::MillError;
use imagemill::fetch::Fetcher;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const IMAGE_BYTES: &[u8] = b"\xff\xd8\xff\xe0-not-really-a-jpeg";

fn fetcher() -> (Fetcher, CacheStore, TempDir) {
    let temp = TempDir::new().unwrap();
    let store = CacheStore::new(temp.path());
    let fetcher = Fetcher::new(store.clone(), &FetchConfig::default()).unwrap();
    (fetcher, store, temp)
}

#[tokio::test]
async fn fetch_downloads_into_sharded_entry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(IMAGE_BYTES))
        .expect(1)
        .mount(&server)
        .await;

    let (fetcher, store, _temp) = fetcher();
    let url = format!("{}/a.jpg", server.uri());

    let fetched = fetcher.fetch(&url, false).await.unwrap();
    assert_eq!(std::fs::read(&fetched).unwrap(), IMAGE_BYTES);

    let expected = store.entry_path(&source_key(&url)).unwrap();
    assert_eq!(fetched, expected);

    // Second fetch is served from the cache; expect(1) verifies on drop
    let again = fetcher.fetch(&url, false).await.unwrap();
    assert_eq!(again, fetched);
}

#[tokio::test]
async fn fetch_force_downloads_again() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(IMAGE_BYTES))
        .expect(2)
        .mount(&server)
        .await;

    let (fetcher, _store, _temp) = fetcher();
    let url = format!("{}/a.jpg", server.uri());

    fetcher.fetch(&url, false).await.unwrap();
    fetcher.fetch(&url, true).await.unwrap();
}

#[tokio::test]
async fn fetch_error_status_cleans_up() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.jpg"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (fetcher, store, _temp) = fetcher();
    let url = format!("{}/missing.jpg", server.uri());

    let err = fetcher.fetch(&url, false).await.unwrap_err();
    assert!(matches!(err, MillError::FetchFailed { .. }));

    let entry = store.entry_path(&source_key(&url)).unwrap();
    assert!(!entry.exists(), "partial entry must be cleaned up");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_fetches_download_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.jpg"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(IMAGE_BYTES)
                .set_delay(std::time::Duration::from_millis(20)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (fetcher, _store, _temp) = fetcher();
    let fetcher = Arc::new(fetcher);
    let url = format!("{}/a.jpg", server.uri());

    let mut handles = Vec::new();
    for _ in 0..4 {
        let fetcher = fetcher.clone();
        let url = url.clone();
        handles.push(tokio::spawn(async move { fetcher.fetch(&url, false).await }));
    }

    let mut paths = Vec::new();
    for handle in handles {
        paths.push(handle.await.unwrap().unwrap());
    }
    paths.dedup();
    assert_eq!(paths.len(), 1);
}

#[tokio::test]
async fn import_copies_local_file() {
    let source_dir = TempDir::new().unwrap();
    let source = source_dir.path().join("local.png");
    std::fs::write(&source, IMAGE_BYTES).unwrap();

    let (fetcher, _store, _temp) = fetcher();

    let imported = fetcher.import(&source, false).await.unwrap();
    assert_eq!(std::fs::read(&imported).unwrap(), IMAGE_BYTES);
    assert_ne!(imported, source);

    // Importing again hits the cached entry
    let again = fetcher.import(&source, false).await.unwrap();
    assert_eq!(again, imported);
}

#[tokio::test]
async fn import_missing_path_fails() {
    let (fetcher, _store, _temp) = fetcher();
    let err = fetcher
        .import(std::path::Path::new("/nonexistent/source.jpg"), false)
        .await
        .unwrap_err();
    assert!(matches!(err, MillError::FetchFailed { .. }));
}
