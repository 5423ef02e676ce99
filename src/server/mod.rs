//! HTTP surface
//!
//! Routes `/resize`, `/crop`, `/stretch`, and `/cache` (optionally under a
//! configured namespace prefix) through the fetch-and-transform pipeline
//! and serve the resulting file. GET and HEAD only; everything else is the
//! router's default 404/405 handling.

pub mod allowlist;

pub use allowlist::HostAllowlist;

use crate::cache::CacheStore;
use crate::config::Config;
use crate::error::{MillError, MillResult};
use crate::fetch::{normalize_url, Fetcher};
use crate::magick::{Gravity, ImageMagick};
use crate::transform::{Operation, TransformRequest, Transformer, DEFAULT_QUALITY};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared state for all handlers
#[derive(Clone)]
pub struct AppState {
    pub fetcher: Arc<Fetcher>,
    pub transformer: Arc<Transformer>,
    pub allowlist: Arc<HostAllowlist>,
    pub cache_max_age: u64,
}

/// Query parameters accepted by every transform route
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransformParams {
    pub url: Option<String>,
    pub w: Option<u32>,
    pub h: Option<u32>,
    pub q: Option<u8>,
    pub x: Option<i32>,
    pub y: Option<i32>,
    pub gravity: Option<String>,
    pub force: Option<bool>,
}

impl IntoResponse for MillError {
    fn into_response(self) -> Response {
        let status = match &self {
            MillError::InvalidParams(_) | MillError::MissingUrl => StatusCode::BAD_REQUEST,
            MillError::HostNotAllowed(_) => StatusCode::UNAUTHORIZED,
            MillError::FetchFailed { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Build the application router
pub fn router(state: AppState, namespace: &str) -> Router {
    let routes = Router::new()
        .route("/resize", get(resize_handler))
        .route("/crop", get(crop_handler))
        .route("/stretch", get(stretch_handler))
        .route("/cache", get(cache_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let namespace = namespace.trim_matches('/');
    if namespace.is_empty() {
        routes
    } else {
        Router::new().nest(&format!("/{}", namespace), routes)
    }
}

async fn resize_handler(
    State(state): State<AppState>,
    Query(params): Query<TransformParams>,
) -> Result<Response, MillError> {
    process(state, Operation::Resize, params).await
}

async fn crop_handler(
    State(state): State<AppState>,
    Query(params): Query<TransformParams>,
) -> Result<Response, MillError> {
    process(state, Operation::Crop, params).await
}

async fn stretch_handler(
    State(state): State<AppState>,
    Query(params): Query<TransformParams>,
) -> Result<Response, MillError> {
    process(state, Operation::Stretch, params).await
}

async fn cache_handler(
    State(state): State<AppState>,
    Query(params): Query<TransformParams>,
) -> Result<Response, MillError> {
    process(state, Operation::Cache, params).await
}

/// Map query parameters onto a transform request
fn build_request(operation: Operation, params: &TransformParams) -> MillResult<TransformRequest> {
    let gravity = match params.gravity.as_deref() {
        Some(g) => Gravity::parse(g)
            .ok_or_else(|| MillError::InvalidParams(format!("unknown gravity: {}", g)))?,
        None => Gravity::Center,
    };

    Ok(TransformRequest {
        operation,
        width: params.w.unwrap_or(0),
        height: params.h.unwrap_or(0),
        quality: params.q.unwrap_or(DEFAULT_QUALITY),
        x: params.x.unwrap_or(0),
        y: params.y.unwrap_or(0),
        gravity,
    })
}

/// Run one request through the pipeline and serve the resulting file
async fn process(
    state: AppState,
    operation: Operation,
    params: TransformParams,
) -> Result<Response, MillError> {
    let url = params.url.clone().ok_or(MillError::MissingUrl)?;
    let url = normalize_url(&url);

    let parsed = reqwest::Url::parse(&url)
        .map_err(|e| MillError::InvalidParams(format!("invalid url: {}", e)))?;
    let host = parsed.host_str().unwrap_or("");
    if !state.allowlist.is_allowed(host) {
        warn!("hostname {} is not allowed", host);
        return Err(MillError::HostNotAllowed(host.to_string()));
    }

    let request = build_request(operation, &params)?;
    // Validate before touching the filesystem or the network
    let request = request.validated()?;

    let force = params.force.unwrap_or(false);
    if force {
        debug!("forced request, ignoring cached entries for {}", url);
    }

    let source = state.fetcher.fetch(&url, force).await?;
    let (path, info) = state.transformer.transform(&source, &request, force).await?;

    debug!(
        kind = %info.kind,
        width = info.width,
        height = info.height,
        size = info.size,
        "serving {}",
        path.display()
    );

    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| MillError::io(format!("reading {}", path.display()), e))?;

    let headers = [
        (
            header::CONTENT_TYPE,
            format!("image/{}", info.kind.to_lowercase()),
        ),
        (
            header::CACHE_CONTROL,
            format!("max-age={}", state.cache_max_age),
        ),
    ];

    Ok((headers, bytes).into_response())
}

/// Run the HTTP server until a shutdown signal arrives
pub async fn serve(config: Config) -> MillResult<()> {
    let store = CacheStore::new(config.cache.dir.clone());
    let engine = Arc::new(ImageMagick::new(&config.magick));
    let fetcher = Fetcher::new(store.clone(), &config.fetch)?;
    let transformer = Transformer::new(store, engine);

    let state = AppState {
        fetcher: Arc::new(fetcher),
        transformer: Arc::new(transformer),
        allowlist: Arc::new(HostAllowlist::new(config.fetch.allowed_hosts.clone())),
        cache_max_age: config.server.cache_max_age,
    };

    let app = router(state, &config.server.namespace);

    let addr: SocketAddr = config.server.listen.parse().map_err(|e| MillError::AddrInvalid {
        addr: config.server.listen.clone(),
        reason: format!("{}", e),
    })?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| MillError::io(format!("binding {}", addr), e))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| MillError::io("serving HTTP", e))
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
