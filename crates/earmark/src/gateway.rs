//! HTTP-facing decision layer.
//!
//! Every request resolves to a file under the serving root and ends in one
//! of three ways: a permanent redirect to the file's content identifier
//! (stamped already, or ingested right now), a 404 (no such file, or not a
//! regular file), or a 500 carrying the ingestion error text. Hits get the
//! long-lived cache-control value, everything else the short-lived one.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use caslink::ContentId;
use pathmark::{CacheState, PathCache};
use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::ingest::{IngestError, Ingestor};
use crate::resolve;

/// Response header exposing the resolved retrieval path.
pub const CONTENT_PATH_HEADER: &str = "x-content-path";

/// Shared state for gateway handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub config: Arc<GatewayConfig>,
    pub cache: Arc<dyn PathCache>,
    pub ingestor: Arc<Ingestor>,
    /// Parent of per-request cancellation tokens; canceling it drains the
    /// gateway.
    pub shutdown: CancellationToken,
    pub started: Instant,
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .fallback(serve_path)
        .with_state(state)
}

/// Health endpoint for load balancers and humans.
async fn handle_health(State(state): State<GatewayState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.started.elapsed().as_secs(),
    }))
}

/// The file-serving path: any method, any path.
async fn serve_path(State(state): State<GatewayState>, uri: Uri, headers: HeaderMap) -> Response {
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let path = resolve::resolve(&state.config.base_dir, host, uri.path());

    match state.cache.lookup(&path) {
        Ok(CacheState::Present(id)) => redirect(&state, &id),
        Ok(CacheState::Missing) => not_found(&state),
        Ok(CacheState::Absent) => ingest_then_redirect(&state, path).await,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "stamp lookup failed");
            upstream_error(&state, e.to_string())
        }
    }
}

/// One ingestion attempt, bound to this request's lifetime. No retries
/// here: a client retry gets a fresh attempt, coalesced by the ingestor.
async fn ingest_then_redirect(state: &GatewayState, path: std::path::PathBuf) -> Response {
    let cancel = state.shutdown.child_token();
    match state.ingestor.ingest(path.clone(), cancel).await {
        Ok(id) => redirect(state, &id),
        Err(IngestError::NotFound { .. } | IngestError::NotRegular { .. }) => not_found(state),
        Err(IngestError::Stamp { id, reason, .. }) => {
            // The identifier is good even though the stamp is not: answer
            // this request with it and leave the path unstamped so a later
            // request re-ingests.
            tracing::warn!(
                path = %path.display(),
                id = %id,
                reason = %reason,
                "stamp failed, serving identifier unstamped"
            );
            redirect(state, &id)
        }
        Err(e @ IngestError::Canceled { .. }) => {
            tracing::debug!(path = %path.display(), "ingestion canceled mid-request");
            upstream_error(state, e.to_string())
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ingestion failed");
            upstream_error(state, e.to_string())
        }
    }
}

fn redirect(state: &GatewayState, id: &ContentId) -> Response {
    let content_path = state.config.content_path(id);
    let location = format!("{}{}", state.config.base_url, content_path);
    let built = Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header(header::LOCATION, location.as_str())
        .header(header::CACHE_CONTROL, state.config.cache_hit.as_str())
        .header(CONTENT_PATH_HEADER, content_path.as_str())
        .body(Body::empty());
    finish(built)
}

fn not_found(state: &GatewayState) -> Response {
    plain(state, StatusCode::NOT_FOUND, "404 page not found\n".to_string())
}

fn upstream_error(state: &GatewayState, detail: String) -> Response {
    plain(state, StatusCode::INTERNAL_SERVER_ERROR, format!("{detail}\n"))
}

fn plain(state: &GatewayState, status: StatusCode, body: String) -> Response {
    let built = Response::builder()
        .status(status)
        .header(header::CACHE_CONTROL, state.config.cache_miss.as_str())
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(body));
    finish(built)
}

fn finish(built: Result<Response, axum::http::Error>) -> Response {
    match built {
        Ok(response) => response,
        Err(e) => {
            // Only reachable with header values the builder rejects, e.g. a
            // configured cache-control containing control characters.
            tracing::error!(error = %e, "failed to build response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
