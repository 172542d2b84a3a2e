//! Common test utilities: an in-process fake backend node.
//!
//! Serves the three RPCs the gateway uses on an ephemeral port, counts
//! calls, and can be slowed down (to widen coalescing windows) or poisoned
//! (any uploaded file whose name contains "poison" is refused with a 500).

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct BackendState {
    hash: String,
    delay: Duration,
    fail_places: bool,
    adds: Arc<AtomicUsize>,
    places: Arc<AtomicUsize>,
}

/// A fake backend node on an ephemeral port, shut down on drop.
pub struct FakeBackend {
    pub url: String,
    adds: Arc<AtomicUsize>,
    places: Arc<AtomicUsize>,
    shutdown: CancellationToken,
}

impl FakeBackend {
    /// Start a backend answering every add with `Qm123`, without delay.
    pub async fn start() -> Self {
        Self::start_with("Qm123", Duration::ZERO).await
    }

    /// Start a backend answering every add with `hash` after `delay`.
    pub async fn start_with(hash: &str, delay: Duration) -> Self {
        Self::start_inner(hash, delay, false).await
    }

    /// Start a backend that refuses `files/*` calls with a 500.
    pub async fn start_refusing_places(hash: &str) -> Self {
        Self::start_inner(hash, Duration::ZERO, true).await
    }

    async fn start_inner(hash: &str, delay: Duration, fail_places: bool) -> Self {
        let adds = Arc::new(AtomicUsize::new(0));
        let places = Arc::new(AtomicUsize::new(0));
        let state = BackendState {
            hash: hash.to_string(),
            delay,
            fail_places,
            adds: Arc::clone(&adds),
            places: Arc::clone(&places),
        };

        let app = Router::new()
            .route("/api/v0/add", post(handle_add))
            .route("/api/v0/files/mkdir", post(handle_files))
            .route("/api/v0/files/cp", post(handle_files))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { token.cancelled().await })
                .await
                .ok();
        });

        Self {
            url: format!("http://{}", addr),
            adds,
            places,
            shutdown,
        }
    }

    /// Number of `/api/v0/add` calls observed (including refused ones).
    pub fn add_calls(&self) -> usize {
        self.adds.load(Ordering::SeqCst)
    }

    /// Number of `files/mkdir` + `files/cp` calls observed.
    pub fn place_calls(&self) -> usize {
        self.places.load(Ordering::SeqCst)
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn handle_add(State(state): State<BackendState>, mut multipart: Multipart) -> Response {
    let mut file_name = String::new();
    while let Ok(Some(field)) = multipart.next_field().await {
        if let Some(name) = field.file_name() {
            file_name = name.to_string();
        }
        let _ = field.bytes().await;
    }

    state.adds.fetch_add(1, Ordering::SeqCst);
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }

    if file_name.contains("poison") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "poisoned file refused").into_response();
    }

    Json(serde_json::json!({
        "Name": file_name,
        "Hash": state.hash,
        "Size": "1",
    }))
    .into_response()
}

async fn handle_files(State(state): State<BackendState>) -> Response {
    state.places.fetch_add(1, Ordering::SeqCst);
    if state.fail_places {
        return (StatusCode::FORBIDDEN, "files API disabled").into_response();
    }
    Json(serde_json::json!({})).into_response()
}
