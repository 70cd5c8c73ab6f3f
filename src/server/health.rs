//! HTTP endpoints
//!
//! - `/drain-delay` - Hold the caller until its IP has drained
//! - `/health`, `/healthz` - Liveness: Is the process alive?
//! - `/readyz` - Readiness: Are the clients built and the server not shutting down?
//! - `/metrics` - Prometheus metrics in text format

use crate::drain::DrainResolver;
use crate::server::metrics::SharedMetrics;
use crate::server::shutdown::ShutdownSignal;
use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Shared state for readiness tracking
///
/// Set to ready once the cluster and load balancer clients are built;
/// set back to not ready when shutdown begins.
#[derive(Debug, Clone)]
pub struct ReadinessState {
    ready: Arc<AtomicBool>,
}

impl ReadinessState {
    /// Create a new readiness state (initially not ready)
    pub fn new() -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::SeqCst);
    }

    /// Mark as not ready (e.g., during shutdown)
    pub fn set_not_ready(&self) {
        self.ready.store(false, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }
}

impl Default for ReadinessState {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared by every handler
#[derive(Clone)]
pub struct ServerState {
    pub(crate) resolver: Arc<DrainResolver>,
    pub(crate) readiness: ReadinessState,
    pub(crate) metrics: SharedMetrics,
}

impl ServerState {
    pub fn new(
        resolver: Arc<DrainResolver>,
        readiness: ReadinessState,
        metrics: SharedMetrics,
    ) -> Self {
        Self {
            resolver,
            readiness,
            metrics,
        }
    }
}

/// Liveness probe handler
///
/// Always returns 200 OK - if this responds, the process is alive.
async fn healthz() -> (StatusCode, &'static str) {
    (StatusCode::OK, "OK")
}

/// Readiness probe handler
///
/// Returns 200 OK if ready, 503 Service Unavailable if not.
async fn readyz(State(state): State<ServerState>) -> StatusCode {
    if state.readiness.is_ready() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// Prometheus metrics handler
async fn metrics(State(state): State<ServerState>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to encode metrics: {}", e),
        )
            .into_response(),
    }
}

pub fn build_router(state: ServerState) -> Router {
    Router::new()
        .route("/drain-delay", get(super::gateway::handle_drain_delay))
        .route("/health", get(healthz))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(self::metrics))
        .with_state(state)
}

/// Bind the listener for `run_server` on all interfaces
pub async fn bind(port: u16) -> Result<TcpListener, std::io::Error> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr).await
}

/// Serve all endpoints on `listener` until `shutdown` fires
///
/// After shutdown no new connections are accepted; requests already in
/// progress, including drain waits, run to completion.
pub async fn run_server(
    listener: TcpListener,
    state: ServerState,
    mut shutdown: ShutdownSignal,
) -> Result<(), std::io::Error> {
    let app = build_router(state);

    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Drain delay server listening (HTTP)");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await
}
