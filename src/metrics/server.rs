//! HTTP exporter for the self-test outcome.
//!
//! `/metrics` serves the Prometheus registry. `/health` answers from the
//! published status cell rather than from the gauges: it stays 503 until
//! the self-test has published, and reports any failure flag as 503.

use crate::capture::OutputConfig;
use crate::metrics::MetricsRegistry;
use crate::selftest::{Status, StatusCell};
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tower_http::cors::CorsLayer;

const TEXT_FORMAT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Errors from the exporter.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The listening socket could not be opened.
    #[error("failed to bind exporter: {0}")]
    Bind(#[from] std::io::Error),

    /// The server stopped with an error.
    #[error("exporter stopped: {0}")]
    Server(String),
}

/// Where the exporter listens.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Socket address to bind.
    pub bind_addr: SocketAddr,
}

impl MetricsServerConfig {
    /// Listens on all interfaces at `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], port).into(),
        }
    }

    /// Exporter settings from the output section, `None` when port 0
    /// disables it.
    pub fn from_output(output: &OutputConfig) -> Option<Self> {
        (output.metrics_port != 0).then(|| Self::with_port(output.metrics_port))
    }
}

/// What the handlers read: the gauges and the published status.
pub struct MetricsState {
    registry: Arc<MetricsRegistry>,
    status: Arc<StatusCell>,
}

/// Prometheus and health exporter for one boot's self-test.
///
/// Can be started before the self-test runs; both handlers read
/// whatever has been published at request time.
pub struct MetricsServer {
    config: MetricsServerConfig,
    state: Arc<MetricsState>,
}

impl MetricsServer {
    /// Creates an exporter over a shared registry and status cell.
    pub fn new(
        config: MetricsServerConfig,
        registry: Arc<MetricsRegistry>,
        status: Arc<StatusCell>,
    ) -> Self {
        Self {
            config,
            state: Arc::new(MetricsState { registry, status }),
        }
    }

    /// Routes served by the exporter.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/health", get(health_handler))
            .layer(CorsLayer::permissive())
            .with_state(Arc::clone(&self.state))
    }

    /// Serves until the process exits.
    pub async fn run(self) -> Result<(), ServerError> {
        let app = self.router();
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        tracing::info!(addr = %self.config.bind_addr, "Metrics exporter listening");

        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Server(e.to_string()))
    }
}

async fn metrics_handler(State(state): State<Arc<MetricsState>>) -> impl IntoResponse {
    metrics_response(&state.registry)
}

async fn health_handler(State(state): State<Arc<MetricsState>>) -> impl IntoResponse {
    health_response(state.status.get())
}

fn metrics_response(registry: &MetricsRegistry) -> (StatusCode, [(&'static str, &'static str); 1], String) {
    match registry.encode() {
        Ok(output) => (StatusCode::OK, [("content-type", TEXT_FORMAT)], output),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        ),
    }
}

/// Healthy only once a passing status has been published.
fn health_response(status: Option<Status>) -> (StatusCode, String) {
    match status {
        Some(status) if status.is_ok() => (StatusCode::OK, "OK".to_string()),
        Some(status) => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("self-test failed: {} (flags {:#04b})", status, status.bits()),
        ),
        None => (StatusCode::SERVICE_UNAVAILABLE, "self-test pending".to_string()),
    }
}
