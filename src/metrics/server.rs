//! HTTP server for the Prometheus scrape endpoint.

use crate::config::DEFAULT_PORT;
use crate::metrics::MetricStore;
use axum::{
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Errors that can occur during metrics server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Server(String),
}

/// Configuration for the metrics server.
#[derive(Debug, Clone)]
pub struct MetricsServerConfig {
    /// Address to bind the server to.
    pub bind_addr: SocketAddr,
}

impl Default for MetricsServerConfig {
    fn default() -> Self {
        Self::with_port(DEFAULT_PORT)
    }
}

impl MetricsServerConfig {
    /// Creates a config listening on all interfaces at `port`.
    pub fn with_port(port: u16) -> Self {
        Self {
            bind_addr: ([0, 0, 0, 0], port).into(),
        }
    }

    /// Creates a config for a specific address.
    pub fn with_addr(ip: IpAddr, port: u16) -> Self {
        Self {
            bind_addr: SocketAddr::new(ip, port),
        }
    }
}

/// HTTP server exposing the metric store.
///
/// Binding happens in [`MetricsServer::bind`] so that an unusable port is
/// reported before the poll loop starts.
pub struct MetricsServer {
    listener: TcpListener,
    store: Arc<MetricStore>,
}

impl MetricsServer {
    /// Binds the listening socket.
    pub async fn bind(
        config: &MetricsServerConfig,
        store: Arc<MetricStore>,
    ) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;

        Ok(Self { listener, store })
    }

    /// Address actually bound, useful when port 0 was requested.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::Server(e.to_string()))
    }

    /// Serves scrapes until the runtime shuts down.
    pub async fn run(self) -> Result<(), ServerError> {
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(%addr, "Metrics server listening");
        }

        axum::serve(self.listener, router(self.store))
            .await
            .map_err(|e| ServerError::Server(e.to_string()))
    }
}

/// Builds the scrape router.
pub fn router(store: Arc<MetricStore>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

/// Handler for the /metrics endpoint.
async fn metrics_handler(State(store): State<Arc<MetricStore>>) -> impl IntoResponse {
    match store.encode() {
        Ok(output) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            output,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {}", e),
        ),
    }
}

/// Handler for the /health endpoint.
async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
