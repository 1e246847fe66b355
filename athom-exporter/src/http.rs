//! HTTP server for the scrape endpoint.

use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use axum::extract::{ConnectInfo, OriginalUri, Query, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::timeout::TimeoutLayer;
use tracing::info;

use crate::collector::SharedCollector;

/// Content type of the exposition format.
pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    collector: SharedCollector,
}

/// First `target` value of a scrape query string.
///
/// Repeated parameters are allowed; later values are ignored.
fn target_param(params: &[(String, String)]) -> Option<&str> {
    params
        .iter()
        .find(|(key, _)| key == "target")
        .map(|(_, value)| value.as_str())
}

/// Create the HTTP router.
fn create_router(
    collector: SharedCollector,
    metrics_path: &str,
    request_timeout: Duration,
) -> Router {
    let state = AppState { collector };

    Router::new()
        .route(metrics_path, get(metrics_handler))
        .route("/health", get(health_handler))
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

/// Handler for the metrics endpoint.
async fn metrics_handler(
    State(state): State<AppState>,
    client: Option<ConnectInfo<SocketAddr>>,
    method: Method,
    OriginalUri(uri): OriginalUri,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let client = client
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    info!(
        client = %client,
        method = %method,
        path = %uri.path(),
        query = uri.query().unwrap_or(""),
        "Received scrape request"
    );

    let target = target_param(&params).unwrap_or_default();
    let body = match state.collector.collect(target).await {
        Ok(body) => body,
        Err(e) => {
            info!(client = %client, status = %e.status_code(), error = %e, "Scrape failed");
            return e.into_response();
        }
    };

    // Write failures after this point are only visible at axum's trace level.
    info!(client = %client, target = %target, "Scrape complete, sending metrics");

    (
        StatusCode::OK,
        [("content-type", METRICS_CONTENT_TYPE)],
        body,
    )
        .into_response()
}

/// Handler for the /health endpoint.
async fn health_handler() -> Response {
    (StatusCode::OK, "healthy\n").into_response()
}

/// HTTP server configuration.
pub struct HttpServer {
    collector: SharedCollector,
    listen_addr: SocketAddr,
    metrics_path: String,
    request_timeout: Duration,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(
        collector: SharedCollector,
        listen_addr: SocketAddr,
        metrics_path: String,
        request_timeout: Duration,
    ) -> Self {
        Self {
            collector,
            listen_addr,
            metrics_path,
            request_timeout,
        }
    }

    /// Bind the listen address and serve until the shutdown signal is received.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
        let listener = TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.listen_addr, e))?;

        self.run_with_listener(listener, shutdown).await
    }

    /// Serve on an already bound listener until the shutdown signal is received.
    pub async fn run_with_listener(
        self,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) -> anyhow::Result<()> {
        let addr = listener.local_addr()?;
        let router = create_router(self.collector, &self.metrics_path, self.request_timeout);

        info!(
            addr = %addr,
            path = %self.metrics_path,
            "HTTP server listening"
        );

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            loop {
                if shutdown.changed().await.is_err() {
                    break;
                }
                if *shutdown.borrow() {
                    break;
                }
            }
            info!("HTTP server shutting down");
        })
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server error: {}", e))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
