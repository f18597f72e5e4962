//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Wrap the application Router in the middleware chain
//! - Wire up each middleware according to config
//! - Expose the Prometheus scrape route
//! - Bind server to listener and serve until shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request},
    middleware,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::ServerConfig;
use crate::mimic::{mimic_middleware, Mimic};
use crate::observability::metrics;
use crate::security::cors::{cors_middleware, CorsState};
use crate::security::host::{host_middleware, HostAllowList};
use crate::security::rate_limit::{rate_limit_middleware, RateLimiterState};

/// Upper bound on the echoed request body.
const ECHO_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// HTTP server: an application router behind the middleware chain.
pub struct HttpServer {
    config: ServerConfig,
    mimic: Arc<Mimic>,
    app: Router,
    metrics: Option<PrometheusHandle>,
}

impl HttpServer {
    /// Create a new server around `app`.
    pub fn new(config: ServerConfig, mimic: Arc<Mimic>, app: Router) -> Self {
        Self {
            config,
            mimic,
            app,
            metrics: None,
        }
    }

    /// Serve the scrape endpoint from this recorder handle.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Build the Axum router with all middleware layers.
    ///
    /// Layers are added innermost first, so the final order seen by a
    /// request is trace, timeout, metrics, host, CORS, rate limit, mimic.
    #[allow(deprecated)]
    pub fn router(&self) -> Router {
        let config = &self.config;
        let mut router = self.app.clone();

        if let Some(handle) = &self.metrics {
            if config.observability.metrics_enabled {
                router = router.route(
                    &config.observability.metrics_path,
                    get(metrics::render_metrics).with_state(handle.clone()),
                );
            }
        }

        if config.mimic.enabled {
            router = router.layer(middleware::from_fn_with_state(
                self.mimic.clone(),
                mimic_middleware,
            ));
        }

        if config.rate_limit.enabled {
            let state = Arc::new(RateLimiterState::new(config.rate_limit.requests_per_second));
            router = router.layer(middleware::from_fn_with_state(state, rate_limit_middleware));
        }

        if config.cors.enabled {
            let state = Arc::new(CorsState::new(config.cors.origins.iter().cloned()));
            router = router.layer(middleware::from_fn_with_state(state, cors_middleware));
        }

        if config.host.enabled {
            let allow = Arc::new(HostAllowList::new(config.host.allowed.iter().cloned()));
            router = router.layer(middleware::from_fn_with_state(allow, host_middleware));
        }

        if config.observability.metrics_enabled {
            let scrape_path = metrics::ScrapePath(Arc::from(config.observability.metrics_path.as_str()));
            router = router.layer(middleware::from_fn_with_state(
                scrape_path,
                metrics::metrics_middleware,
            ));
        }

        router
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server until the shutdown broadcast fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            mimic = self.config.mimic.enabled,
            cors = self.config.cors.enabled,
            host = self.config.host.enabled,
            rate_limit = self.config.rate_limit.enabled,
            "HTTP server starting"
        );

        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Default application: echoes the request line and body back.
pub fn echo_app() -> Router {
    Router::new().fallback(echo_handler)
}

async fn echo_handler(request: Request<Body>) -> String {
    let client = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("anonymous")
        .to_string();
    metrics::client_inc(&client);

    let (parts, body) = request.into_parts();
    let body = axum::body::to_bytes(body, ECHO_BODY_LIMIT)
        .await
        .unwrap_or_default();

    format!(
        "{} {}\n{}",
        parts.method,
        parts.uri,
        String::from_utf8_lossy(&body)
    )
}
