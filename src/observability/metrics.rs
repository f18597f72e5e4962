//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define request metrics (count, latency, errors)
//! - Expose Prometheus-compatible metrics endpoint
//! - Middleware that times every request
//!
//! # Metrics
//! - `proy_requests` (counter): requests by client label
//! - `proy_errors` (counter): errors by label
//! - `proy_duration_milliseconds` (summary): latency by `<path>-<METHOD>`
//!
//! # Design Decisions
//! - The scrape path itself is never instrumented
//! - Parameterised routes use the fixed-label middleware to keep cardinality low

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

pub const REQUESTS: &str = "proy_requests";
pub const ERRORS: &str = "proy_errors";
pub const DURATION: &str = "proy_duration_milliseconds";

/// Default scrape path.
pub const METRICS_PATH: &str = "/metrics";

/// State for [`metrics_middleware`]: the scrape path to leave untimed.
#[derive(Debug, Clone)]
pub struct ScrapePath(pub Arc<str>);

impl Default for ScrapePath {
    fn default() -> Self {
        Self(Arc::from(METRICS_PATH))
    }
}

/// State for [`custom_metrics_middleware`].
#[derive(Debug, Clone)]
pub struct FixedLabel {
    pub label: Arc<str>,
    pub scrape_path: ScrapePath,
}

impl FixedLabel {
    pub fn new(label: &str) -> Self {
        Self {
            label: Arc::from(label),
            scrape_path: ScrapePath::default(),
        }
    }
}

/// Install the global Prometheus recorder.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    metrics::describe_counter!(REQUESTS, "Number of petitions.");
    metrics::describe_counter!(ERRORS, "Errors count.");
    metrics::describe_histogram!(DURATION, "Duration in milliseconds.");
    Ok(handle)
}

/// Increment the request counter for a client label.
pub fn client_inc(label: &str) {
    metrics::counter!(REQUESTS, "clients" => label.to_string()).increment(1);
}

/// Increment the error counter for a label.
pub fn error_inc(label: &str) {
    metrics::counter!(ERRORS, "errors" => label.to_string()).increment(1);
}

/// Record the time elapsed since `start` under a label.
pub fn duration_obs(start: Instant, label: &str) {
    let millis = start.elapsed().as_secs_f64() * 1000.0;
    metrics::histogram!(DURATION, "duration" => label.to_string()).record(millis);
}

/// Label used by [`metrics_middleware`]: `<path>-<METHOD>`.
pub fn request_label(request: &Request<Body>) -> String {
    format!("{}-{}", request.uri().path(), request.method())
}

/// Time every request except the scrape endpoint.
pub async fn metrics_middleware(
    State(ScrapePath(scrape_path)): State<ScrapePath>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.uri().path() == &*scrape_path {
        return next.run(request).await;
    }

    let label = request_label(&request);
    let start = Instant::now();
    let response = next.run(request).await;
    duration_obs(start, &label);
    if response.status().is_server_error() {
        error_inc(&label);
    }
    response
}

/// Time every request under one fixed label, e.g. `/me/sizes` for
/// `/me/{id}/size/{size}`.
pub async fn custom_metrics_middleware(
    State(fixed): State<FixedLabel>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.uri().path() == &*fixed.scrape_path.0 {
        return next.run(request).await;
    }

    let start = Instant::now();
    let response = next.run(request).await;
    duration_obs(start, &fixed.label);
    response
}

/// Scrape handler.
pub async fn render_metrics(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}
