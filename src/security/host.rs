//! Host allow-listing.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Hosts allowed to reach the wrapped handler.
#[derive(Debug, Clone)]
pub struct HostAllowList {
    hosts: Vec<String>,
}

impl HostAllowList {
    pub fn new(hosts: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            hosts: hosts.into_iter().map(Into::into).collect(),
        }
    }

    /// Hosts separated by commas, e.g. `"api.example:8080,localhost:8080"`.
    pub fn from_csv(hosts: &str) -> Self {
        Self::new(hosts.split(',').map(str::trim))
    }

    pub fn allows(&self, host: &str) -> bool {
        self.hosts.iter().any(|h| h == host)
    }
}

/// The request's host: the `Host` header, or the URI authority (HTTP/2).
fn request_host(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| request.uri().authority().map(|a| a.as_str()))
}

pub async fn host_middleware(
    State(allow): State<Arc<HostAllowList>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request_host(&request).is_some_and(|host| allow.allows(host)) {
        return next.run(request).await;
    }

    tracing::warn!(host = ?request_host(&request), "Host not allowed");
    (StatusCode::UNAUTHORIZED, "unauthorized access host").into_response()
}
