//! CORS origin matching.
//!
//! The first configured origin equal to the request's `Origin` header, or a
//! literal `*`, is echoed back in `Access-Control-Allow-Origin`. Any other
//! request is rejected before reaching the handler.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

/// Allowed origins for the CORS middleware.
#[derive(Debug, Clone)]
pub struct CorsState {
    origins: Vec<String>,
}

impl CorsState {
    pub fn new(origins: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            origins: origins
                .into_iter()
                .map(Into::into)
                .map(|o: String| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect(),
        }
    }

    /// Origins separated by commas, e.g. `"https://a.example,https://b.example"`.
    pub fn from_csv(origins: &str) -> Self {
        Self::new(origins.split(','))
    }

    /// The configured entry that admits `origin`, if any.
    fn admit(&self, origin: Option<&str>) -> Option<&str> {
        self.origins
            .iter()
            .find(|o| *o == "*" || Some(o.as_str()) == origin)
            .map(String::as_str)
    }
}

pub async fn cors_middleware(
    State(state): State<Arc<CorsState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok());

    let allowed = match state.admit(origin).map(HeaderValue::from_str) {
        Some(Ok(value)) => value,
        _ => {
            tracing::debug!(origin = ?origin, "Origin rejected");
            return (StatusCode::UNAUTHORIZED, "host not allowed").into_response();
        }
    };

    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, allowed);
    response
}
