//! Interception middleware.
//!
//! Install with `axum::middleware::from_fn_with_state(mimic, mimic_middleware)`.
//! A matched request is answered from the mock and never reaches the wrapped
//! handler; everything else passes through untouched.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::mimic::cache::Mimic;

pub async fn mimic_middleware(
    State(mimic): State<Arc<Mimic>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let (request, found) = mimic.match_request(request).await;

    let Some(endpoint) = found else {
        return next.run(request).await;
    };

    let mut response = Response::new(Body::empty());
    if let Err(e) = mimic.render(&mut response, &endpoint) {
        // Best effort: whatever was written before the failure is sent.
        tracing::error!(
            method = %endpoint.method,
            uri = %endpoint.uri,
            error = %e,
            "Mock render failed"
        );
    } else {
        tracing::debug!(method = %endpoint.method, uri = %endpoint.uri, "Served mock");
    }
    response
}
