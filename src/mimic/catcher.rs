//! Pluggable strategies that key, catch and render mocks.
//!
//! # Design Decisions
//! - Declared endpoints and live requests derive keys in the same format,
//!   so matching is a single exact string lookup
//! - Key derivation is pure; cache access goes through the `Mimic` context
//!   passed in by the caller

use std::fmt::Debug;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderName, HeaderValue, Response, StatusCode};

use crate::mimic::cache::Mimic;
use crate::mimic::endpoint::EndpointDefinition;
use crate::mimic::error::{MimicError, MimicResult};
use crate::mimic::form::RequestSignature;

/// Header appended to every rendered mock (`AnotherHeader: empty`).
/// Header names are case-insensitive and hyper emits them lower-cased.
pub const SENTINEL_HEADER_NAME: &str = "anotherheader";
pub const SENTINEL_HEADER_VALUE: &str = "empty";

/// Subject a lookup key is derived from.
#[derive(Debug, Clone, Copy)]
pub enum KeySubject<'a> {
    /// A declared endpoint, at load time.
    FromDefinition(&'a EndpointDefinition),
    /// An incoming request, at request time.
    FromRequest(&'a RequestSignature),
}

/// Strategy used by the mock engine.
///
/// `key_of` must produce identical keys for a definition and for the requests
/// it is meant to catch.
pub trait Catcher: Send + Sync + Debug {
    /// Derive the cache key for a subject.
    fn key_of(&self, subject: KeySubject<'_>) -> MimicResult<String>;

    /// Look the request up in the cache.
    fn catch(&self, request: &RequestSignature, mimic: &Mimic) -> Option<Arc<EndpointDefinition>> {
        let key = self.key_of(KeySubject::FromRequest(request)).ok()?;
        tracing::debug!(key = %key, "Mock lookup");
        mimic.get(&key).ok()
    }

    /// Write the endpoint's canned response into `dest`.
    fn render(&self, dest: &mut Response<Body>, endpoint: &EndpointDefinition) -> MimicResult<()>;
}

/// Default catcher: `"<METHOD> <uri> <params>"` keys, verbatim bodies.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCatcher;

impl Catcher for JsonCatcher {
    fn key_of(&self, subject: KeySubject<'_>) -> MimicResult<String> {
        Ok(match subject {
            KeySubject::FromDefinition(e) => format!("{} {} {}", e.method, e.uri, e.params),
            KeySubject::FromRequest(r) => {
                format!("{} {} {}", r.method, r.request_uri, r.encoded_form())
            }
        })
    }

    fn render(&self, dest: &mut Response<Body>, endpoint: &EndpointDefinition) -> MimicResult<()> {
        let response = endpoint.response.as_ref().ok_or_else(|| {
            MimicError::Render(format!(
                "endpoint {} {} declares no response",
                endpoint.method, endpoint.uri
            ))
        })?;

        let status = StatusCode::from_u16(response.status)
            .map_err(|e| MimicError::Render(format!("status {}: {}", response.status, e)))?;
        *dest.status_mut() = status;

        for (name, value) in response.headers.iter() {
            tracing::debug!(header = %name, value = %value, "Render header");
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| MimicError::Render(format!("header name {:?}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| MimicError::Render(format!("header value {:?}: {}", value, e)))?;
            dest.headers_mut().insert(name, value);
        }

        dest.headers_mut().insert(
            HeaderName::from_static(SENTINEL_HEADER_NAME),
            HeaderValue::from_static(SENTINEL_HEADER_VALUE),
        );

        *dest.body_mut() = Body::from(response.body.clone());
        Ok(())
    }
}

/// XML rendering placeholder. Keys like [`JsonCatcher`] so an index still
/// builds, but never catches and renders nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct XmlCatcher;

impl Catcher for XmlCatcher {
    fn key_of(&self, subject: KeySubject<'_>) -> MimicResult<String> {
        JsonCatcher.key_of(subject)
    }

    fn catch(&self, _request: &RequestSignature, _mimic: &Mimic) -> Option<Arc<EndpointDefinition>> {
        None
    }

    fn render(&self, _dest: &mut Response<Body>, _endpoint: &EndpointDefinition) -> MimicResult<()> {
        Ok(())
    }
}
