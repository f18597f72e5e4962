//! Request signatures: method, request URI and canonical form parameters.
//!
//! Form parameters come from the url-encoded body of POST, PUT and PATCH
//! requests followed by the query string. They are encoded with keys sorted
//! and each key's values in arrival order, so the same logical form always
//! yields the same string.

use std::collections::BTreeMap;

use axum::body::{Body, Bytes};
use futures_util::{future, StreamExt};
use axum::http::{header, Method, Request};

use crate::mimic::error::{MimicError, MimicResult};

/// Default cap on buffered form bodies.
pub const DEFAULT_MAX_FORM_BYTES: usize = 10 * 1024 * 1024;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// What the mock engine sees of an incoming request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestSignature {
    pub method: Method,
    /// Path and query as received.
    pub request_uri: String,
    /// Form values grouped by key, keys sorted.
    pub form: BTreeMap<String, Vec<String>>,
}

impl RequestSignature {
    /// Build a signature from already-known parts. The body is ignored.
    pub fn new(method: Method, request_uri: impl Into<String>) -> MimicResult<Self> {
        let request_uri = request_uri.into();
        let mut form = BTreeMap::new();
        if let Some((_, query)) = request_uri.split_once('?') {
            append_pairs(&mut form, query.as_bytes())?;
        }
        Ok(Self {
            method,
            request_uri,
            form,
        })
    }

    /// Canonical url-encoding of the form values.
    ///
    /// Only the RFC 3986 unreserved characters stay literal: `~` is kept and
    /// `*` is escaped, unlike the WHATWG set `form_urlencoded` follows.
    /// Spaces become `+`.
    pub fn encoded_form(&self) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (key, values) in &self.form {
            for value in values {
                serializer.append_pair(key, value);
            }
        }
        // Every `%` in the output starts an escape, so `%7E` can only be `~`.
        serializer.finish().replace("%7E", "~").replace('*', "%2A")
    }
}

/// Split a request into its signature, handing back an equivalent request.
///
/// The body is buffered only when it carries form parameters. On failure the
/// returned request still holds whatever body could be recovered.
pub async fn extract(
    request: Request<Body>,
    max_form_bytes: usize,
) -> (Request<Body>, MimicResult<RequestSignature>) {
    let (parts, body) = request.into_parts();

    let request_uri = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| parts.uri.path().to_string());

    let mut form = BTreeMap::new();

    let body = if has_form_body(&parts.method, &parts.headers) {
        match buffer_form(body, max_form_bytes).await {
            Buffered::Complete(bytes) => {
                if let Err(e) = append_pairs(&mut form, &bytes) {
                    let request = Request::from_parts(parts, Body::from(bytes));
                    return (request, Err(e));
                }
                Body::from(bytes)
            }
            Buffered::Oversized(body) => {
                let request = Request::from_parts(parts, body);
                return (
                    request,
                    Err(MimicError::Parse(format!(
                        "form body exceeds {} bytes",
                        max_form_bytes
                    ))),
                );
            }
            Buffered::Failed(prefix, e) => {
                let request = Request::from_parts(parts, Body::from(prefix));
                return (
                    request,
                    Err(MimicError::Parse(format!("unreadable form body: {}", e))),
                );
            }
        }
    } else {
        body
    };

    let query = parts.uri.query().map(str::as_bytes).unwrap_or_default();
    let parsed = append_pairs(&mut form, query).map(|_| RequestSignature {
        method: parts.method.clone(),
        request_uri,
        form,
    });

    (Request::from_parts(parts, body), parsed)
}

enum Buffered {
    /// The whole body, within the cap.
    Complete(Bytes),
    /// Over the cap: the bytes read so far chained with the unread rest.
    Oversized(Body),
    /// The stream failed; what was read before the error.
    Failed(Bytes, axum::Error),
}

/// Read `body` up to `limit` bytes without losing anything past the limit.
async fn buffer_form(body: Body, limit: usize) -> Buffered {
    let mut stream = body.into_data_stream();
    let mut buffered = Vec::new();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => return Buffered::Failed(Bytes::from(buffered), e),
        };
        buffered.extend_from_slice(&chunk);
        if buffered.len() > limit {
            let prefix = futures_util::stream::once(future::ready(Ok::<_, axum::Error>(
                Bytes::from(buffered),
            )));
            return Buffered::Oversized(Body::from_stream(prefix.chain(stream)));
        }
    }

    Buffered::Complete(Bytes::from(buffered))
}

fn has_form_body(method: &Method, headers: &axum::http::HeaderMap) -> bool {
    if !matches!(*method, Method::POST | Method::PUT | Method::PATCH) {
        return false;
    }
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case(FORM_CONTENT_TYPE))
        .unwrap_or(false)
}

fn append_pairs(form: &mut BTreeMap<String, Vec<String>>, raw: &[u8]) -> MimicResult<()> {
    check_escapes(raw)?;
    for (key, value) in url::form_urlencoded::parse(raw) {
        form.entry(key.into_owned())
            .or_default()
            .push(value.into_owned());
    }
    Ok(())
}

/// Reject `%` not followed by two hex digits.
fn check_escapes(raw: &[u8]) -> MimicResult<()> {
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'%' {
            let valid = raw.len() > i + 2
                && raw[i + 1].is_ascii_hexdigit()
                && raw[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(MimicError::Parse(format!(
                    "invalid percent escape at byte {}",
                    i
                )));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}
