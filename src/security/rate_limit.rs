//! Per-client rate limiting middleware.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;

use crate::observability::metrics;

/// Body sent with rejected requests.
pub const LIMIT_MESSAGE: &str = "You have reached maximum request limit.";

const X_REAL_IP: &str = "x-real-ip";
const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Buckets untouched for this long are dropped.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(60);

/// Idle buckets are swept once every this many checks.
const SWEEP_EVERY: u64 = 1024;

/// A simple token bucket rate limiter.
struct TokenBucket {
    tokens: f64,
    last_update: Instant,
}

impl TokenBucket {
    fn new(capacity: f64) -> Self {
        Self {
            tokens: capacity,
            last_update: Instant::now(),
        }
    }

    fn try_acquire(&mut self, capacity: f64, refill_rate: f64) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f64();

        // Refill tokens
        self.tokens = (self.tokens + elapsed * refill_rate).min(capacity);
        self.last_update = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Shared limiter state: one bucket per client.
pub struct RateLimiterState {
    buckets: DashMap<String, TokenBucket>,
    rps: f64,
    limit_header: HeaderValue,
    idle_ttl: Duration,
    checks: AtomicU64,
}

impl RateLimiterState {
    /// Allow `requests_per_second` per client, with a burst of the same size.
    pub fn new(requests_per_second: u32) -> Self {
        Self {
            buckets: DashMap::new(),
            rps: requests_per_second as f64,
            limit_header: HeaderValue::from(requests_per_second),
            idle_ttl: DEFAULT_IDLE_TTL,
            checks: AtomicU64::new(0),
        }
    }

    /// Drop a client's bucket after it has been idle for `ttl`.
    pub fn with_idle_ttl(mut self, ttl: Duration) -> Self {
        self.idle_ttl = ttl;
        self
    }

    /// Remove buckets idle for longer than the TTL. Returns how many went.
    pub fn evict_idle(&self) -> usize {
        let before = self.buckets.len();
        let now = Instant::now();
        self.buckets
            .retain(|_, bucket| now.duration_since(bucket.last_update) < self.idle_ttl);
        before.saturating_sub(self.buckets.len())
    }

    fn check(&self, key: &str) -> bool {
        let n = self.checks.fetch_add(1, Ordering::Relaxed) + 1;
        if n % SWEEP_EVERY == 0 {
            let evicted = self.evict_idle();
            if evicted > 0 {
                tracing::debug!(evicted, remaining = self.buckets.len(), "Evicted idle rate limit buckets");
            }
        }

        let mut bucket = self
            .buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket::new(self.rps));
        bucket.try_acquire(self.rps, self.rps)
    }

    /// Number of clients currently tracked.
    pub fn tracked_clients(&self) -> usize {
        self.buckets.len()
    }
}

/// Client identity: `X-Real-IP`, then the peer address, then the first
/// `X-Forwarded-For` hop.
fn client_key(request: &Request<Body>) -> String {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    header(X_REAL_IP)
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .or_else(|| header(X_FORWARDED_FOR))
        .unwrap_or_else(|| "unknown".to_string())
}

fn set_limit_headers(state: &RateLimiterState, response: &mut Response) {
    let headers = response.headers_mut();
    headers.insert("x-rate-limit-limit", state.limit_header.clone());
    headers.insert("x-rate-limit-duration", HeaderValue::from_static("1"));
}

/// Middleware function for per-client rate limiting.
pub async fn rate_limit_middleware(
    State(state): State<Arc<RateLimiterState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = client_key(&request);

    let mut response = if state.check(&key) {
        next.run(request).await
    } else {
        tracing::warn!(client = %key, "Rate limit exceeded");
        metrics::error_inc("rate_limited");
        let mut response = Response::new(Body::from(LIMIT_MESSAGE));
        *response.status_mut() = StatusCode::TOO_MANY_REQUESTS;
        response.headers_mut().insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; charset=utf-8"),
        );
        response
    };

    set_limit_headers(&state, &mut response);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{middleware, routing::get, Router};
    use tower::ServiceExt;

    fn app(state: Arc<RateLimiterState>) -> Router {
        Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn_with_state(state, rate_limit_middleware))
    }

    fn from_ip(ip: &str) -> Request<Body> {
        Request::builder()
            .uri("/")
            .header("X-Real-IP", ip)
            .body(Body::empty())
            .unwrap()
    }

    #[test]
    fn test_token_bucket_drains_and_refills() {
        let mut bucket = TokenBucket::new(2.0);
        assert!(bucket.try_acquire(2.0, 2.0));
        assert!(bucket.try_acquire(2.0, 2.0));
        assert!(!bucket.try_acquire(2.0, 2.0));

        bucket.last_update -= std::time::Duration::from_secs(1);
        assert!(bucket.try_acquire(2.0, 2.0));
    }

    #[tokio::test]
    async fn test_limit_is_per_client() {
        let state = Arc::new(RateLimiterState::new(2));
        let app = app(state.clone());

        for _ in 0..2 {
            let res = app.clone().oneshot(from_ip("10.0.0.1")).await.unwrap();
            assert_eq!(res.status(), StatusCode::OK);
            assert_eq!(res.headers()["x-rate-limit-limit"], "2");
            assert_eq!(res.headers()["x-rate-limit-duration"], "1");
        }

        let res = app.clone().oneshot(from_ip("10.0.0.1")).await.unwrap();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.headers()["content-type"], "text/plain; charset=utf-8");
        let body = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], LIMIT_MESSAGE.as_bytes());

        let res = app.oneshot(from_ip("10.0.0.2")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(state.tracked_clients(), 2);
    }

    #[test]
    fn test_idle_buckets_are_evicted() {
        let state = RateLimiterState::new(5).with_idle_ttl(Duration::from_secs(30));
        assert!(state.check("10.0.0.1"));
        assert!(state.check("10.0.0.2"));

        // Age one bucket past the TTL.
        if let Some(mut bucket) = state.buckets.get_mut("10.0.0.1") {
            bucket.last_update -= Duration::from_secs(31);
        }

        assert_eq!(state.evict_idle(), 1);
        assert_eq!(state.tracked_clients(), 1);
        assert!(state.buckets.contains_key("10.0.0.2"));
    }

    #[test]
    fn test_rotating_client_keys_do_not_accumulate() {
        let state = RateLimiterState::new(5).with_idle_ttl(Duration::ZERO);
        for i in 0..(SWEEP_EVERY * 4) {
            state.check(&format!("spoofed-{}", i));
        }
        assert!(state.tracked_clients() < SWEEP_EVERY as usize);
    }

    #[test]
    fn test_client_key_lookup_order() {
        let req = Request::builder()
            .header("X-Forwarded-For", "1.1.1.1, 2.2.2.2")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&req), "1.1.1.1");

        let mut req = Request::builder()
            .header("X-Forwarded-For", "1.1.1.1")
            .body(Body::empty())
            .unwrap();
        req.extensions_mut()
            .insert(ConnectInfo::<SocketAddr>("192.168.1.9:4000".parse().unwrap()));
        assert_eq!(client_key(&req), "192.168.1.9");

        let req = Request::builder()
            .header("X-Real-IP", "3.3.3.3")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&req), "3.3.3.3");

        let req = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&req), "unknown");
    }
}
