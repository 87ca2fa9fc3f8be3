//! Sliding-window rate limiting for the `/api` prefix.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderName, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::RateLimitConfig;
use crate::observability::metrics;
use crate::security::headers::resolve_client_ip;
use crate::security::store::{now_millis, IncrementResponse, RateLimitStore};

pub const RATELIMIT_POLICY: HeaderName = HeaderName::from_static("ratelimit-policy");
pub const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
pub const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
pub const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");
pub const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
pub const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
pub const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

const TOO_MANY_REQUESTS_MESSAGE: &str = "Too many requests, please try again later.";

/// Quota state for one counted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStatus {
    pub limit: u32,
    pub window: Duration,
    pub total_hits: usize,
    pub reset_time_ms: u64,
}

impl RateLimitStatus {
    fn from_increment(limit: u32, window: Duration, res: IncrementResponse) -> Self {
        Self {
            limit,
            window,
            total_hits: res.total_hits,
            reset_time_ms: res.reset_time_ms,
        }
    }

    pub fn exceeded(&self) -> bool {
        self.total_hits > self.limit as usize
    }

    pub fn remaining(&self) -> u32 {
        (self.limit as usize).saturating_sub(self.total_hits) as u32
    }

    /// Whole seconds until the window resets, rounded up.
    pub fn reset_after_secs(&self, now_ms: u64) -> u64 {
        self.reset_time_ms.saturating_sub(now_ms).div_ceil(1000)
    }

    /// Write both the standard and the legacy header families.
    pub fn apply_headers(&self, headers: &mut HeaderMap, now_ms: u64) {
        let policy = format!("{};w={}", self.limit, self.window.as_secs());
        if let Ok(value) = HeaderValue::from_str(&policy) {
            headers.insert(RATELIMIT_POLICY, value);
        }
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(self.remaining()));
        headers.insert(RATELIMIT_RESET, HeaderValue::from(self.reset_after_secs(now_ms)));

        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(self.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(self.remaining()));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(self.reset_time_ms.div_ceil(1000)));
    }
}

/// Per-client admission control backed by a [`RateLimitStore`].
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    limit: u32,
    window: Duration,
    trusted_proxy_hops: usize,
    skip_failed_requests: bool,
}

impl RateLimiter {
    /// Build a limiter and initialize `store` with the configured window.
    pub fn new(
        store: Arc<dyn RateLimitStore>,
        config: &RateLimitConfig,
        trusted_proxy_hops: usize,
    ) -> Self {
        store.init(config.window());
        Self {
            store,
            limit: config.max_requests,
            window: config.window(),
            trusted_proxy_hops,
            skip_failed_requests: config.skip_failed_requests,
        }
    }

    /// Partition key for a request: the resolved client address.
    pub fn client_key(&self, peer: Option<IpAddr>, headers: &HeaderMap) -> String {
        let peer = peer.unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        resolve_client_ip(peer, headers, self.trusted_proxy_hops).to_string()
    }

    /// Count one request for `key`.
    pub fn hit(&self, key: &str) -> RateLimitStatus {
        let res = self.store.increment(key);
        RateLimitStatus::from_increment(self.limit, self.window, res)
    }
}

/// Middleware counting every `/api` request against its client's quota.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let key = limiter.client_key(peer, request.headers());
    let status = limiter.hit(&key);

    if status.exceeded() {
        tracing::warn!(
            client = %key,
            hits = status.total_hits,
            limit = status.limit,
            "Rate limit exceeded"
        );
        metrics::record_rate_limited();
        return too_many_requests(&status);
    }

    let mut response = next.run(request).await;

    if limiter.skip_failed_requests && response.status().as_u16() >= 400 {
        limiter.store.decrement(&key);
    }

    status.apply_headers(response.headers_mut(), now_millis());
    response
}

fn too_many_requests(status: &RateLimitStatus) -> Response {
    let now_ms = now_millis();
    let mut response = (StatusCode::TOO_MANY_REQUESTS, TOO_MANY_REQUESTS_MESSAGE).into_response();
    let headers = response.headers_mut();
    status.apply_headers(headers, now_ms);
    headers.insert(
        axum::http::header::RETRY_AFTER,
        HeaderValue::from(status.reset_after_secs(now_ms)),
    );
    response
}
