//! Paths that are never proxied.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::observability::metrics;

const BLOCKED_PREFIX: &str = "/api/scrape";
const BLOCKED_MESSAGE: &str = "This endpoint is not available.";

/// True for `/api/scrape` and anything below it, ignoring ASCII case.
pub fn is_denylisted(path: &str) -> bool {
    let Some(head) = path.get(..BLOCKED_PREFIX.len()) else {
        return false;
    };
    if !head.eq_ignore_ascii_case(BLOCKED_PREFIX) {
        return false;
    }
    matches!(path.as_bytes().get(BLOCKED_PREFIX.len()), None | Some(b'/'))
}

/// Rejects denylisted paths with 403 before any quota or auth work.
pub async fn denylist_middleware(request: Request<Body>, next: Next) -> Response {
    if is_denylisted(request.uri().path()) {
        tracing::info!(path = %request.uri().path(), "Blocked denylisted path");
        metrics::record_denied("denylist");
        return (StatusCode::FORBIDDEN, BLOCKED_MESSAGE).into_response();
    }
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocked_paths() {
        assert!(is_denylisted("/api/scrape"));
        assert!(is_denylisted("/api/scrape/"));
        assert!(is_denylisted("/api/scrape/recipes/42"));
        assert!(is_denylisted("/API/Scrape"));
    }

    #[test]
    fn test_allowed_paths() {
        assert!(!is_denylisted("/api/scraper"));
        assert!(!is_denylisted("/api/query"));
        assert!(!is_denylisted("/api"));
        assert!(!is_denylisted("/health"));
    }
}
