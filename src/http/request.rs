//! Request classification and body extraction.
//!
//! # Responsibilities
//! - Classify requests as multipart or JSON/other by `Content-Type`
//! - Decode JSON bodies (bounded) and buffer multipart bodies (unbounded)
//! - Compute the upstream path suffix by stripping the `/api` prefix
//!
//! # Design Decisions
//! - Multipart bodies are never inspected, only buffered and forwarded
//! - Non-JSON payloads on non-multipart requests are not forwarded

use axum::{
    body::{Body, Bytes},
    http::{header, HeaderMap, HeaderValue, Method, Request},
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde_json::Value;

use crate::error::GatewayError;
use crate::upstream::client::{OutboundBody, X_REQUEST_ID};

const API_PREFIX: &str = "/api";

/// True when `Content-Type` starts with `multipart/`.
pub fn is_multipart(headers: &HeaderMap) -> bool {
    content_type(headers)
        .and_then(|ct| ct.get(..10))
        .is_some_and(|head| head.eq_ignore_ascii_case("multipart/"))
}

/// True for `application/json` and `+json` media types.
pub fn is_json(headers: &HeaderMap) -> bool {
    let Some(ct) = content_type(headers) else {
        return false;
    };
    let essence = ct.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
    essence == "application/json" || (essence.contains('/') && essence.ends_with("+json"))
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
}

/// The part of `path_and_query` after the `/api` prefix.
pub fn upstream_suffix(path_and_query: &str) -> &str {
    path_and_query.strip_prefix(API_PREFIX).unwrap_or(path_and_query)
}

/// One inbound call, ready to be forwarded.
#[derive(Debug)]
pub struct ProxyRequest {
    pub method: Method,
    /// Original path and query, including the `/api` prefix.
    pub original_uri: String,
    pub authorization: Option<HeaderValue>,
    pub request_id: Option<HeaderValue>,
    pub is_multipart: bool,
    pub body: OutboundBody,
}

impl ProxyRequest {
    /// Split an inbound request and extract its body.
    pub async fn extract(request: Request<Body>, json_limit: usize) -> Result<Self, GatewayError> {
        let (parts, body) = request.into_parts();
        let is_multipart = is_multipart(&parts.headers);

        let body = if is_multipart {
            let bytes = axum::body::to_bytes(body, usize::MAX)
                .await
                .map_err(|e| GatewayError::BodyRead(e.to_string()))?;
            let content_type = parts
                .headers
                .get(header::CONTENT_TYPE)
                .cloned()
                .unwrap_or_else(|| HeaderValue::from_static("multipart/form-data"));
            OutboundBody::Raw { bytes, content_type }
        } else if is_json(&parts.headers) {
            let bytes = read_limited(body, json_limit).await?;
            if bytes.is_empty() {
                OutboundBody::Empty
            } else {
                let value: Value =
                    serde_json::from_slice(&bytes).map_err(GatewayError::InvalidJson)?;
                OutboundBody::Json(value)
            }
        } else {
            OutboundBody::Empty
        };

        let original_uri = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| parts.uri.path().to_string());

        Ok(Self {
            method: parts.method,
            original_uri,
            authorization: parts.headers.get(header::AUTHORIZATION).cloned(),
            request_id: parts.headers.get(X_REQUEST_ID).cloned(),
            is_multipart,
            body,
        })
    }

    pub fn upstream_suffix(&self) -> &str {
        upstream_suffix(&self.original_uri)
    }
}

async fn read_limited(body: Body, limit: usize) -> Result<Bytes, GatewayError> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(GatewayError::PayloadTooLarge { limit })
        }
        Err(e) => Err(GatewayError::BodyRead(e.to_string())),
    }
}
