//! Single-attempt HTTP client for the upstream backend.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use serde_json::Value;
use thiserror::Error;

use crate::auth::AuthHeaderSet;
use crate::config::UpstreamConfig;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Payload sent upstream.
#[derive(Debug, Clone, PartialEq)]
pub enum OutboundBody {
    /// No payload; still labelled `application/json`.
    Empty,
    /// A decoded JSON document, re-encoded for the upstream.
    Json(Value),
    /// Raw bytes forwarded unchanged with their original content type.
    Raw { bytes: Bytes, content_type: HeaderValue },
}

/// A 2xx answer from the upstream.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Every way an upstream call can fail.
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The upstream answered with a non-2xx status; mirrored to the caller.
    #[error("upstream responded with {status}")]
    Status { status: StatusCode, body: Value },

    /// No usable answer: connect failure, timeout, broken body.
    #[error("upstream transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Client bound to one upstream base URL.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl UpstreamClient {
    pub fn new(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self::from_client(builder.build()?, config.base_url.clone()))
    }

    pub fn from_client(client: reqwest::Client, base_url: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    /// Underlying client, shared with other outbound callers.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// `base + suffix`, or `None` when no upstream is configured.
    pub fn target_url(&self, suffix: &str) -> Option<String> {
        self.base_url.as_ref().map(|base| format!("{}{}", base, suffix))
    }

    /// Send one request. No retries.
    pub async fn forward(
        &self,
        method: Method,
        target: &str,
        auth: &AuthHeaderSet,
        body: OutboundBody,
        request_id: Option<&HeaderValue>,
    ) -> Result<UpstreamResponse, UpstreamError> {
        let mut headers = HeaderMap::new();
        auth.apply(&mut headers);
        if let Some(id) = request_id {
            headers.insert(X_REQUEST_ID, id.clone());
        }

        let mut request = self.client.request(method, target);
        match body {
            OutboundBody::Empty => {
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            OutboundBody::Json(value) => {
                headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
                request = request.json(&value);
            }
            OutboundBody::Raw { bytes, content_type } => {
                headers.insert(header::CONTENT_TYPE, content_type);
                headers.insert(header::CONTENT_LENGTH, HeaderValue::from(bytes.len()));
                request = request.body(bytes);
            }
        }

        let response = request.headers(headers).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let body = decode_body(&bytes);

        if status.is_success() {
            Ok(UpstreamResponse { status, body })
        } else {
            Err(UpstreamError::Status { status, body })
        }
    }
}

/// JSON when the payload parses, otherwise the text as a JSON string.
pub fn decode_body(bytes: &[u8]) -> Value {
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
