//! Request-level errors and their HTTP representation.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::IdentityError;
use crate::observability::metrics;
use crate::upstream::UpstreamError;

pub const PROXY_ERROR_MESSAGE: &str = "Error proxying request to backend";

/// Everything that can end a proxied request early.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request body is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("request body exceeds {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("no upstream base URL configured")]
    NoUpstream,

    #[error("failed to authenticate with backend service: {0}")]
    Auth(#[from] IdentityError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::InvalidJson(_) | GatewayError::BodyRead(_) => StatusCode::BAD_REQUEST,
            GatewayError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            GatewayError::Upstream(UpstreamError::Status { status, .. }) => *status,
            GatewayError::NoUpstream
            | GatewayError::Auth(_)
            | GatewayError::Upstream(UpstreamError::Transport(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::Upstream(UpstreamError::Status { status, body }) => {
                tracing::debug!(status = %status, "Mirroring upstream error");
                (status, Json(body)).into_response()
            }
            GatewayError::InvalidJson(e) => {
                tracing::debug!(error = %e, "Rejected malformed JSON body");
                message(StatusCode::BAD_REQUEST, "Invalid JSON body")
            }
            GatewayError::BodyRead(e) => {
                tracing::warn!(error = %e, "Failed to read request body");
                message(StatusCode::BAD_REQUEST, "Failed to read request body")
            }
            GatewayError::PayloadTooLarge { limit } => {
                tracing::debug!(limit, "Rejected oversized JSON body");
                message(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
            }
            GatewayError::NoUpstream => {
                tracing::error!("Cannot proxy request: no upstream configured");
                metrics::record_upstream_error("no_upstream");
                message(StatusCode::INTERNAL_SERVER_ERROR, PROXY_ERROR_MESSAGE)
            }
            GatewayError::Auth(e) => {
                tracing::error!(error = %e, "Failed to get service identity token");
                metrics::record_upstream_error("auth");
                message(StatusCode::INTERNAL_SERVER_ERROR, PROXY_ERROR_MESSAGE)
            }
            GatewayError::Upstream(UpstreamError::Transport(e)) => {
                tracing::error!(error = %e, "Upstream request failed");
                metrics::record_upstream_error("transport");
                message(StatusCode::INTERNAL_SERVER_ERROR, PROXY_ERROR_MESSAGE)
            }
        }
    }
}

fn message(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}
