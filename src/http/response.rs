//! Response translation back to the caller.
//!
//! Successful upstream answers are re-emitted as JSON with the upstream
//! status. Failures are handled by [`GatewayError`]'s `IntoResponse`.
//!
//! [`GatewayError`]: crate::error::GatewayError

use axum::{
    response::{IntoResponse, Response},
    Json,
};

use crate::upstream::UpstreamResponse;

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
