//! Upstream backend access.
//!
//! # Design Decisions
//! - Exactly one attempt per inbound request; retries belong to the caller
//! - Outcomes are a single `Result<UpstreamResponse, UpstreamError>` where
//!   the error separates mirrored statuses from transport failures
//! - Only auth headers, content headers and the request id are forwarded

pub mod client;

pub use client::{OutboundBody, UpstreamClient, UpstreamError, UpstreamResponse};
