//! Backend-for-frontend gateway library.
//!
//! Sits between a browser frontend and a private backend service: applies
//! the endpoint denylist and per-client rate limit, resolves outbound auth
//! headers, and forwards `/api` traffic upstream.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod upstream;

pub use config::schema::GatewayConfig;
pub use error::GatewayError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
