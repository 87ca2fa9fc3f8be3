//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware chain)
//!     → request.rs (classify JSON vs multipart, extract body, strip /api)
//!     → auth + upstream forward
//!     → response.rs / error.rs (mirror or translate the outcome)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::ProxyRequest;
pub use server::{AppState, HttpServer};
