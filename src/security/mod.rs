//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → cors.rs (echo the frontend origin, answer preflights)
//!     → denylist.rs (hard 403 for blocked paths)
//!     → rate_limit.rs (per-client sliding window, backed by store.rs)
//!     → Pass to the proxy handler
//! ```
//!
//! # Design Decisions
//! - Denylist runs before the limiter so blocked paths never consume quota
//! - Client identity comes from headers.rs with an explicit trusted hop count
//! - Limiter state is owned by the server instance, never a global

pub mod cors;
pub mod denylist;
pub mod headers;
pub mod rate_limit;
pub mod store;

pub use rate_limit::{RateLimitStatus, RateLimiter};
pub use store::{IncrementResponse, MemoryStore, RateLimitStore};
