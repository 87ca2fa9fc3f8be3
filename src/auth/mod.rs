//! Outbound authentication.
//!
//! # Data Flow
//! ```text
//! caller Authorization (optional)
//!     → headers.rs (AuthHeaderResolver)
//!         → identity.rs (mint service token for the upstream, unless local)
//!     → AuthHeaderSet { Authorization, X-Serverless-Authorization }
//! ```
//!
//! # Design Decisions
//! - The caller's token and the service token travel in separate headers
//! - Tokens are minted per request and never cached
//! - Failing to mint a required token fails the request

pub mod headers;
pub mod identity;

pub use headers::{AuthHeaderResolver, AuthHeaderSet, X_SERVERLESS_AUTHORIZATION};
pub use identity::{IdentityError, IdentityTokenProvider, MetadataServerProvider};
