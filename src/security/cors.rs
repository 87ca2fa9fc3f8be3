//! Cross-origin policy for the frontend.

use axum::http::{header, HeaderValue, Method};
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::CorsConfig;

/// Build the CORS layer, or `None` when no frontend origin is configured.
///
/// Only an exact match of the configured origin is echoed back; any other
/// origin gets a response without `Access-Control-Allow-Origin`.
pub fn cors_layer(config: &CorsConfig) -> Option<CorsLayer> {
    let origin = config.allowed_origin.as_deref()?;
    let origin = match HeaderValue::from_str(origin) {
        Ok(v) => v,
        Err(_) => {
            tracing::warn!(origin = %origin, "Ignoring unparseable CORS origin");
            return None;
        }
    };

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([origin]))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            .allow_credentials(true),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_origin() {
        assert!(cors_layer(&CorsConfig::default()).is_none());
    }

    #[test]
    fn test_enabled_with_origin() {
        let config = CorsConfig {
            allowed_origin: Some("http://allowed.test".into()),
        };
        assert!(cors_layer(&config).is_some());
    }
}
