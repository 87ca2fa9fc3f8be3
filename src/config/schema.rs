//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the BFF gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, proxy trust).
    pub listener: ListenerConfig,

    /// Deployment environment.
    pub environment: Environment,

    /// Upstream backend the `/api` prefix is forwarded to.
    pub upstream: UpstreamConfig,

    /// Cross-origin settings for the frontend.
    pub cors: CorsConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Service-to-service identity settings.
    pub identity: IdentityConfig,

    /// Request body handling.
    pub body: BodyConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl GatewayConfig {
    /// True when no service identity token should be minted for upstream calls.
    pub fn is_local_development(&self) -> bool {
        self.environment == Environment::Development
            || self.upstream.base_url.is_none()
            || !self.identity.enabled
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Number of reverse-proxy hops in front of the gateway whose
    /// `X-Forwarded-For` entries are trusted.
    pub trusted_proxy_hops: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            trusted_proxy_hops: 1,
        }
    }
}

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Production,
    Development,
    Test,
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Environment::Production),
            "development" | "dev" => Ok(Environment::Development),
            "test" => Ok(Environment::Test),
            other => Err(format!("unknown environment '{}'", other)),
        }
    }
}

/// Upstream backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL the `/api`-stripped path is appended to.
    pub base_url: Option<String>,

    /// Total timeout for one upstream call. Unset means the client default (none).
    pub timeout_secs: Option<u64>,
}

/// CORS configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CorsConfig {
    /// The single frontend origin allowed to read responses cross-origin.
    pub allowed_origin: Option<String>,
}

/// Rate limiting configuration for the `/api` prefix.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Sliding window length in seconds.
    pub window_secs: u64,

    /// Maximum requests per client key inside one window.
    pub max_requests: u32,

    /// Un-count requests that end with a status >= 400.
    pub skip_failed_requests: bool,

    /// Interval of the dormant-key sweep in seconds (0 disables it).
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_secs: 15 * 60,
            max_requests: 100,
            skip_failed_requests: false,
            sweep_interval_secs: 60,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn sweep_interval(&self) -> Option<Duration> {
        (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
    }
}

/// Service identity (metadata server) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// Mint an identity token for every upstream call.
    pub enabled: bool,

    /// Base URL of the compute metadata server.
    pub metadata_url: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            metadata_url: "http://metadata.google.internal".to_string(),
        }
    }
}

/// Request body handling.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyConfig {
    /// Maximum size of a JSON request body. Multipart bodies are not capped.
    pub json_limit_bytes: usize,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            json_limit_bytes: 100 * 1024,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_api_policy() {
        let config = GatewayConfig::default();
        assert_eq!(config.rate_limit.window(), Duration::from_secs(900));
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.listener.trusted_proxy_hops, 1);
        assert_eq!(config.body.json_limit_bytes, 102_400);
        assert!(config.cors.allowed_origin.is_none());
    }

    #[test]
    fn test_local_development_detection() {
        let mut config = GatewayConfig::default();
        assert!(config.is_local_development(), "no upstream means local development");

        config.upstream.base_url = Some("https://backend.example".into());
        assert!(!config.is_local_development());

        config.environment = Environment::Development;
        assert!(config.is_local_development());

        config.environment = Environment::Production;
        config.identity.enabled = false;
        assert!(config.is_local_development());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            environment = "development"

            [rate_limit]
            max_requests = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.environment, Environment::Development);
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.window_secs, 900);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }
}
