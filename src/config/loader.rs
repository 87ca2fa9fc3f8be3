//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::{Environment, GatewayConfig, LogFormat};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value '{value}' for {key}")]
    Env { key: &'static str, value: String },

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply process environment
/// overrides and validate the result.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an explicit environment lookup.
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<GatewayConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, lookup)?;
    normalize(&mut config);

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay environment variables onto `config`. Empty values count as unset.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(port) = var("PORT") {
        let port: u16 = parse_env("PORT", &port)?;
        config.listener.bind_address = format!("0.0.0.0:{}", port);
    }
    if let Some(addr) = var("BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }
    if let Some(hops) = var("TRUSTED_PROXY_HOPS") {
        config.listener.trusted_proxy_hops = parse_env("TRUSTED_PROXY_HOPS", &hops)?;
    }

    if let Some(env) = var("APP_ENV") {
        config.environment = Environment::from_str(&env).map_err(|_| ConfigError::Env {
            key: "APP_ENV",
            value: env.clone(),
        })?;
    } else if let Some(env) = var("NODE_ENV") {
        // Anything but a known value is treated as production.
        config.environment = Environment::from_str(&env).unwrap_or_else(|_| {
            tracing::warn!(node_env = %env, "Unknown NODE_ENV, assuming production");
            Environment::Production
        });
    }

    if let Some(url) = var("BACKEND_URL") {
        config.upstream.base_url = Some(url);
    }
    if let Some(secs) = var("UPSTREAM_TIMEOUT_SECS") {
        config.upstream.timeout_secs = Some(parse_env("UPSTREAM_TIMEOUT_SECS", &secs)?);
    }

    if let Some(origin) = var("FRONTEND_URL") {
        config.cors.allowed_origin = Some(origin);
    }

    if let Some(secs) = var("RATE_LIMIT_WINDOW_SECS") {
        config.rate_limit.window_secs = parse_env("RATE_LIMIT_WINDOW_SECS", &secs)?;
    }
    if let Some(max) = var("RATE_LIMIT_MAX") {
        config.rate_limit.max_requests = parse_env("RATE_LIMIT_MAX", &max)?;
    }

    if let Some(enabled) = var("SERVICE_IDENTITY_ENABLED") {
        config.identity.enabled = parse_env("SERVICE_IDENTITY_ENABLED", &enabled)?;
    }
    if let Some(host) = var("GCE_METADATA_HOST") {
        config.identity.metadata_url = format!("http://{}", host);
    }

    if let Some(limit) = var("JSON_BODY_LIMIT") {
        config.body.json_limit_bytes = parse_env("JSON_BODY_LIMIT", &limit)?;
    }

    if let Some(level) = var("LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(format) = var("LOG_FORMAT") {
        config.observability.log_format = match format.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            "pretty" => LogFormat::Pretty,
            _ => {
                return Err(ConfigError::Env {
                    key: "LOG_FORMAT",
                    value: format,
                })
            }
        };
    }
    if let Some(enabled) = var("METRICS_ENABLED") {
        config.observability.metrics_enabled = parse_env("METRICS_ENABLED", &enabled)?;
    }
    if let Some(addr) = var("METRICS_ADDRESS") {
        config.observability.metrics_address = addr;
    }

    Ok(())
}

fn parse_env<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::Env {
        key,
        value: value.to_string(),
    })
}

/// Drop empty optional strings and trailing slashes on the upstream base.
fn normalize(config: &mut GatewayConfig) {
    config.upstream.base_url = config
        .upstream
        .base_url
        .take()
        .map(|url| url.trim().trim_end_matches('/').to_string())
        .filter(|url| !url.is_empty());

    config.cors.allowed_origin = config
        .cors
        .allowed_origin
        .take()
        .map(|origin| origin.trim().to_string())
        .filter(|origin| !origin.is_empty());
}
