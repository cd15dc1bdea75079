//! Configuration loading from disk and the process environment.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::{env_prefix, GatewayConfig, TlsConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid value for {var}: {message}")]
    Env { var: String, message: String },

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration: optional TOML file, then environment overrides, then validation.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => load_file(path)?,
        None => GatewayConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Parse a TOML file without environment overrides or validation.
pub fn load_file(path: &Path) -> Result<GatewayConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml::from_str(&content)?)
}

/// Overlay environment variables onto a configuration.
///
/// `lookup` abstracts the environment so the mapping can be tested without
/// mutating process state. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut GatewayConfig, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(env) = get("GATEWAY_ENV").or_else(|| get("NODE_ENV")) {
        config.environment = env;
    }

    if let Some(addr) = get("BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }
    if let Some(port) = get("PORT") {
        let port: u16 = parse(&port, "PORT")?;
        let host = config
            .listener
            .bind_address
            .rsplit_once(':')
            .map(|(host, _)| host.to_string())
            .unwrap_or_else(|| "0.0.0.0".to_string());
        config.listener.bind_address = format!("{}:{}", host, port);
    }
    match (get("SSL_CERT_PATH"), get("SSL_KEY_PATH")) {
        (Some(cert_path), Some(key_path)) => {
            config.listener.tls = Some(TlsConfig { cert_path, key_path });
        }
        (None, None) => {}
        _ => {
            return Err(ConfigError::Env {
                var: "SSL_CERT_PATH/SSL_KEY_PATH".to_string(),
                message: "both must be set to enable TLS".to_string(),
            })
        }
    }

    if let Some(level) = get("LOG_LEVEL") {
        config.observability.log_level = level;
    }
    if let Some(format) = get("LOG_FORMAT") {
        config.observability.log_format = format;
    }
    if let Some(dir) = get("LOG_DIR") {
        config.observability.log_dir = Some(dir);
    }

    if let Some(key) = get("METRICS_API_KEY") {
        config.admin.api_key = key;
    }

    if let Some(enabled) = get("RATE_LIMIT_ENABLED") {
        config.rate_limit.enabled = parse_bool(&enabled, "RATE_LIMIT_ENABLED")?;
    }
    if let Some(rps) = get("RATE_LIMIT_RPS") {
        config.rate_limit.requests_per_second = parse(&rps, "RATE_LIMIT_RPS")?;
    }
    if let Some(burst) = get("RATE_LIMIT_BURST") {
        config.rate_limit.burst_size = parse(&burst, "RATE_LIMIT_BURST")?;
    }

    if let Some(timeout) = get("UPSTREAM_TIMEOUT_MS") {
        config.timeouts.upstream_ms = parse(&timeout, "UPSTREAM_TIMEOUT_MS")?;
    }

    for upstream in config.upstreams.iter_mut() {
        let prefix = env_prefix(&upstream.name);
        if let Some(key) = get(&upstream.credential_env()) {
            upstream.api_key = Some(key);
        }
        if let Some(url) = get(&format!("{}_BASE_URL", prefix)) {
            upstream.base_url = url;
        }
        if let Some(location) = get(&format!("{}_LOCATION_ID", prefix)) {
            upstream.params.insert("location_id".to_string(), location);
        }
    }
    if let Some(domain) = get("SHOPIFY_STORE_DOMAIN") {
        if let Some(shopify) = config.upstream_mut("shopify") {
            let domain = domain.trim_start_matches("https://").trim_end_matches('/');
            shopify.base_url = format!("https://{}/admin/api/2024-07", domain);
        }
    }

    if let Some(uri) = get("MONGODB_URI") {
        config.database.uri = Some(uri);
    }
    if let Some(size) = get("MONGODB_POOL_SIZE") {
        config.database.max_pool_size = parse(&size, "MONGODB_POOL_SIZE")?;
    }

    for provider in config.webhooks.providers.iter_mut() {
        let prefix = env_prefix(&provider.name);
        if let Some(secret) = get(&format!("{}_WEBHOOK_SECRET", prefix)) {
            provider.secret = Some(secret);
        }
    }

    Ok(())
}

fn parse<T: std::str::FromStr>(value: &str, var: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::Env {
        var: var.to_string(),
        message: e.to_string(),
    })
}

fn parse_bool(value: &str, var: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Env {
            var: var.to_string(),
            message: format!("'{}' is not a boolean", other),
        }),
    }
}
