//! Startup orchestration.
//!
//! Configuration is loaded and validated before anything else; subsystems are
//! built in dependency order and the listener is bound last, so traffic only
//! arrives once every component is ready. Any error here is fatal.

use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::{is_placeholder, ConfigError, GatewayConfig};
use crate::inventory::InventoryError;
use crate::upstream::UpstreamError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("HTTP client: {0}")]
    Http(#[from] reqwest::Error),

    #[error("inventory: {0}")]
    Inventory(#[from] InventoryError),

    #[error("upstream definition: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("invalid bind address '{address}': {source}")]
    Address {
        address: String,
        source: std::net::AddrParseError,
    },

    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration choices that are legal but unsafe, as human-readable lines.
pub fn security_warnings(config: &GatewayConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if is_placeholder(&config.admin.api_key) {
        warnings.push(
            "METRICS_API_KEY is not set; /metrics and /api/circuit-breakers reject every request"
                .to_string(),
        );
    }

    for provider in &config.webhooks.providers {
        let unsigned = provider.skip_verification
            || provider.secret.as_deref().map_or(true, is_placeholder);
        if unsigned {
            warnings.push(format!(
                "webhook provider '{}' accepts unsigned deliveries",
                provider.name
            ));
        }
    }

    if config.is_production() {
        if config.listener.tls.is_none() {
            warnings.push("TLS is disabled; terminate TLS in front of the gateway".to_string());
        }
        if !config.rate_limit.enabled {
            warnings.push("rate limiting is disabled".to_string());
        }
    }

    warnings
}

pub fn log_security_warnings(config: &GatewayConfig) {
    for warning in security_warnings(config) {
        tracing::warn!(environment = %config.environment, "{}", warning);
    }
}

/// Parse and bind the plain-HTTP listener.
pub async fn bind_listener(address: &str) -> Result<TcpListener, StartupError> {
    let addr: SocketAddr = address.parse().map_err(|source| StartupError::Address {
        address: address.to_string(),
        source,
    })?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %listener.local_addr()?, "Listener bound");
    Ok(listener)
}
