//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check referential integrity (CRM section references an existing upstream)
//! - Validate value ranges (timeouts > 0, ratios within bounds)
//! - Detect duplicate names (upstreams, webhook providers, SKUs)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use axum::http::HeaderName;
use url::Url;

use crate::config::schema::{AuthScheme, GatewayConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every problem found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a valid socket address", config.listener.bind_address),
        ));
    }
    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.trim().is_empty() || tls.key_path.trim().is_empty() {
            errors.push(ValidationError::new(
                "listener.tls",
                "cert_path and key_path are both required",
            ));
        }
    }

    let timeouts = &config.timeouts;
    for (field, value) in [
        ("timeouts.request_secs", timeouts.request_secs),
        ("timeouts.upstream_ms", timeouts.upstream_ms),
        ("timeouts.probe_ms", timeouts.probe_ms),
        ("timeouts.connect_ms", timeouts.connect_ms),
    ] {
        if value == 0 {
            errors.push(ValidationError::new(field, "must be greater than zero"));
        }
    }

    if config.rate_limit.enabled
        && (config.rate_limit.requests_per_second == 0 || config.rate_limit.burst_size == 0)
    {
        errors.push(ValidationError::new(
            "rate_limit",
            "requests_per_second and burst_size must be greater than zero",
        ));
    }

    let retries = &config.retries;
    if retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if !(0.0..=1.0).contains(&retries.budget_ratio) {
        errors.push(ValidationError::new("retries.budget_ratio", "must be within 0.0..=1.0"));
    }
    if retries.base_delay_ms > retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    let breaker = &config.circuit_breaker;
    if breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_threshold",
            "must be at least 1",
        ));
    }
    if !(breaker.failure_ratio > 0.0 && breaker.failure_ratio <= 1.0) {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_ratio",
            "must be within (0.0, 1.0]",
        ));
    }
    if breaker.window_secs == 0 || breaker.reset_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker",
            "window_secs and reset_timeout_secs must be greater than zero",
        ));
    }

    let format = config.observability.log_format.as_str();
    if format != "pretty" && format != "json" {
        errors.push(ValidationError::new(
            "observability.log_format",
            format!("unknown format '{}', expected 'pretty' or 'json'", format),
        ));
    }

    if config.security.max_body_size == 0 {
        errors.push(ValidationError::new("security.max_body_size", "must be greater than zero"));
    }

    if config.crm.default_limit == 0 || config.crm.default_limit > config.crm.max_limit {
        errors.push(ValidationError::new(
            "crm.default_limit",
            "must be between 1 and crm.max_limit",
        ));
    }

    let mut names = HashSet::new();
    for (i, upstream) in config.upstreams.iter().enumerate() {
        let field = format!("upstreams[{}]", i);
        if upstream.name.trim().is_empty() {
            errors.push(ValidationError::new(&field, "name must not be empty"));
        } else if !names.insert(upstream.name.as_str()) {
            errors.push(ValidationError::new(
                &field,
                format!("duplicate upstream name '{}'", upstream.name),
            ));
        }
        if upstream.name == config.database.probe_name {
            errors.push(ValidationError::new(
                &field,
                format!("name '{}' collides with the database probe", upstream.name),
            ));
        }
        if !upstream.base_url.is_empty() {
            match Url::parse(&upstream.base_url) {
                Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
                Ok(url) => errors.push(ValidationError::new(
                    format!("{}.base_url", field),
                    format!("unsupported scheme '{}'", url.scheme()),
                )),
                Err(e) => errors.push(ValidationError::new(
                    format!("{}.base_url", field),
                    e.to_string(),
                )),
            }
        }
        if !upstream.probe_path.starts_with('/') {
            errors.push(ValidationError::new(
                format!("{}.probe_path", field),
                "must start with '/'",
            ));
        }
        if let AuthScheme::Header { name } = &upstream.auth {
            if HeaderName::from_bytes(name.as_bytes()).is_err() {
                errors.push(ValidationError::new(
                    format!("{}.auth.name", field),
                    format!("'{}' is not a valid header name", name),
                ));
            }
        }
        for key in upstream.headers.keys() {
            if HeaderName::from_bytes(key.as_bytes()).is_err() {
                errors.push(ValidationError::new(
                    format!("{}.headers", field),
                    format!("'{}' is not a valid header name", key),
                ));
            }
        }
        if upstream.timeout_ms == Some(0) {
            errors.push(ValidationError::new(
                format!("{}.timeout_ms", field),
                "must be greater than zero",
            ));
        }
    }

    if config.upstream(&config.crm.upstream).is_none() {
        errors.push(ValidationError::new(
            "crm.upstream",
            format!("references unknown upstream '{}'", config.crm.upstream),
        ));
    }

    let mut providers = HashSet::new();
    for (i, provider) in config.webhooks.providers.iter().enumerate() {
        let field = format!("webhooks.providers[{}]", i);
        if provider.name.trim().is_empty() {
            errors.push(ValidationError::new(&field, "name must not be empty"));
        } else if !providers.insert(provider.name.as_str()) {
            errors.push(ValidationError::new(
                &field,
                format!("duplicate webhook provider '{}'", provider.name),
            ));
        }
        if HeaderName::from_bytes(provider.signature_header.as_bytes()).is_err() {
            errors.push(ValidationError::new(
                format!("{}.signature_header", field),
                format!("'{}' is not a valid header name", provider.signature_header),
            ));
        }
    }

    let mut skus = HashSet::new();
    for (i, item) in config.inventory.iter().enumerate() {
        let sku = item.sku.trim().to_ascii_lowercase();
        if sku.is_empty() {
            errors.push(ValidationError::new(format!("inventory[{}].sku", i), "must not be empty"));
        } else if !skus.insert(sku) {
            errors.push(ValidationError::new(
                format!("inventory[{}].sku", i),
                format!("duplicate sku '{}'", item.sku),
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
