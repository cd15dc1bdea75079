//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from TOML files; every
//! section has defaults so an empty file (or no file at all) is a valid config.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Placeholder value shipped in defaults. Secrets still carrying it are
/// treated as "not set" (admin key) or "skip verification" (webhooks).
pub const PLACEHOLDER_SECRET: &str = "CHANGE_ME";

/// Returns true when a secret is unset or still the shipped placeholder.
pub fn is_placeholder(secret: &str) -> bool {
    secret.trim().is_empty() || secret.starts_with(PLACEHOLDER_SECRET)
}

/// Root configuration for the integration gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Deployment environment ("development", "staging", "production").
    /// Error details are hidden from clients in production.
    pub environment: String,

    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// Retry configuration for idempotent upstream calls.
    pub retries: RetryConfig,

    /// Circuit breaker settings shared by every upstream.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Operational endpoints (`/metrics`, `/api/circuit-breakers`).
    pub admin: AdminConfig,

    pub security: SecurityConfig,

    /// CRM proxy settings.
    pub crm: CrmConfig,

    /// Third-party HTTP APIs the gateway can call.
    pub upstreams: Vec<UpstreamConfig>,

    /// Document database probed by the `mongodb` probe.
    pub database: DatabaseConfig,

    /// Inbound webhook providers.
    pub webhooks: WebhookConfig,

    /// Inventory seed. Empty means the built-in seed table.
    pub inventory: Vec<InventoryItemConfig>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            listener: ListenerConfig::default(),
            timeouts: TimeoutConfig::default(),
            rate_limit: RateLimitConfig::default(),
            retries: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            observability: ObservabilityConfig::default(),
            admin: AdminConfig::default(),
            security: SecurityConfig::default(),
            crm: CrmConfig::default(),
            upstreams: default_upstreams(),
            database: DatabaseConfig::default(),
            webhooks: WebhookConfig::default(),
            inventory: Vec::new(),
        }
    }
}

impl GatewayConfig {
    /// True when running with production error redaction.
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Look up an upstream definition by name.
    pub fn upstream(&self, name: &str) -> Option<&UpstreamConfig> {
        self.upstreams.iter().find(|u| u.name == name)
    }

    pub fn upstream_mut(&mut self, name: &str) -> Option<&mut UpstreamConfig> {
        self.upstreams.iter_mut().find(|u| u.name == name)
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed for an inbound request, in seconds.
    pub request_secs: u64,

    /// Default deadline for a single upstream call, in milliseconds.
    pub upstream_ms: u64,

    /// Deadline for a probe, in milliseconds.
    pub probe_ms: u64,

    /// TCP connect timeout for upstream connections, in milliseconds.
    pub connect_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            upstream_ms: 15_000,
            probe_ms: 10_000,
            connect_ms: 5_000,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Sustained requests per second per client IP.
    pub requests_per_second: u32,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            requests_per_second: 20,
            burst_size: 40,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Enable retries.
    pub enabled: bool,

    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Percentage of requests that can be retries (retry budget).
    /// e.g., 0.1 for 10% budget.
    pub budget_ratio: f32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            base_delay_ms: 100,
            max_delay_ms: 2000,
            budget_ratio: 0.1,
        }
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Failure ratio (0..=1) over the rolling window that opens the circuit.
    pub failure_ratio: f64,

    /// Minimum calls in the window before the ratio is considered.
    pub minimum_calls: u32,

    /// Rolling window length in seconds.
    pub window_secs: u64,

    /// Time spent open before a trial call is allowed, in seconds.
    pub reset_timeout_secs: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_ratio: 0.5,
            minimum_calls: 10,
            window_secs: 60,
            reset_timeout_secs: 30,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Console format: "pretty" or "json".
    pub log_format: String,

    /// Directory for daily-rotated log files. Disabled when unset.
    pub log_dir: Option<String>,

    /// Install the Prometheus recorder.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: "pretty".to_string(),
            log_dir: None,
            metrics_enabled: true,
        }
    }
}

/// Operational endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// API key for `/metrics` and `/api/circuit-breakers`.
    pub api_key: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            // WARNING: This is a placeholder! Operational endpoints stay locked until it is changed.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
        }
    }
}

/// Security hardening configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Enable security headers.
    pub enable_headers: bool,
    /// Maximum body size in bytes.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            enable_headers: true,
            max_body_size: 1024 * 1024, // 1MB
        }
    }
}

/// CRM proxy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CrmConfig {
    /// Upstream name; also the `{crm}` segment of `/api/{crm}/...`.
    pub upstream: String,

    /// Page size when `limit` is absent.
    pub default_limit: u32,

    /// Upper bound applied to `limit`.
    pub max_limit: u32,
}

impl Default for CrmConfig {
    fn default() -> Self {
        Self {
            upstream: "crm".to_string(),
            default_limit: 20,
            max_limit: 100,
        }
    }
}

/// How a credential is attached to upstream requests.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthScheme {
    /// No credential.
    #[default]
    None,
    /// `Authorization: Bearer <key>`.
    Bearer,
    /// Custom header carrying the raw key.
    Header { name: String },
    /// Query parameter carrying the raw key.
    Query { param: String },
}

/// One third-party HTTP API.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Unique name; doubles as probe name and breaker name.
    pub name: String,

    /// Base URL. Empty means "not configured".
    #[serde(default)]
    pub base_url: String,

    #[serde(default)]
    pub auth: AuthScheme,

    /// Credential. Usually supplied through the environment.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable holding the credential.
    /// Defaults to `<NAME>_API_KEY`.
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Static headers sent on every request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Provider parameters (e.g. `location_id`), substituted into
    /// `{param}` placeholders of the probe path.
    #[serde(default)]
    pub params: BTreeMap<String, String>,

    /// Path requested by the connectivity probe.
    #[serde(default = "default_probe_path")]
    pub probe_path: String,

    /// Field unwrapped from the probe response (e.g. `data`).
    #[serde(default)]
    pub unwrap_field: Option<String>,

    /// Per-upstream call timeout override in milliseconds.
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_probe_path() -> String {
    "/".to_string()
}

impl UpstreamConfig {
    /// Environment variable consulted for the credential.
    pub fn credential_env(&self) -> String {
        self.api_key_env
            .clone()
            .unwrap_or_else(|| format!("{}_API_KEY", env_prefix(&self.name)))
    }
}

/// `open-ai` → `OPEN_AI`.
pub fn env_prefix(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
        .collect()
}

fn headers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Built-in upstream definitions. Credentials come from the environment.
pub fn default_upstreams() -> Vec<UpstreamConfig> {
    vec![
        UpstreamConfig {
            name: "crm".to_string(),
            base_url: "https://services.leadconnectorhq.com".to_string(),
            auth: AuthScheme::Bearer,
            api_key: None,
            api_key_env: None,
            headers: headers(&[("Version", "2021-07-28"), ("Accept", "application/json")]),
            params: BTreeMap::new(),
            probe_path: "/locations/{location_id}".to_string(),
            unwrap_field: Some("location".to_string()),
            timeout_ms: None,
        },
        UpstreamConfig {
            name: "openai".to_string(),
            base_url: "https://api.openai.com/v1".to_string(),
            auth: AuthScheme::Bearer,
            api_key: None,
            api_key_env: None,
            headers: BTreeMap::new(),
            params: BTreeMap::new(),
            probe_path: "/models".to_string(),
            unwrap_field: Some("data".to_string()),
            timeout_ms: None,
        },
        UpstreamConfig {
            name: "anthropic".to_string(),
            base_url: "https://api.anthropic.com/v1".to_string(),
            auth: AuthScheme::Header {
                name: "x-api-key".to_string(),
            },
            api_key: None,
            api_key_env: None,
            headers: headers(&[("anthropic-version", "2023-06-01")]),
            params: BTreeMap::new(),
            probe_path: "/models".to_string(),
            unwrap_field: Some("data".to_string()),
            timeout_ms: None,
        },
        UpstreamConfig {
            name: "pinecone".to_string(),
            base_url: "https://api.pinecone.io".to_string(),
            auth: AuthScheme::Header {
                name: "Api-Key".to_string(),
            },
            api_key: None,
            api_key_env: None,
            headers: headers(&[("X-Pinecone-API-Version", "2024-07")]),
            params: BTreeMap::new(),
            probe_path: "/indexes".to_string(),
            unwrap_field: Some("indexes".to_string()),
            timeout_ms: None,
        },
        UpstreamConfig {
            name: "shopify".to_string(),
            // Store specific; set from SHOPIFY_STORE_DOMAIN.
            base_url: String::new(),
            auth: AuthScheme::Header {
                name: "X-Shopify-Access-Token".to_string(),
            },
            api_key: None,
            api_key_env: Some("SHOPIFY_ACCESS_TOKEN".to_string()),
            headers: BTreeMap::new(),
            params: BTreeMap::new(),
            probe_path: "/shop.json".to_string(),
            unwrap_field: Some("shop".to_string()),
            timeout_ms: None,
        },
    ]
}

/// Document database settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Probe name under which the database is checked.
    pub probe_name: String,

    /// Connection string (`mongodb://` or `mongodb+srv://`).
    pub uri: Option<String>,

    /// Maximum connections held by the driver pool.
    pub max_pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            probe_name: "mongodb".to_string(),
            uri: None,
            max_pool_size: 10,
        }
    }
}

/// Inbound webhook settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebhookConfig {
    /// Reject a signature seen again within this many seconds. 0 disables.
    pub replay_window_secs: u64,

    pub providers: Vec<WebhookProviderConfig>,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            replay_window_secs: 300,
            providers: vec![
                WebhookProviderConfig {
                    name: "crm".to_string(),
                    signature_header: "x-crm-signature".to_string(),
                    secret: None,
                    skip_verification: false,
                },
                WebhookProviderConfig {
                    name: "shopify".to_string(),
                    signature_header: "x-shopify-hmac-sha256".to_string(),
                    secret: None,
                    skip_verification: false,
                },
            ],
        }
    }
}

/// One webhook provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WebhookProviderConfig {
    /// Path segment of `/api/webhooks/{provider}`.
    pub name: String,

    /// Header carrying the HMAC signature.
    pub signature_header: String,

    /// Shared secret. Usually supplied as `<NAME>_WEBHOOK_SECRET`.
    #[serde(default)]
    pub secret: Option<String>,

    /// Accept unsigned deliveries. Logged as a security warning.
    #[serde(default)]
    pub skip_verification: bool,
}

/// Inventory seed row.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InventoryItemConfig {
    pub sku: String,
    pub name: String,
    pub category: String,
    pub quantity: u32,
    pub reorder_point: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config: GatewayConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "0.0.0.0:3000");
        assert_eq!(config.upstreams.len(), 5);
        assert_eq!(config.crm.upstream, "crm");
        assert!(!config.is_production());
    }

    #[test]
    fn test_auth_scheme_parsing() {
        let config: GatewayConfig = toml::from_str(
            r#"
            environment = "production"

            [[upstreams]]
            name = "search"
            base_url = "https://search.example.com"
            auth = { type = "query", param = "key" }
            "#,
        )
        .unwrap();

        assert!(config.is_production());
        assert_eq!(config.upstreams.len(), 1);
        let search = config.upstream("search").unwrap();
        assert_eq!(
            search.auth,
            AuthScheme::Query {
                param: "key".to_string()
            }
        );
        assert_eq!(search.probe_path, "/");
        assert_eq!(search.credential_env(), "SEARCH_API_KEY");
    }

    #[test]
    fn test_placeholder_detection() {
        assert!(is_placeholder(""));
        assert!(is_placeholder("CHANGE_ME"));
        assert!(is_placeholder("CHANGE_ME_IN_PRODUCTION"));
        assert!(!is_placeholder("s3cr3t"));
        assert_eq!(env_prefix("open-ai"), "OPEN_AI");
    }
}
