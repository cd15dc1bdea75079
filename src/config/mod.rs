//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (environment overrides: credentials, ports, secrets)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; there is no runtime reload
//! - All fields have defaults to allow minimal configs
//! - Secrets are expected from the environment, never committed to files
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    is_placeholder, AdminConfig, AuthScheme, CircuitBreakerConfig, CrmConfig, DatabaseConfig,
    GatewayConfig, InventoryItemConfig, ListenerConfig, ObservabilityConfig, RateLimitConfig,
    RetryConfig, SecurityConfig, TimeoutConfig, TlsConfig, UpstreamConfig, WebhookConfig,
    WebhookProviderConfig,
};
