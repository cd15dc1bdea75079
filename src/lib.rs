//! Outbound integration gateway.
//!
//! One HTTP front door for a set of third-party APIs (CRM, LLM providers,
//! vector store, commerce) with uniform timeouts, retries, circuit breaking,
//! health probes and signed inbound webhooks.

// Core subsystems
pub mod config;
pub mod error;
pub mod http;
pub mod net;
pub mod routing;

// Integrations
pub mod crm;
pub mod inventory;
pub mod probes;
pub mod upstream;
pub mod webhook;

// Cross-cutting concerns
pub mod admin;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod security;

pub use config::GatewayConfig;
pub use error::{ErrorKind, GatewayError};
pub use http::{AppState, GatewayServer};
pub use lifecycle::Shutdown;
