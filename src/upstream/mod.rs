//! Outbound upstream subsystem.
//!
//! # Data Flow
//! ```text
//! UpstreamConfig (TOML + env)
//!     → spec.rs (compile: URL, auth, headers, unwrap rule)
//!     → registry.rs (name lookup, breaker per name)
//!     → client.rs (timeout, retries, JSON decode, status mapping)
//!     → error.rs (structured failure)
//! ```
//!
//! # Design Decisions
//! - One data-driven spec per provider instead of a client type per provider
//! - Every call has a deadline; expiry drops the in-flight request
//! - Errors are values; nothing in this subsystem panics on upstream input

pub mod client;
pub mod error;
pub mod registry;
pub mod spec;

pub use client::{UpstreamClient, UpstreamRequest};
pub use error::{UpstreamError, UpstreamErrorKind, UpstreamResult};
pub use registry::{UpstreamRegistry, Upstreams};
pub use spec::UpstreamSpec;
