//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Upstream call:
//!     → circuit_breaker.rs (fail fast when the upstream is known bad)
//!     → timeouts.rs (enforce the per-call deadline)
//!     → On failure: retries.rs (idempotent only, budgeted) + backoff.rs
//!     → circuit_breaker.rs (record the outcome)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retries only for idempotent requests (GET, HEAD)
//! - Circuit breaker prevents cascading failures
//! - Breakers are per upstream name, owned by an explicit registry

pub mod backoff;
pub mod circuit_breaker;
pub mod retries;
pub mod timeouts;

pub use circuit_breaker::{BreakerRegistry, BreakerSettings, BreakerSnapshot, CircuitBreaker, CircuitState};
pub use retries::RetryBudget;
