//! Inbound request protection: rate limiting, body caps and response hardening.

pub mod headers;
pub mod limits;
pub mod rate_limit;

pub use headers::security_headers_middleware;
pub use limits::read_body_limited;
pub use rate_limit::{rate_limit_middleware, ClientRateLimiter};
