//! HTTP surface.
//!
//! ```text
//! TCP/TLS connection
//!     → server.rs (middleware stack, catch-all dispatcher)
//!     → routing::RouteTable (method + path → Endpoint)
//!     → handlers/* (parse with request.rs, call services)
//!     → response.rs envelopes, or GatewayError
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestIdExt, X_REQUEST_ID};
pub use server::{build_router, AppState, GatewayServer};
