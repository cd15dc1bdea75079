//! Network layer.
//!
//! Plain listeners are bound in `lifecycle::startup`; this module covers the
//! optional TLS termination handed to `axum-server`.

pub mod tls;

pub use tls::load_tls_config;
