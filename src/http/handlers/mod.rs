//! Endpoint implementations, called by the dispatcher in `server.rs`.
//!
//! Each handler takes the pieces of the request it needs and returns
//! `Result<Response, GatewayError>`; the dispatcher renders errors.

pub mod crm;
pub mod health;
pub mod inventory;
pub mod probes;
pub mod webhooks;
