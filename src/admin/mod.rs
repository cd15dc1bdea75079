//! Operational surface, guarded by the admin API key.

pub mod auth;
pub mod handlers;
