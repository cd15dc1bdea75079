//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (ordered table lookup)
//!     → matcher.rs (segment match, {param} capture)
//!     → Return: RouteMatch{endpoint, params} or None (404 with listing)
//!
//! Route Compilation (at startup):
//!     RouteTable::gateway(crm upstream name)
//!     → Compile patterns into segments
//!     → Freeze as immutable table shared via Arc
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: same input always matches same route
//! - First match wins (registration order)

pub mod matcher;
pub mod router;

pub use matcher::{PathParams, PathPattern};
pub use router::{Endpoint, RouteMatch, RouteTable};
