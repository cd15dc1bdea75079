//! Route lookup and dispatch.
//!
//! # Responsibilities
//! - Store the ordered endpoint table
//! - Look up the endpoint for a method and path
//! - List every known endpoint for 404 responses
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - First registered match wins
//! - A known path with the wrong method is a plain miss
//! - Explicit `None` rather than a silent default

use axum::http::Method;

use crate::routing::matcher::{PathParams, PathPattern};

/// Every operation the gateway serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Health,
    TestProbe,
    ListContacts,
    GetContact,
    CreateContact,
    ListOpportunities,
    ListTasks,
    CrmStats,
    InventoryCheck,
    InventoryLowStock,
    Webhook,
    Metrics,
    CircuitBreakers,
}

impl Endpoint {
    /// Stable label for metrics and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Endpoint::Health => "health",
            Endpoint::TestProbe => "test_probe",
            Endpoint::ListContacts => "crm_contacts_list",
            Endpoint::GetContact => "crm_contacts_get",
            Endpoint::CreateContact => "crm_contacts_create",
            Endpoint::ListOpportunities => "crm_opportunities",
            Endpoint::ListTasks => "crm_tasks",
            Endpoint::CrmStats => "crm_stats",
            Endpoint::InventoryCheck => "inventory_check",
            Endpoint::InventoryLowStock => "inventory_low_stock",
            Endpoint::Webhook => "webhook",
            Endpoint::Metrics => "metrics",
            Endpoint::CircuitBreakers => "circuit_breakers",
        }
    }
}

#[derive(Debug, Clone)]
struct Route {
    method: Method,
    pattern: PathPattern,
    endpoint: Endpoint,
}

/// A dispatched request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch {
    pub endpoint: Endpoint,
    pub params: PathParams,
}

/// Ordered endpoint table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, method: Method, pattern: &str, endpoint: Endpoint) -> &mut Self {
        self.routes.push(Route {
            method,
            pattern: PathPattern::parse(pattern),
            endpoint,
        });
        self
    }

    /// The gateway's endpoint table. `crm` is the CRM path segment.
    pub fn gateway(crm: &str) -> Self {
        let crm = format!("/api/{}", crm);
        let mut table = Self::new();
        table
            .register(Method::GET, "/health", Endpoint::Health)
            .register(Method::GET, "/api/test/{probeName}", Endpoint::TestProbe)
            .register(Method::GET, &format!("{}/contacts", crm), Endpoint::ListContacts)
            .register(Method::POST, &format!("{}/contacts", crm), Endpoint::CreateContact)
            .register(Method::GET, &format!("{}/contacts/{{contactId}}", crm), Endpoint::GetContact)
            .register(Method::GET, &format!("{}/opportunities", crm), Endpoint::ListOpportunities)
            .register(Method::GET, &format!("{}/tasks", crm), Endpoint::ListTasks)
            .register(Method::GET, &format!("{}/stats", crm), Endpoint::CrmStats)
            .register(Method::POST, "/api/inventory/check", Endpoint::InventoryCheck)
            .register(Method::GET, "/api/inventory/low-stock", Endpoint::InventoryLowStock)
            .register(Method::POST, "/api/webhooks/{provider}", Endpoint::Webhook)
            .register(Method::GET, "/metrics", Endpoint::Metrics)
            .register(Method::GET, "/api/circuit-breakers", Endpoint::CircuitBreakers);
        table
    }

    pub fn dispatch(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| {
                route.pattern.matches(path).map(|params| RouteMatch {
                    endpoint: route.endpoint,
                    params,
                })
            })
    }

    /// `METHOD /path` for every route, in registration order.
    pub fn endpoints(&self) -> Vec<String> {
        self.routes
            .iter()
            .map(|route| format!("{} {}", route.method, route.pattern.as_str()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_gateway_routes() {
        let table = RouteTable::gateway("crm");

        let hit = table.dispatch(&Method::GET, "/api/test/openai").unwrap();
        assert_eq!(hit.endpoint, Endpoint::TestProbe);
        assert_eq!(hit.params.get("probeName"), Some("openai"));

        let hit = table.dispatch(&Method::GET, "/api/crm/contacts/c-9").unwrap();
        assert_eq!(hit.endpoint, Endpoint::GetContact);
        assert_eq!(hit.params.get("contactId"), Some("c-9"));

        assert_eq!(
            table.dispatch(&Method::POST, "/api/crm/contacts").unwrap().endpoint,
            Endpoint::CreateContact
        );
    }

    #[test]
    fn test_method_mismatch_is_miss() {
        let table = RouteTable::gateway("crm");
        assert!(table.dispatch(&Method::DELETE, "/api/crm/contacts").is_none());
        assert!(table.dispatch(&Method::GET, "/api/inventory/check").is_none());
        assert!(table.dispatch(&Method::GET, "/nope").is_none());
    }

    #[test]
    fn test_custom_crm_segment() {
        let table = RouteTable::gateway("ghl");
        assert!(table.dispatch(&Method::GET, "/api/ghl/stats").is_some());
        assert!(table.dispatch(&Method::GET, "/api/crm/stats").is_none());
    }

    #[test]
    fn test_endpoint_listing() {
        let endpoints = RouteTable::gateway("crm").endpoints();
        assert_eq!(endpoints.len(), 13);
        assert_eq!(endpoints[0], "GET /health");
        assert!(endpoints.contains(&"POST /api/webhooks/{provider}".to_string()));
        assert!(endpoints.contains(&"GET /api/crm/contacts/{contactId}".to_string()));
    }

    #[test]
    fn test_first_registered_wins() {
        let mut table = RouteTable::new();
        table
            .register(Method::GET, "/api/test/{probeName}", Endpoint::TestProbe)
            .register(Method::GET, "/api/test/special", Endpoint::Health);
        assert_eq!(
            table.dispatch(&Method::GET, "/api/test/special").unwrap().endpoint,
            Endpoint::TestProbe
        );
    }
}
