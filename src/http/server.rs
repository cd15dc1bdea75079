//! HTTP server setup.
//!
//! # Responsibilities
//! - Build every subsystem from configuration into one shared `AppState`
//! - Wire up middleware (request id, tracing, panic capture, body limits,
//!   rate limiting, security headers)
//! - Dispatch every request through the gateway's route table
//! - Serve over plain TCP or TLS with graceful shutdown
//!
//! # Design Decisions
//! - A single catch-all axum route; matching lives in `RouteTable` so unknown
//!   paths get the structured 404 listing instead of axum's default
//! - Registries are constructed here and passed by `AppState`, never global
//! - The request deadline is enforced in the dispatcher so a timeout still
//!   produces the JSON error envelope

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware,
    response::Response,
    routing::any,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use serde_json::json;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::admin;
use crate::config::GatewayConfig;
use crate::crm::CrmService;
use crate::error::GatewayError;
use crate::http::handlers;
use crate::http::request::RequestIdExt;
use crate::http::response::json_response;
use crate::inventory::InventoryStore;
use crate::lifecycle::{PanicResponder, Shutdown, StartupError};
use crate::observability::metrics::{self, RequestCounters};
use crate::probes::{DatabaseProbe, ProbeRegistry};
use crate::resilience::{BreakerRegistry, BreakerSettings};
use crate::routing::{Endpoint, RouteMatch, RouteTable};
use crate::security::{rate_limit_middleware, security_headers_middleware, ClientRateLimiter};
use crate::upstream::{UpstreamClient, UpstreamRegistry, Upstreams};
use crate::webhook::WebhookRegistry;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub routes: Arc<RouteTable>,
    pub upstreams: Upstreams,
    pub probes: Arc<ProbeRegistry>,
    pub crm: Arc<CrmService>,
    pub inventory: Arc<InventoryStore>,
    pub webhooks: Arc<WebhookRegistry>,
    pub counters: Arc<RequestCounters>,
    pub limiter: Option<Arc<ClientRateLimiter>>,
    pub started_at: Instant,
    pub shutdown: Shutdown,
}

impl AppState {
    /// Build every subsystem in dependency order.
    pub fn from_config(config: GatewayConfig, shutdown: Shutdown) -> Result<Self, StartupError> {
        let client = UpstreamClient::new(&config.timeouts, &config.retries)?;
        let registry = Arc::new(UpstreamRegistry::from_config(&config)?);
        let breakers = Arc::new(BreakerRegistry::new(BreakerSettings::from(&config.circuit_breaker)));
        let upstreams = Upstreams::new(client, registry, breakers);

        let probes = ProbeRegistry::new(
            upstreams.clone(),
            DatabaseProbe::new(&config.database),
            Duration::from_millis(config.timeouts.probe_ms),
        );
        let crm = CrmService::new(upstreams.clone(), config.crm.clone());
        let routes = RouteTable::gateway(crm.name());
        let inventory = InventoryStore::from_config(&config.inventory)?;
        let webhooks = WebhookRegistry::from_config(&config.webhooks);
        let limiter = ClientRateLimiter::from_config(&config.rate_limit).map(Arc::new);

        let configured: Vec<&str> = upstreams
            .registry()
            .iter()
            .filter(|spec| spec.is_configured())
            .map(|spec| spec.name.as_str())
            .collect();
        tracing::info!(
            upstreams = ?configured,
            inventory_items = inventory.items().len(),
            rate_limited = limiter.is_some(),
            "Subsystems initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            routes: Arc::new(routes),
            upstreams,
            probes: Arc::new(probes),
            crm: Arc::new(crm),
            inventory: Arc::new(inventory),
            webhooks: Arc::new(webhooks),
            counters: Arc::new(RequestCounters::default()),
            limiter,
            started_at: Instant::now(),
            shutdown,
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Error details are rendered everywhere except production.
    pub fn expose_details(&self) -> bool {
        !self.config.is_production()
    }
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    state: AppState,
    router: Router,
}

impl GatewayServer {
    pub fn new(state: AppState) -> Self {
        let router = build_router(state.clone());
        Self { state, router }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The fully layered router, for in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve plain HTTP until shutdown is triggered, then drain.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = %self.state.config.environment,
            "HTTP server starting"
        );

        let shutdown = self.state.shutdown.clone();
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { shutdown.wait().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS until shutdown is triggered. In-flight requests get the
    /// request deadline to finish.
    pub async fn run_tls(self, addr: SocketAddr, tls: RustlsConfig) -> Result<(), std::io::Error> {
        tracing::info!(
            address = %addr,
            environment = %self.state.config.environment,
            "HTTPS server starting"
        );

        let handle = axum_server::Handle::new();
        let drain = Duration::from_secs(self.state.config.timeouts.request_secs);
        let shutdown = self.state.shutdown.clone();
        tokio::spawn({
            let handle = handle.clone();
            async move {
                shutdown.wait().await;
                handle.graceful_shutdown(Some(drain));
            }
        });

        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers, outermost first.
pub fn build_router(state: AppState) -> Router {
    let max_body = state.config.security.max_body_size;
    let headers_enabled = state.config.security.enable_headers;
    let limiter = state.limiter.clone();
    let panic_responder = PanicResponder::new(state.shutdown.clone());

    let middleware_stack = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %request.request_id(),
            )
        }))
        .layer(CatchPanicLayer::custom(panic_responder))
        .layer(RequestBodyLimitLayer::new(max_body));

    Router::new()
        .route("/{*path}", any(gateway_handler))
        .route("/", any(gateway_handler))
        .with_state(state)
        .layer(middleware::from_fn_with_state(limiter, rate_limit_middleware))
        .layer(middleware::from_fn_with_state(headers_enabled, security_headers_middleware))
        .layer(middleware_stack)
}

/// Every request lands here and is dispatched through the route table.
async fn gateway_handler(State(state): State<AppState>, request: Request) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    let Some(route) = state.routes.dispatch(&method, &path) else {
        tracing::debug!(method = %method, path = %path, "No route matched");
        let response = not_found(&state, &method, &path);
        state.counters.record(response.status().as_u16());
        metrics::record_request("unmatched", method.as_str(), response.status().as_u16(), start);
        return response;
    };

    let label = route.endpoint.label();
    let deadline = Duration::from_secs(state.config.timeouts.request_secs);
    let result = match tokio::time::timeout(deadline, dispatch(&state, route, request)).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::unavailable(format!(
            "request exceeded {}s deadline",
            deadline.as_secs()
        ))
        .with_status(StatusCode::GATEWAY_TIMEOUT)),
    };

    let response = match result {
        Ok(response) => response,
        Err(err) => {
            if err.status.is_server_error() {
                tracing::error!(endpoint = label, kind = ?err.kind, details = ?err.details, "Request failed");
            } else {
                tracing::debug!(endpoint = label, kind = ?err.kind, message = %err.message, "Request rejected");
            }
            err.to_response(state.expose_details())
        }
    };

    let status = response.status().as_u16();
    state.counters.record(status);
    metrics::record_request(label, method.as_str(), status, start);
    response
}

async fn dispatch(state: &AppState, route: RouteMatch, request: Request) -> Result<Response, GatewayError> {
    let RouteMatch { endpoint, params } = route;
    match endpoint {
        Endpoint::Health => handlers::health::health(state, request.uri()).await,
        Endpoint::TestProbe => handlers::probes::test_probe(state, &params).await,
        Endpoint::ListContacts => handlers::crm::list_contacts(state, request.uri()).await,
        Endpoint::GetContact => handlers::crm::get_contact(state, &params).await,
        Endpoint::CreateContact => handlers::crm::create_contact(state, request).await,
        Endpoint::ListOpportunities => handlers::crm::list_opportunities(state, request.uri()).await,
        Endpoint::ListTasks => handlers::crm::list_tasks(state, request.uri()).await,
        Endpoint::CrmStats => handlers::crm::stats(state).await,
        Endpoint::InventoryCheck => handlers::inventory::check(state, request).await,
        Endpoint::InventoryLowStock => handlers::inventory::low_stock(state).await,
        Endpoint::Webhook => handlers::webhooks::receive(state, &params, request).await,
        Endpoint::Metrics => admin::handlers::metrics(state, request.headers(), request.uri()).await,
        Endpoint::CircuitBreakers => {
            admin::handlers::circuit_breakers(state, request.headers(), request.uri()).await
        }
    }
}

/// Structured 404 listing every known endpoint.
fn not_found(state: &AppState, method: &Method, path: &str) -> Response {
    json_response(
        StatusCode::NOT_FOUND,
        json!({
            "success": false,
            "error": {
                "kind": "NOT_FOUND",
                "message": format!("No endpoint for {} {}", method, path),
            },
            "endpoints": state.routes.endpoints(),
        }),
    )
}
