//! Operational endpoints: `/metrics` and `/api/circuit-breakers`.

use axum::http::{header, HeaderMap, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;

use crate::admin::auth::authorize;
use crate::error::GatewayError;
use crate::http::request::parse_query;
use crate::http::response::{ok, timestamp};
use crate::http::server::AppState;
use crate::observability::metrics::render_prometheus;
use crate::resilience::CircuitState;

#[derive(Debug, Default, Deserialize)]
struct MetricsQuery {
    format: Option<String>,
}

/// Process and traffic metrics, as JSON or (`?format=prometheus`) text.
pub async fn metrics(state: &AppState, headers: &HeaderMap, uri: &Uri) -> Result<Response, GatewayError> {
    authorize(&state.config.admin, headers, uri)?;
    let query: MetricsQuery = parse_query(uri)?;

    if query.format.as_deref() == Some("prometheus") {
        let text = render_prometheus()
            .ok_or_else(|| GatewayError::unavailable("Prometheus recorder is not installed"))?;
        return Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response());
    }

    Ok(ok(json!({
        "timestamp": timestamp(),
        "uptime": state.uptime_secs(),
        "pid": std::process::id(),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "requests": state.counters.snapshot(),
        "circuitBreakers": state.upstreams.breakers().snapshots(),
    })))
}

/// Every breaker that has seen traffic, with per-state totals.
pub async fn circuit_breakers(state: &AppState, headers: &HeaderMap, uri: &Uri) -> Result<Response, GatewayError> {
    authorize(&state.config.admin, headers, uri)?;

    let breakers = state.upstreams.breakers().snapshots();
    let count = |wanted: CircuitState| breakers.iter().filter(|b| b.state == wanted).count();
    let (open, half_open, closed) = (
        count(CircuitState::Open),
        count(CircuitState::HalfOpen),
        count(CircuitState::Closed),
    );

    Ok(ok(json!({
        "breakers": breakers,
        "totalOpen": open,
        "totalHalfOpen": half_open,
        "totalClosed": closed,
    })))
}
