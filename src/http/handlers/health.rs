use axum::http::{StatusCode, Uri};
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;

use crate::error::GatewayError;
use crate::http::request::parse_query;
use crate::http::response::{json_response, timestamp};
use crate::http::server::AppState;

#[derive(Debug, Default, Deserialize)]
struct HealthQuery {
    #[serde(default)]
    deep: bool,
}

/// Liveness, plus every probe when `?deep=true`.
///
/// Unconfigured probes are reported but never make the gateway unhealthy.
pub async fn health(state: &AppState, uri: &Uri) -> Result<Response, GatewayError> {
    let query: HealthQuery = parse_query(uri)?;

    let mut body = json!({
        "status": "ok",
        "timestamp": timestamp(),
        "uptime": state.uptime_secs(),
        "version": env!("CARGO_PKG_VERSION"),
    });
    if !query.deep {
        return Ok(json_response(StatusCode::OK, body));
    }

    let checks = state.probes.probe_all().await;
    let degraded = checks.iter().any(|c| c.configured && !c.result.success);
    body["status"] = json!(if degraded { "degraded" } else { "ok" });
    body["checks"] = json!(checks);

    let status = if degraded {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    Ok(json_response(status, body))
}
