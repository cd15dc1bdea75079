use axum::http::StatusCode;
use axum::response::Response;
use serde_json::{json, Value};

use crate::error::GatewayError;
use crate::http::response::{json_response, timestamp};
use crate::http::server::AppState;
use crate::routing::PathParams;

/// `GET /api/test/{probeName}`: 200 on success, 500 otherwise.
pub async fn test_probe(state: &AppState, params: &PathParams) -> Result<Response, GatewayError> {
    let name = params
        .get("probeName")
        .ok_or_else(|| GatewayError::validation("probe name is required"))?;

    let result = state.probes.probe(name).await;
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    let mut body = json!({
        "service": name,
        "success": result.success,
        "timestamp": timestamp(),
    });
    match (result.data, result.error) {
        (Some(data), _) => body["data"] = data,
        (None, Some(error)) => body["error"] = Value::String(error),
        (None, None) => {}
    }
    Ok(json_response(status, body))
}
