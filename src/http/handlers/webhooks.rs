//! `POST /api/webhooks/{provider}`.

use axum::extract::Request;
use axum::http::HeaderMap;
use axum::response::Response;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::GatewayError;
use crate::http::response::{json_response, timestamp};
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::routing::PathParams;
use crate::security::read_body_limited;
use crate::webhook::Verification;

/// Provider delivery id headers, checked when the payload carries none.
const DELIVERY_ID_HEADERS: &[&str] = &["x-shopify-webhook-id", "x-webhook-id", "x-event-id"];

fn event_id(payload: &Value, headers: &HeaderMap) -> String {
    ["id", "eventId", "event_id"]
        .iter()
        .find_map(|key| match payload.get(key) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
        .or_else(|| {
            DELIVERY_ID_HEADERS
                .iter()
                .find_map(|h| headers.get(*h).and_then(|v| v.to_str().ok()))
                .map(str::to_string)
        })
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn event_type(payload: &Value, headers: &HeaderMap) -> Option<String> {
    payload
        .get("type")
        .or_else(|| payload.get("event"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| {
            headers
                .get("x-shopify-topic")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
}

/// Verify against the raw bytes first; the payload is only parsed once the
/// signature holds.
pub async fn receive(state: &AppState, params: &PathParams, request: Request) -> Result<Response, GatewayError> {
    let name = params.get("provider").unwrap_or_default();
    let provider = state
        .webhooks
        .get(name)
        .ok_or_else(|| GatewayError::not_found(format!("unknown webhook provider '{}'", name)))?;

    let (parts, body) = request.into_parts();
    let raw = read_body_limited(body, state.config.security.max_body_size).await?;

    let verification = state.webhooks.check(provider, &parts.headers, &raw);
    metrics::record_webhook(provider.name(), verification.outcome_label());
    match verification {
        Verification::Verified | Verification::Skipped => {}
        Verification::Rejected(reason) => {
            tracing::warn!(provider = provider.name(), reason, "Webhook rejected");
            return Err(GatewayError::unauthorized("webhook signature verification failed")
                .with_details(json!({ "reason": reason })));
        }
        Verification::Replayed => {
            tracing::warn!(provider = provider.name(), "Webhook replay rejected");
            return Err(GatewayError::conflict("webhook delivery already processed"));
        }
    }

    let payload: Value = if raw.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&raw)
            .map_err(|e| GatewayError::validation(format!("invalid JSON body: {}", e)))?
    };

    let event_id = event_id(&payload, &parts.headers);
    tracing::info!(
        provider = provider.name(),
        event_id = %event_id,
        event_type = ?event_type(&payload, &parts.headers),
        verified = verification == Verification::Verified,
        "Webhook received"
    );

    Ok(json_response(
        axum::http::StatusCode::OK,
        json!({
            "success": true,
            "received": true,
            "provider": provider.name(),
            "eventId": event_id,
            "timestamp": timestamp(),
        }),
    ))
}
