use axum::extract::Request;
use axum::http::StatusCode;
use axum::response::Response;
use serde_json::json;

use crate::error::GatewayError;
use crate::http::request::read_json;
use crate::http::response::ok_with;
use crate::http::server::AppState;
use crate::inventory::{InventoryItem, InventoryQuery};

fn listing(items: Vec<&InventoryItem>) -> Response {
    let count = items.len();
    let mut extra = serde_json::Map::new();
    extra.insert("count".to_string(), json!(count));
    ok_with(StatusCode::OK, json!(items), extra)
}

/// `POST /api/inventory/check`. An unknown SKU is an empty list, not a 404.
pub async fn check(state: &AppState, request: Request) -> Result<Response, GatewayError> {
    let query: InventoryQuery = read_json(request, state.config.security.max_body_size).await?;
    Ok(listing(state.inventory.check(&query)))
}

pub async fn low_stock(state: &AppState) -> Result<Response, GatewayError> {
    Ok(listing(state.inventory.low_stock()))
}
