//! `/api/{crm}/...` endpoints.

use axum::extract::Request;
use axum::http::{StatusCode, Uri};
use axum::response::Response;
use serde_json::{json, Map, Value};

use crate::crm::{ContactListQuery, CreateContactRequest, OpportunityQuery, TaskQuery};
use crate::error::GatewayError;
use crate::http::request::{parse_query, read_json};
use crate::http::response::{ok, ok_with};
use crate::http::server::AppState;
use crate::routing::PathParams;

fn fields<const N: usize>(pairs: [(&str, Value); N]) -> Map<String, Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

pub async fn list_contacts(state: &AppState, uri: &Uri) -> Result<Response, GatewayError> {
    let query: ContactListQuery = parse_query(uri)?;
    let page = state.crm.list_contacts(&query).await?;
    Ok(ok_with(
        StatusCode::OK,
        page.data,
        fields([
            ("total", json!(page.total)),
            ("limit", json!(page.limit)),
            ("offset", json!(page.offset)),
        ]),
    ))
}

pub async fn get_contact(state: &AppState, params: &PathParams) -> Result<Response, GatewayError> {
    let contact_id = params.get("contactId").unwrap_or_default();
    Ok(ok(state.crm.get_contact(contact_id).await?))
}

pub async fn create_contact(state: &AppState, request: Request) -> Result<Response, GatewayError> {
    let body: CreateContactRequest = read_json(request, state.config.security.max_body_size).await?;
    let contact = state.crm.create_contact(&body).await?;
    tracing::info!(crm = state.crm.name(), "Contact created");
    Ok(ok_with(StatusCode::CREATED, contact, Map::new()))
}

pub async fn list_opportunities(state: &AppState, uri: &Uri) -> Result<Response, GatewayError> {
    let query: OpportunityQuery = parse_query(uri)?;
    let mut result = state.crm.list_opportunities(&query).await?;
    let total = result["total"].take();
    Ok(ok_with(
        StatusCode::OK,
        result["data"].take(),
        fields([("total", total)]),
    ))
}

pub async fn list_tasks(state: &AppState, uri: &Uri) -> Result<Response, GatewayError> {
    let query: TaskQuery = parse_query(uri)?;
    let tasks = state.crm.list_tasks(&query).await?;
    let total = tasks.as_array().map_or(0, Vec::len);
    Ok(ok_with(StatusCode::OK, tasks, fields([("total", json!(total))])))
}

pub async fn stats(state: &AppState) -> Result<Response, GatewayError> {
    Ok(ok(state.crm.stats().await?))
}
