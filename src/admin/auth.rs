//! API-key guard for the operational endpoints.

use axum::http::{header, HeaderMap, Uri};
use subtle::ConstantTimeEq;

use crate::config::{is_placeholder, AdminConfig};
use crate::error::{ErrorKind, GatewayError};

const API_KEY_HEADER: &str = "x-api-key";
const API_KEY_PARAM: &str = "api_key";

/// The caller's key: `X-API-Key`, then `Authorization: Bearer`, then `?api_key=`.
fn presented_key<'a>(headers: &'a HeaderMap, uri: &'a Uri) -> Option<&'a str> {
    if let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(key.trim());
    }
    if let Some(token) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim());
    }
    uri.query()?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(name, _)| *name == API_KEY_PARAM)
        .map(|(_, value)| value)
}

/// Check the caller against the configured key.
///
/// A placeholder key locks the endpoints entirely (403) rather than leaving
/// them open.
pub fn authorize(config: &AdminConfig, headers: &HeaderMap, uri: &Uri) -> Result<(), GatewayError> {
    if is_placeholder(&config.api_key) {
        return Err(GatewayError::new(
            ErrorKind::Authorization,
            "operational endpoints are disabled until METRICS_API_KEY is set",
        ));
    }

    let presented = presented_key(headers, uri)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| GatewayError::unauthorized("API key required"))?;

    if bool::from(presented.as_bytes().ct_eq(config.api_key.as_bytes())) {
        Ok(())
    } else {
        tracing::warn!(path = %uri.path(), "Rejected operational request with invalid API key");
        Err(GatewayError::unauthorized("invalid API key"))
    }
}
