//! Request body limits.
//!
//! The tower-http body limit layer rejects oversized requests that declare a
//! `Content-Length`. Streaming bodies are capped again when buffered here.

use std::error::Error as StdError;

use axum::body::{Body, Bytes};
use axum::http::StatusCode;
use http_body_util::LengthLimitError;

use crate::error::GatewayError;

fn is_length_limit(err: &axum::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(current) = source {
        if current.is::<LengthLimitError>() {
            return true;
        }
        source = current.source();
    }
    false
}

/// Buffer a request body. Anything above `limit` bytes is a 413; a body that
/// fails to arrive (client reset, stream error) is a 400.
pub async fn read_body_limited(body: Body, limit: usize) -> Result<Bytes, GatewayError> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        if is_length_limit(&e) {
            tracing::debug!(limit, "Request body over limit");
            GatewayError::validation(format!("request body exceeds {} bytes", limit))
                .with_status(StatusCode::PAYLOAD_TOO_LARGE)
        } else {
            tracing::debug!(error = %e, "Request body could not be read");
            GatewayError::validation("request body could not be read")
        }
    })
}
