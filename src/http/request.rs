//! Request parsing helpers.
//!
//! Handlers receive the raw `Request` from the catch-all dispatcher and pull
//! out what they need here, so parse failures share one error shape.

use axum::extract::{Query, Request};
use axum::http::{HeaderName, Uri};
use serde::de::DeserializeOwned;
use tower_http::request_id::RequestId;

use crate::error::GatewayError;
use crate::security::read_body_limited;

/// Correlation header set on every request and echoed on every response.
pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Access to the request id assigned by the request-id layer.
pub trait RequestIdExt {
    fn request_id(&self) -> &str;
}

impl<B> RequestIdExt for axum::http::Request<B> {
    fn request_id(&self) -> &str {
        self.extensions()
            .get::<RequestId>()
            .and_then(|id| id.header_value().to_str().ok())
            .unwrap_or("unknown")
    }
}

/// Deserialize the query string.
pub fn parse_query<T: DeserializeOwned>(uri: &Uri) -> Result<T, GatewayError> {
    Query::<T>::try_from_uri(uri)
        .map(|Query(query)| query)
        .map_err(|e| GatewayError::validation(format!("invalid query string: {}", e.body_text())))
}

/// Buffer and deserialize a JSON body. An empty body yields `T::default()`.
pub async fn read_json<T>(request: Request, limit: usize) -> Result<T, GatewayError>
where
    T: DeserializeOwned + Default,
{
    let bytes = read_body_limited(request.into_body(), limit).await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(&bytes)
        .map_err(|e| GatewayError::validation(format!("invalid JSON body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    struct Sample {
        sku: Option<String>,
        limit: Option<u32>,
    }

    #[test]
    fn test_parse_query() {
        let uri: Uri = "/inventory?sku=FBS-001&limit=5".parse().unwrap();
        let sample: Sample = parse_query(&uri).unwrap();
        assert_eq!(sample.sku.as_deref(), Some("FBS-001"));
        assert_eq!(sample.limit, Some(5));

        let bad: Uri = "/contacts?limit=many".parse().unwrap();
        assert!(parse_query::<Sample>(&bad).is_err());
    }

    #[tokio::test]
    async fn test_empty_body_defaults() {
        let request = Request::new(Body::empty());
        let sample: Sample = read_json(request, 1024).await.unwrap();
        assert!(sample.sku.is_none());
    }

    #[tokio::test]
    async fn test_malformed_body_rejected() {
        let request = Request::new(Body::from("{not json"));
        let err = read_json::<Sample>(request, 1024).await.unwrap_err();
        assert!(err.message.starts_with("invalid JSON body"));
    }

    #[test]
    fn test_missing_request_id() {
        let request = Request::new(Body::empty());
        assert_eq!(request.request_id(), "unknown");
    }
}
