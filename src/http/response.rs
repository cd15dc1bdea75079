//! Success envelopes.
//!
//! Every JSON response carries `success`; successful ones put the payload
//! under `data` with any paging fields alongside.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};

/// Current time as RFC 3339 with millisecond precision.
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn json_response(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

/// `{"success": true, "data": ...}` with status 200.
pub fn ok<T: Serialize>(data: T) -> Response {
    json_response(StatusCode::OK, json!({ "success": true, "data": data }))
}

/// `{"success": true, "data": ..., <extra fields>}`.
pub fn ok_with(status: StatusCode, data: Value, extra: Map<String, Value>) -> Response {
    let mut body = Map::new();
    body.insert("success".to_string(), Value::Bool(true));
    body.insert("data".to_string(), data);
    body.extend(extra);
    json_response(status, Value::Object(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_format() {
        let ts = timestamp();
        assert!(ts.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok());
    }

    #[test]
    fn test_ok_with_extra_fields() {
        let mut extra = Map::new();
        extra.insert("count".to_string(), json!(2));
        let response = ok_with(StatusCode::CREATED, json!([1, 2]), extra);
        assert_eq!(response.status(), StatusCode::CREATED);
    }
}
