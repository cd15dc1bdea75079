//! Client-facing error taxonomy.
//!
//! Every failure a handler can return is a [`GatewayError`] with a fixed
//! [`ErrorKind`]. Internal detail (upstream payloads, driver messages) rides in
//! `details` and is only rendered outside production.

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::upstream::UpstreamError;

/// Retry hint returned when an upstream rate-limits us.
const UPSTREAM_RETRY_AFTER_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    Authentication,
    Authorization,
    NotFound,
    Conflict,
    RateLimited,
    ServiceUnavailable,
    ExternalService,
    Database,
    Internal,
}

impl ErrorKind {
    pub fn status(&self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Authentication => StatusCode::UNAUTHORIZED,
            ErrorKind::Authorization => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::ExternalService => StatusCode::BAD_GATEWAY,
            ErrorKind::Database | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Generic message shown when no safe specific message exists.
    pub fn message(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "Invalid request",
            ErrorKind::Authentication => "Authentication required",
            ErrorKind::Authorization => "Access denied",
            ErrorKind::NotFound => "Resource not found",
            ErrorKind::Conflict => "Request conflicts with current state",
            ErrorKind::RateLimited => "Too many requests",
            ErrorKind::ServiceUnavailable => "Service temporarily unavailable",
            ErrorKind::ExternalService => "External service error",
            ErrorKind::Database => "Database error",
            ErrorKind::Internal => "Internal server error",
        }
    }

    /// Kinds caused by the client, whose specific message is safe to show.
    fn client_facing(&self) -> bool {
        matches!(
            self,
            ErrorKind::Validation
                | ErrorKind::Authentication
                | ErrorKind::Authorization
                | ErrorKind::NotFound
                | ErrorKind::Conflict
                | ErrorKind::RateLimited
        )
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind:?}: {message}")]
pub struct GatewayError {
    pub kind: ErrorKind,
    pub status: StatusCode,
    pub message: String,
    pub details: Option<Value>,
    /// Seconds for the `Retry-After` header.
    pub retry_after: Option<u64>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    kind: ErrorKind,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a Value>,
}

impl GatewayError {
    /// An error of `kind`. Server-side kinds keep the generic message and
    /// move `message` into `details`.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        let (message, details) = if kind.client_facing() {
            (message, None)
        } else {
            (kind.message().to_string(), Some(Value::String(message)))
        };
        Self {
            kind,
            status: kind.status(),
            message,
            details,
            retry_after: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self::new(ErrorKind::RateLimited, "Too many requests").with_retry_after(retry_after_secs)
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_retry_after(mut self, secs: u64) -> Self {
        self.retry_after = Some(secs.max(1));
        self
    }

    /// Render the error envelope. `details` is included only when
    /// `expose_details` is set (non-production).
    pub fn to_response(&self, expose_details: bool) -> Response {
        let error = ErrorBody {
            kind: self.kind,
            message: &self.message,
            details: self.details.as_ref().filter(|_| expose_details),
        };
        let body = json!({ "success": false, "error": error });

        let mut response = (self.status, Json(body)).into_response();
        if let Some(secs) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Production-safe rendering: never includes details.
impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        self.to_response(false)
    }
}

impl From<UpstreamError> for GatewayError {
    fn from(err: UpstreamError) -> Self {
        let details = match &err {
            UpstreamError::HttpStatus { body, status, .. } => json!({
                "upstream": err.upstream(),
                "status": status,
                "body": body,
            }),
            _ => json!({
                "upstream": err.upstream(),
                "error": err.to_string(),
            }),
        };

        let mapped = match &err {
            UpstreamError::Timeout { .. } => {
                Self::unavailable("Upstream service timed out").with_status(StatusCode::GATEWAY_TIMEOUT)
            }
            UpstreamError::CircuitOpen { .. } => Self::unavailable("Upstream circuit open"),
            UpstreamError::NotConfigured { .. } => Self::unavailable("Upstream not configured"),
            UpstreamError::HttpStatus { status: 404, .. } => Self::not_found("Resource not found"),
            UpstreamError::HttpStatus { status: 429, .. } => Self::rate_limited(UPSTREAM_RETRY_AFTER_SECS),
            UpstreamError::HttpStatus { status: 400 | 422, .. } => {
                Self::validation("Upstream rejected the request")
            }
            UpstreamError::HttpStatus { .. } | UpstreamError::Network { .. } => {
                Self::new(ErrorKind::ExternalService, err.to_string())
            }
            UpstreamError::InvalidRequest { .. } => Self::internal(err.to_string()),
        };
        mapped.with_details(details)
    }
}
