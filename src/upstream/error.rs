//! Upstream call errors.

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Coarse classification of an [`UpstreamError`], as reported in API payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UpstreamErrorKind {
    Timeout,
    HttpStatus,
    CircuitOpen,
    NotConfigured,
    Network,
    InvalidRequest,
}

/// Errors produced while calling a third-party API.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// The call did not complete before its deadline.
    #[error("upstream '{upstream}' timed out after {timeout_ms}ms")]
    Timeout { upstream: String, timeout_ms: u64 },

    /// The upstream answered with a non-2xx status.
    #[error("upstream '{upstream}' returned HTTP {status}")]
    HttpStatus {
        upstream: String,
        status: u16,
        body: Value,
    },

    /// The circuit breaker for this upstream is open; no call was attempted.
    #[error("circuit open for upstream '{upstream}'")]
    CircuitOpen { upstream: String },

    /// Required configuration (base URL, credential, parameter) is missing.
    #[error("upstream '{upstream}' is not configured: {reason}")]
    NotConfigured { upstream: String, reason: String },

    /// Connection, TLS or protocol failure.
    #[error("network error calling '{upstream}': {message}")]
    Network { upstream: String, message: String },

    /// The request could not be built (bad URL, bad header value).
    #[error("invalid request for '{upstream}': {message}")]
    InvalidRequest { upstream: String, message: String },
}

impl UpstreamError {
    pub fn kind(&self) -> UpstreamErrorKind {
        match self {
            UpstreamError::Timeout { .. } => UpstreamErrorKind::Timeout,
            UpstreamError::HttpStatus { .. } => UpstreamErrorKind::HttpStatus,
            UpstreamError::CircuitOpen { .. } => UpstreamErrorKind::CircuitOpen,
            UpstreamError::NotConfigured { .. } => UpstreamErrorKind::NotConfigured,
            UpstreamError::Network { .. } => UpstreamErrorKind::Network,
            UpstreamError::InvalidRequest { .. } => UpstreamErrorKind::InvalidRequest,
        }
    }

    /// Name of the upstream the error belongs to.
    pub fn upstream(&self) -> &str {
        match self {
            UpstreamError::Timeout { upstream, .. }
            | UpstreamError::HttpStatus { upstream, .. }
            | UpstreamError::CircuitOpen { upstream }
            | UpstreamError::NotConfigured { upstream, .. }
            | UpstreamError::Network { upstream, .. }
            | UpstreamError::InvalidRequest { upstream, .. } => upstream,
        }
    }

    /// Whether this outcome should count against the upstream's circuit breaker.
    ///
    /// Only timeouts, transport failures, 5xx and 429 count. A 4xx means the
    /// upstream is alive and rejected our input.
    pub fn is_breaker_failure(&self) -> bool {
        match self {
            UpstreamError::Timeout { .. } | UpstreamError::Network { .. } => true,
            UpstreamError::HttpStatus { status, .. } => *status >= 500 || *status == 429,
            UpstreamError::CircuitOpen { .. }
            | UpstreamError::NotConfigured { .. }
            | UpstreamError::InvalidRequest { .. } => false,
        }
    }

    /// Short label used for metrics.
    pub fn outcome_label(&self) -> &'static str {
        match self.kind() {
            UpstreamErrorKind::Timeout => "timeout",
            UpstreamErrorKind::HttpStatus => "http_status",
            UpstreamErrorKind::CircuitOpen => "circuit_open",
            UpstreamErrorKind::NotConfigured => "not_configured",
            UpstreamErrorKind::Network => "network",
            UpstreamErrorKind::InvalidRequest => "invalid_request",
        }
    }
}

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breaker_failure_classification() {
        let status = |status| UpstreamError::HttpStatus {
            upstream: "crm".into(),
            status,
            body: Value::Null,
        };
        assert!(status(500).is_breaker_failure());
        assert!(status(503).is_breaker_failure());
        assert!(status(429).is_breaker_failure());
        assert!(!status(404).is_breaker_failure());
        assert!(!status(422).is_breaker_failure());

        let timeout = UpstreamError::Timeout {
            upstream: "crm".into(),
            timeout_ms: 100,
        };
        assert!(timeout.is_breaker_failure());
        assert_eq!(timeout.kind(), UpstreamErrorKind::Timeout);
        assert_eq!(timeout.upstream(), "crm");

        let open = UpstreamError::CircuitOpen {
            upstream: "crm".into(),
        };
        assert!(!open.is_breaker_failure());
    }

    #[test]
    fn test_error_display() {
        let err = UpstreamError::Timeout {
            upstream: "openai".into(),
            timeout_ms: 2500,
        };
        assert_eq!(err.to_string(), "upstream 'openai' timed out after 2500ms");

        let kind = serde_json::to_value(UpstreamErrorKind::CircuitOpen).unwrap();
        assert_eq!(kind, "CIRCUIT_OPEN");
    }
}
