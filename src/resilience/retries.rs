//! Retry logic.
//!
//! # Responsibilities
//! - Determine if an upstream call is retryable (idempotent methods only)
//! - Enforce retry budget (retries as a share of requests)
//!
//! # Design Decisions
//! - Never retry POST/PUT/DELETE/PATCH (non-idempotent)
//! - Jittered backoff prevents thundering herd (see backoff.rs)
//! - Retry budget prevents retry storms under load
//! - Connection errors always retryable; only 502/503/504 among statuses
//! - Timeouts are not retried; the caller's deadline already passed once

use std::sync::atomic::{AtomicU64, Ordering};

use reqwest::Method;

use crate::upstream::error::UpstreamError;

/// Returns true when `method` may be sent twice without side effects.
pub fn is_idempotent(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Returns true when a failed call may be attempted again.
pub fn is_retryable(method: &Method, error: &UpstreamError) -> bool {
    if !is_idempotent(method) {
        return false;
    }
    match error {
        UpstreamError::Network { .. } => true,
        UpstreamError::HttpStatus { status, .. } => matches!(status, 502 | 503 | 504),
        _ => false,
    }
}

/// Caps retries to a fraction of total requests.
///
/// `min_retries` keeps a small allowance available at low traffic, where a
/// pure ratio would permit nothing.
#[derive(Debug)]
pub struct RetryBudget {
    ratio: f64,
    min_retries: u64,
    requests: AtomicU64,
    retries: AtomicU64,
}

impl RetryBudget {
    pub fn new(ratio: f32, min_retries: u64) -> Self {
        Self {
            ratio: f64::from(ratio.clamp(0.0, 1.0)),
            min_retries,
            requests: AtomicU64::new(0),
            retries: AtomicU64::new(0),
        }
    }

    pub fn record_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// Reserve one retry if the budget allows it.
    pub fn can_retry(&self) -> bool {
        let requests = self.requests.load(Ordering::Relaxed);
        let allowed = self.min_retries + (requests as f64 * self.ratio) as u64;
        self.retries
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |used| {
                (used < allowed).then_some(used + 1)
            })
            .is_ok()
    }

    pub fn retries_used(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn status(code: u16) -> UpstreamError {
        UpstreamError::HttpStatus {
            upstream: "openai".into(),
            status: code,
            body: Value::Null,
        }
    }

    #[test]
    fn test_only_idempotent_methods_retry() {
        let network = UpstreamError::Network {
            upstream: "openai".into(),
            message: "connection reset".into(),
        };
        assert!(is_retryable(&Method::GET, &network));
        assert!(!is_retryable(&Method::POST, &network));
        assert!(is_retryable(&Method::GET, &status(503)));
        assert!(!is_retryable(&Method::GET, &status(500)));
        assert!(!is_retryable(&Method::GET, &status(404)));
    }

    #[test]
    fn test_budget_limits_retries() {
        let budget = RetryBudget::new(0.1, 1);
        assert!(budget.can_retry());
        assert!(!budget.can_retry());

        for _ in 0..20 {
            budget.record_request();
        }
        assert!(budget.can_retry());
        assert!(budget.can_retry());
        assert!(!budget.can_retry());
        assert_eq!(budget.retries_used(), 3);
    }
}
