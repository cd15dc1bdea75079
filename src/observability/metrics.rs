//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): inbound requests by endpoint, method, status
//! - `gateway_request_duration_seconds` (histogram): inbound latency by endpoint
//! - `gateway_upstream_calls_total` (counter): upstream calls by upstream, outcome
//! - `gateway_upstream_duration_seconds` (histogram): upstream latency by upstream
//! - `gateway_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `gateway_probes_total` (counter): probe runs by probe, result
//! - `gateway_webhooks_total` (counter): webhook deliveries by provider, outcome
//! - `gateway_rate_limited_total` (counter): requests rejected by the limiter
//!
//! # Design Decisions
//! - The Prometheus recorder is installed once per process; later calls reuse it
//! - Without a recorder every `record_*` call is a no-op
//! - In-process counters back the JSON `/metrics` view so it works even when
//!   the recorder is disabled

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use serde::Serialize;

use crate::resilience::CircuitState;

static PROMETHEUS: OnceLock<PrometheusHandle> = OnceLock::new();

const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

/// Install the Prometheus recorder. Returns false when a different recorder
/// is already installed.
pub fn init_metrics() -> bool {
    if PROMETHEUS.get().is_some() {
        return true;
    }

    let builder = match PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Suffix("duration_seconds".to_string()), LATENCY_BUCKETS)
    {
        Ok(builder) => builder,
        Err(e) => {
            tracing::error!(error = %e, "Invalid histogram buckets");
            return false;
        }
    };

    match builder.install_recorder() {
        Ok(handle) => {
            let _ = PROMETHEUS.set(handle);
            tracing::info!("Prometheus recorder installed");
            true
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render the Prometheus text exposition, if the recorder is installed.
pub fn render_prometheus() -> Option<String> {
    PROMETHEUS.get().map(PrometheusHandle::render)
}

/// Record a completed inbound request.
pub fn record_request(endpoint: &'static str, method: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "endpoint" => endpoint,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds", "endpoint" => endpoint)
        .record(start.elapsed().as_secs_f64());
}

/// Record one upstream call, including retries, as a single outcome.
pub fn record_upstream_call(upstream: &str, outcome: &'static str, start: Instant) {
    counter!(
        "gateway_upstream_calls_total",
        "upstream" => upstream.to_string(),
        "outcome" => outcome
    )
    .increment(1);
    histogram!("gateway_upstream_duration_seconds", "upstream" => upstream.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_breaker_state(name: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    };
    gauge!("gateway_circuit_state", "breaker" => name.to_string()).set(value);
}

pub fn record_probe(name: &str, success: bool) {
    counter!(
        "gateway_probes_total",
        "probe" => name.to_string(),
        "result" => if success { "success" } else { "failure" }
    )
    .increment(1);
}

pub fn record_webhook(provider: &str, outcome: &'static str) {
    counter!(
        "gateway_webhooks_total",
        "provider" => provider.to_string(),
        "outcome" => outcome
    )
    .increment(1);
}

pub fn record_rate_limited() {
    counter!("gateway_rate_limited_total").increment(1);
}

/// Process-local request counters for the JSON metrics view.
#[derive(Debug, Default)]
pub struct RequestCounters {
    total: AtomicU64,
    success: AtomicU64,
    client_errors: AtomicU64,
    server_errors: AtomicU64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestCountersSnapshot {
    pub total: u64,
    pub success: u64,
    pub client_errors: u64,
    pub server_errors: u64,
}

impl RequestCounters {
    pub fn record(&self, status: u16) {
        self.total.fetch_add(1, Ordering::Relaxed);
        let bucket = match status {
            500..=599 => &self.server_errors,
            400..=499 => &self.client_errors,
            _ => &self.success,
        };
        bucket.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RequestCountersSnapshot {
        RequestCountersSnapshot {
            total: self.total.load(Ordering::Relaxed),
            success: self.success.load(Ordering::Relaxed),
            client_errors: self.client_errors.load(Ordering::Relaxed),
            server_errors: self.server_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_counters() {
        let counters = RequestCounters::default();
        for status in [200, 201, 404, 400, 503] {
            counters.record(status);
        }
        let snapshot = counters.snapshot();
        assert_eq!(snapshot.total, 5);
        assert_eq!(snapshot.success, 2);
        assert_eq!(snapshot.client_errors, 2);
        assert_eq!(snapshot.server_errors, 1);
    }

    #[test]
    fn test_record_without_recorder_is_noop() {
        record_probe("openai", false);
        record_webhook("crm", "rejected");
        record_breaker_state("crm", CircuitState::Open);
    }
}
