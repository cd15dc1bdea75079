//! Named connectivity probes.
//!
//! # Responsibilities
//! - One probe per upstream plus the document database
//! - Normalize every outcome to [`ProbeResult`]
//! - Bound every probe by the probe deadline
//!
//! # Design Decisions
//! - Probes run on demand only; there is no background polling
//! - Missing configuration is reported without network I/O
//! - HTTP probes go through the upstream's circuit breaker

pub mod database;

use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;

use crate::observability::metrics;
use crate::upstream::{UpstreamRequest, Upstreams};

pub use database::DatabaseProbe;

/// Normalized probe outcome.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProbeResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn success(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }
}

/// Result of one probe within a `probe_all` sweep.
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub name: String,
    pub configured: bool,
    #[serde(flatten)]
    pub result: ProbeResult,
    pub duration_ms: u64,
}

/// Upper bound on how much earlier than the probe timeout the underlying
/// call must give up, so the call settles its breaker permit itself.
const CALL_MARGIN: Duration = Duration::from_millis(100);

/// All probes known to the gateway.
pub struct ProbeRegistry {
    upstreams: Upstreams,
    database: DatabaseProbe,
    timeout: Duration,
}

impl ProbeRegistry {
    pub fn new(upstreams: Upstreams, database: DatabaseProbe, timeout: Duration) -> Self {
        Self {
            upstreams,
            database,
            timeout,
        }
    }

    /// Probe names: the database first, then upstreams in configuration order.
    pub fn names(&self) -> Vec<String> {
        std::iter::once(self.database.name())
            .chain(self.upstreams.registry().names())
            .map(str::to_string)
            .collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        name == self.database.name() || self.upstreams.registry().get(name).is_some()
    }

    /// Whether the probe has everything it needs to attempt a call.
    pub fn is_configured(&self, name: &str) -> bool {
        if name == self.database.name() {
            return self.database.is_configured();
        }
        self.upstreams
            .registry()
            .get(name)
            .map(|spec| spec.is_configured() && spec.resolved_probe_path().is_ok())
            .unwrap_or(false)
    }

    /// Run a single probe by name. Never fails; problems are in the result.
    pub async fn probe(&self, name: &str) -> ProbeResult {
        if !self.contains(name) {
            return ProbeResult::failure("unknown probe");
        }

        let result = match tokio::time::timeout(self.timeout, self.run(name)).await {
            Ok(result) => result,
            Err(_) => ProbeResult::failure(format!(
                "probe timed out after {}ms",
                self.timeout.as_millis()
            )),
        };

        metrics::record_probe(name, result.success);
        if !result.success {
            tracing::warn!(probe = name, error = ?result.error, "Probe failed");
        }
        result
    }

    /// Deadline for the call a probe makes, strictly inside the probe timeout.
    fn call_deadline(&self) -> Duration {
        self.timeout - (self.timeout / 4).min(CALL_MARGIN)
    }

    async fn run(&self, name: &str) -> ProbeResult {
        if name == self.database.name() {
            return self.database.ping(self.call_deadline()).await;
        }

        let spec = match self.upstreams.spec(name) {
            Ok(spec) => spec,
            Err(e) => return ProbeResult::failure(e.to_string()),
        };
        let path = match spec.check_configured().and_then(|_| spec.resolved_probe_path()) {
            Ok(path) => path,
            Err(e) => return ProbeResult::failure(e.to_string()),
        };

        let request = UpstreamRequest::get(path)
            .timeout(self.call_deadline())
            .without_retries();
        match self.upstreams.call(name, request).await {
            Ok(body) => ProbeResult::success(spec.unwrap_response(body)),
            Err(e) => ProbeResult::failure(e.to_string()),
        }
    }

    /// Run every probe concurrently.
    pub async fn probe_all(&self) -> Vec<ProbeReport> {
        let names = self.names();
        let runs = names.iter().map(|name| async move {
            let start = Instant::now();
            let configured = self.is_configured(name);
            let result = self.probe(name).await;
            ProbeReport {
                name: name.clone(),
                configured,
                result,
                duration_ms: start.elapsed().as_millis() as u64,
            }
        });
        join_all(runs).await
    }

    /// Release driver resources on shutdown.
    pub async fn close(&self) {
        self.database.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GatewayConfig, RetryConfig, TimeoutConfig};
    use crate::resilience::{BreakerRegistry, BreakerSettings};
    use crate::upstream::{UpstreamClient, UpstreamRegistry};
    use std::sync::Arc;

    fn registry(config: &GatewayConfig) -> ProbeRegistry {
        let upstreams = Upstreams::new(
            UpstreamClient::new(&TimeoutConfig::default(), &RetryConfig::default()).unwrap(),
            Arc::new(UpstreamRegistry::from_config(config).unwrap()),
            Arc::new(BreakerRegistry::new(BreakerSettings::default())),
        );
        ProbeRegistry::new(
            upstreams,
            DatabaseProbe::new(&config.database),
            Duration::from_millis(500),
        )
    }

    #[test]
    fn test_probe_names() {
        let probes = registry(&GatewayConfig::default());
        assert_eq!(
            probes.names(),
            vec!["mongodb", "crm", "openai", "anthropic", "pinecone", "shopify"]
        );
    }

    #[tokio::test]
    async fn test_unknown_probe() {
        let probes = registry(&GatewayConfig::default());
        assert_eq!(probes.probe("salesforce").await, ProbeResult::failure("unknown probe"));
    }

    #[tokio::test]
    async fn test_unconfigured_probes_fail_fast() {
        let probes = registry(&GatewayConfig::default());
        let reports = probes.probe_all().await;
        assert_eq!(reports.len(), 6);
        for report in reports {
            assert!(!report.configured, "{} should be unconfigured", report.name);
            assert!(!report.result.success);
            assert!(report.result.error.is_some());
        }
    }

    #[test]
    fn test_call_deadline_inside_probe_timeout() {
        let probes = registry(&GatewayConfig::default());
        assert_eq!(probes.call_deadline(), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_hanging_upstream_counts_as_breaker_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let mut config = GatewayConfig::default();
        let crm = config.upstream_mut("crm").unwrap();
        crm.base_url = format!("http://{}", addr);
        crm.api_key = Some("token".into());
        crm.params.insert("location_id".into(), "loc-1".into());
        let probes = registry(&config);

        let result = probes.probe("crm").await;
        assert!(!result.success);
        assert!(result.error.unwrap().contains("timed out"));

        let snapshot = probes.upstreams.breakers().get("crm").snapshot();
        assert_eq!(snapshot.failure_count, 1);
        assert_eq!(snapshot.consecutive_failures, 1);
    }

    #[tokio::test]
    async fn test_crm_probe_needs_location() {
        let mut config = GatewayConfig::default();
        config.upstream_mut("crm").unwrap().api_key = Some("token".into());
        let probes = registry(&config);
        assert!(!probes.is_configured("crm"));
        let result = probes.probe("crm").await;
        assert!(result.error.unwrap().contains("location_id"));
    }
}
