//! Named upstreams plus the shared client and breakers.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::config::GatewayConfig;
use crate::resilience::BreakerRegistry;
use crate::upstream::client::{UpstreamClient, UpstreamRequest};
use crate::upstream::error::{UpstreamError, UpstreamResult};
use crate::upstream::spec::UpstreamSpec;

/// Compiled upstream definitions in configuration order.
#[derive(Debug, Default)]
pub struct UpstreamRegistry {
    specs: Vec<Arc<UpstreamSpec>>,
}

impl UpstreamRegistry {
    pub fn from_config(config: &GatewayConfig) -> UpstreamResult<Self> {
        let default_timeout = Duration::from_millis(config.timeouts.upstream_ms);
        let specs = config
            .upstreams
            .iter()
            .map(|u| UpstreamSpec::from_config(u, default_timeout).map(Arc::new))
            .collect::<UpstreamResult<Vec<_>>>()?;
        Ok(Self { specs })
    }

    pub fn get(&self, name: &str) -> Option<Arc<UpstreamSpec>> {
        self.specs.iter().find(|s| s.name == name).cloned()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.specs.iter().map(|s| s.name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<UpstreamSpec>> {
        self.specs.iter()
    }
}

/// Entry point for every outbound call: spec lookup, configuration check,
/// circuit breaker, then the HTTP client.
#[derive(Debug, Clone)]
pub struct Upstreams {
    client: UpstreamClient,
    registry: Arc<UpstreamRegistry>,
    breakers: Arc<BreakerRegistry>,
}

impl Upstreams {
    pub fn new(client: UpstreamClient, registry: Arc<UpstreamRegistry>, breakers: Arc<BreakerRegistry>) -> Self {
        Self {
            client,
            registry,
            breakers,
        }
    }

    pub fn registry(&self) -> &UpstreamRegistry {
        &self.registry
    }

    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    /// Look up an upstream, failing with `NotConfigured` when it is unknown.
    pub fn spec(&self, name: &str) -> UpstreamResult<Arc<UpstreamSpec>> {
        self.registry.get(name).ok_or_else(|| UpstreamError::NotConfigured {
            upstream: name.to_string(),
            reason: "no such upstream".to_string(),
        })
    }

    /// Call `name` through its circuit breaker.
    ///
    /// Configuration is checked first so a missing credential never consumes
    /// a half-open trial.
    pub async fn call(&self, name: &str, request: UpstreamRequest) -> UpstreamResult<Value> {
        let spec = self.spec(name)?;
        spec.check_configured()?;
        let breaker = self.breakers.get(name);
        breaker.call(|| self.client.call(&spec, request)).await
    }
}
