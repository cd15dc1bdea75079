//! Uniform HTTP client for every upstream.
//!
//! # Responsibilities
//! - Build the request from an [`UpstreamSpec`] (URL, auth, static headers)
//! - Enforce the per-call deadline
//! - Decode JSON, falling back to the raw text as a JSON string
//! - Map non-2xx responses to [`UpstreamError::HttpStatus`]
//! - Retry idempotent calls within the retry budget
//!
//! # Design Decisions
//! - One shared `reqwest::Client` (connection pooling across upstreams)
//! - Stateless per call; auth comes from the `UpstreamSpec`, never from the caller
//! - Missing configuration is reported before any I/O

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::{Method, StatusCode};
use serde_json::Value;
use url::Url;

use crate::config::{RetryConfig, TimeoutConfig};
use crate::observability::metrics;
use crate::resilience::backoff::retry_delay;
use crate::resilience::retries::{is_retryable, RetryBudget};
use crate::resilience::timeouts::with_timeout;
use crate::upstream::error::{UpstreamError, UpstreamResult};
use crate::upstream::spec::UpstreamSpec;

/// Minimum retries allowed regardless of traffic volume.
const MIN_RETRY_ALLOWANCE: u64 = 10;

/// One call against an upstream, relative to its base URL.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Overrides the upstream's default deadline.
    pub timeout: Option<Duration>,
    /// Whether an idempotent call may be retried.
    pub retry: bool,
}

impl UpstreamRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            timeout: None,
            retry: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).json(body)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Add a query parameter only when a value is present.
    pub fn query_opt(self, key: impl Into<String>, value: Option<impl ToString>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Single attempt, whatever the retry policy says.
    pub fn without_retries(mut self) -> Self {
        self.retry = false;
        self
    }
}

/// Shared HTTP client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    retries: RetryConfig,
    budget: Arc<RetryBudget>,
}

impl UpstreamClient {
    pub fn new(timeouts: &TimeoutConfig, retries: &RetryConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_millis(timeouts.connect_ms))
            .user_agent(concat!("integration-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            retries: retries.clone(),
            budget: Arc::new(RetryBudget::new(retries.budget_ratio, MIN_RETRY_ALLOWANCE)),
        })
    }

    /// Perform `request` against `spec`, retrying idempotent calls when allowed.
    pub async fn call(&self, spec: &UpstreamSpec, request: UpstreamRequest) -> UpstreamResult<Value> {
        let start = Instant::now();
        let result = self.call_with_retries(spec, &request).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.outcome_label(),
        };
        metrics::record_upstream_call(&spec.name, outcome, start);
        if let Err(e) = &result {
            tracing::debug!(
                upstream = %spec.name,
                method = %request.method,
                path = %request.path,
                error = %e,
                "Upstream call failed"
            );
        }
        result
    }

    async fn call_with_retries(&self, spec: &UpstreamSpec, request: &UpstreamRequest) -> UpstreamResult<Value> {
        let url = spec.endpoint(&request.path)?;
        let timeout = request.timeout.unwrap_or(spec.timeout);
        let max_attempts = if self.retries.enabled && request.retry {
            self.retries.max_attempts.max(1)
        } else {
            1
        };

        self.budget.record_request();

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = with_timeout(&spec.name, timeout, self.send(spec, url.clone(), request)).await;

            match result {
                Err(e)
                    if attempt < max_attempts
                        && is_retryable(&request.method, &e)
                        && self.budget.can_retry() =>
                {
                    let delay = retry_delay(attempt, &self.retries);
                    tracing::info!(
                        upstream = %spec.name,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying upstream call"
                    );
                    tokio::time::sleep(delay).await;
                }
                other => return other,
            }
        }
    }

    async fn send(&self, spec: &UpstreamSpec, url: Url, request: &UpstreamRequest) -> UpstreamResult<Value> {
        let mut builder = spec.authorize(self.http.request(request.method.clone(), url));
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let network = |e: reqwest::Error| UpstreamError::Network {
            upstream: spec.name.clone(),
            // Query-string credentials must not leak through the error text.
            message: e.without_url().to_string(),
        };

        let response = builder.send().await.map_err(network)?;
        let status = response.status();
        let text = response.text().await.map_err(network)?;
        let body = decode_body(&text);

        if !status.is_success() {
            return Err(UpstreamError::HttpStatus {
                upstream: spec.name.clone(),
                status: status.as_u16(),
                body,
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        Ok(body)
    }
}

/// JSON when possible, otherwise the raw text as a JSON string.
pub fn decode_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
