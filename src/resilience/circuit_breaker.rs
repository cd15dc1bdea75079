//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: upstream assumed down, calls fail fast
//! - Half-Open: a single trial call decides recovery
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold, or
//!                window calls >= minimum_calls and failure ratio >= failure_ratio
//! Open → Half-Open: after reset timeout (checked lazily on the next call)
//! Half-Open → Closed: trial call succeeds
//! Half-Open → Open: trial call fails
//! ```
//!
//! # Design Decisions
//! - Per-upstream breaker, looked up by name in [`BreakerRegistry`]
//! - Fail fast in Open state; the wrapped future is never constructed
//! - Exactly one trial in Half-Open; concurrent callers fail fast
//! - Only transport failures, timeouts, 5xx and 429 count as failures

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::CircuitBreakerConfig;
use crate::observability::metrics;
use crate::upstream::error::{UpstreamError, UpstreamResult};

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

/// Thresholds shared by every breaker in a registry.
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub failure_ratio: f64,
    pub minimum_calls: u32,
    pub window: Duration,
    pub reset_timeout: Duration,
}

impl From<&CircuitBreakerConfig> for BreakerSettings {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            failure_ratio: config.failure_ratio,
            minimum_calls: config.minimum_calls,
            window: Duration::from_secs(config.window_secs),
            reset_timeout: Duration::from_secs(config.reset_timeout_secs),
        }
    }
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self::from(&CircuitBreakerConfig::default())
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    window_started: Instant,
    window_calls: u32,
    window_failures: u32,
    consecutive_failures: u32,
    failure_count: u64,
    success_count: u64,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    last_state_change: DateTime<Utc>,
    last_failure: Option<DateTime<Utc>>,
}

impl BreakerInner {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            window_started: Instant::now(),
            window_calls: 0,
            window_failures: 0,
            consecutive_failures: 0,
            failure_count: 0,
            success_count: 0,
            opened_at: None,
            trial_in_flight: false,
            last_state_change: Utc::now(),
            last_failure: None,
        }
    }

    fn reset_window(&mut self, now: Instant) {
        self.window_started = now;
        self.window_calls = 0;
        self.window_failures = 0;
        self.consecutive_failures = 0;
    }
}

/// Read-only view of a breaker, as served by the operational endpoints.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub failure_count: u64,
    pub success_count: u64,
    pub consecutive_failures: u32,
    pub window_calls: u32,
    pub window_failures: u32,
    pub last_state_change: String,
    pub last_failure: Option<String>,
    /// When an open breaker admits its trial call.
    pub reset_at: Option<String>,
}

/// A single named circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    inner: Mutex<BreakerInner>,
}

/// Admission ticket for one call. A trial permit dropped without an outcome
/// (the caller was cancelled) frees the trial slot for the next caller.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            let mut inner = self.breaker.lock();
            inner.trial_in_flight = false;
        }
    }
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            name: name.into(),
            settings,
            inner: Mutex::new(BreakerInner::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().expect("circuit breaker mutex poisoned")
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Run `call` through the breaker.
    ///
    /// While open, returns [`UpstreamError::CircuitOpen`] without invoking
    /// `call`. Errors that do not indicate upstream trouble (4xx other than
    /// 429, missing configuration) are passed through and count as successes.
    pub async fn call<T, F, Fut>(&self, call: F) -> UpstreamResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = UpstreamResult<T>>,
    {
        let mut permit = self.acquire()?;
        let result = call().await;
        let failed = matches!(&result, Err(e) if e.is_breaker_failure());
        self.settle(&mut permit, failed);
        result
    }

    fn acquire(&self) -> UpstreamResult<Permit<'_>> {
        let now = Instant::now();
        let mut inner = self.lock();

        let trial = match inner.state {
            CircuitState::Closed => {
                if now.duration_since(inner.window_started) >= self.settings.window {
                    inner.reset_window(now);
                }
                false
            }
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| now.duration_since(at) >= self.settings.reset_timeout)
                    .unwrap_or(true);
                if !elapsed {
                    return Err(self.rejected());
                }
                self.transition(&mut inner, CircuitState::HalfOpen);
                inner.trial_in_flight = true;
                true
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return Err(self.rejected());
                }
                inner.trial_in_flight = true;
                true
            }
        };

        Ok(Permit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    fn rejected(&self) -> UpstreamError {
        tracing::debug!(breaker = %self.name, "Circuit open, failing fast");
        UpstreamError::CircuitOpen {
            upstream: self.name.clone(),
        }
    }

    fn settle(&self, permit: &mut Permit<'_>, failed: bool) {
        permit.settled = true;
        let now = Instant::now();
        let mut inner = self.lock();

        if failed {
            inner.failure_count += 1;
            inner.consecutive_failures += 1;
            inner.last_failure = Some(Utc::now());
        } else {
            inner.success_count += 1;
            inner.consecutive_failures = 0;
        }

        if permit.trial {
            inner.trial_in_flight = false;
            if failed {
                inner.opened_at = Some(now);
                self.transition(&mut inner, CircuitState::Open);
            } else {
                inner.reset_window(now);
                inner.opened_at = None;
                self.transition(&mut inner, CircuitState::Closed);
            }
            return;
        }

        // Outcomes of calls admitted before a concurrent trip only update totals.
        if inner.state != CircuitState::Closed {
            return;
        }

        inner.window_calls += 1;
        if failed {
            inner.window_failures += 1;
        }

        let ratio = inner.window_failures as f64 / inner.window_calls as f64;
        let ratio_tripped = inner.window_calls >= self.settings.minimum_calls.max(1)
            && ratio >= self.settings.failure_ratio;
        if failed && (inner.consecutive_failures >= self.settings.failure_threshold || ratio_tripped) {
            inner.opened_at = Some(now);
            self.transition(&mut inner, CircuitState::Open);
        }
    }

    fn transition(&self, inner: &mut BreakerInner, to: CircuitState) {
        if inner.state == to {
            return;
        }
        let from = inner.state;
        inner.state = to;
        inner.last_state_change = Utc::now();

        match to {
            CircuitState::Open => tracing::warn!(
                breaker = %self.name,
                from = from.as_str(),
                consecutive_failures = inner.consecutive_failures,
                window_calls = inner.window_calls,
                window_failures = inner.window_failures,
                "Circuit opened"
            ),
            _ => tracing::info!(
                breaker = %self.name,
                from = from.as_str(),
                to = to.as_str(),
                "Circuit state changed"
            ),
        }
        metrics::record_breaker_state(&self.name, to);
    }

    /// Current counters. Does not advance the state machine.
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.lock();
        let reset_at = match (inner.state, inner.opened_at) {
            (CircuitState::Open, Some(opened_at)) => {
                let remaining = self
                    .settings
                    .reset_timeout
                    .saturating_sub(Instant::now().duration_since(opened_at));
                chrono::Duration::from_std(remaining)
                    .ok()
                    .map(|d| (Utc::now() + d).to_rfc3339())
            }
            _ => None,
        };

        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            consecutive_failures: inner.consecutive_failures,
            window_calls: inner.window_calls,
            window_failures: inner.window_failures,
            last_state_change: inner.last_state_change.to_rfc3339(),
            last_failure: inner.last_failure.map(|t| t.to_rfc3339()),
            reset_at,
        }
    }
}

/// Name → breaker map, created lazily per upstream.
#[derive(Debug)]
pub struct BreakerRegistry {
    settings: BreakerSettings,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new(settings: BreakerSettings) -> Self {
        Self {
            settings,
            breakers: DashMap::new(),
        }
    }

    /// Get or create the breaker for `name`.
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return existing.clone();
        }
        self.breakers
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(name, self.settings.clone())))
            .clone()
    }

    /// Snapshots of every breaker, ordered by name.
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<_> = self.breakers.iter().map(|b| b.snapshot()).collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}
