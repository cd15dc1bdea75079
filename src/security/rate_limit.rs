//! Per-client rate limiting.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use governor::clock::Clock;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};

use crate::config::RateLimitConfig;
use crate::error::GatewayError;
use crate::observability::metrics;

/// Tracked clients above which idle entries are pruned.
const RETAIN_THRESHOLD: usize = 10_000;

/// Token bucket per client IP.
pub struct ClientRateLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
}

impl ClientRateLimiter {
    /// Build a limiter from configuration. `None` when limiting is disabled
    /// or the quota is zero.
    pub fn from_config(config: &RateLimitConfig) -> Option<Self> {
        if !config.enabled {
            return None;
        }
        let rps = NonZeroU32::new(config.requests_per_second)?;
        let burst = NonZeroU32::new(config.burst_size).unwrap_or(rps);
        Some(Self {
            limiter: RateLimiter::keyed(Quota::per_second(rps).allow_burst(burst)),
        })
    }

    /// Admit one request from `client`, or return the wait in whole seconds.
    pub fn check(&self, client: IpAddr) -> Result<(), u64> {
        let result = self.limiter.check_key(&client).map_err(|not_until| {
            let wait = not_until.wait_time_from(self.limiter.clock().now());
            wait.as_secs() + u64::from(wait.subsec_nanos() > 0)
        });
        if self.limiter.len() > RETAIN_THRESHOLD {
            self.limiter.retain_recent();
        }
        result
    }
}

/// Requests without connection info (in-process tests) share one bucket.
fn client_ip(request: &Request) -> IpAddr {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
}

pub async fn rate_limit_middleware(
    State(limiter): State<Option<Arc<ClientRateLimiter>>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(limiter) = limiter else {
        return next.run(request).await;
    };

    let client = client_ip(&request);
    match limiter.check(client) {
        Ok(()) => next.run(request).await,
        Err(wait_secs) => {
            tracing::warn!(client = %client, retry_after = wait_secs, "Rate limit exceeded");
            metrics::record_rate_limited();
            GatewayError::rate_limited(wait_secs).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(rps: u32, burst: u32) -> RateLimitConfig {
        RateLimitConfig {
            enabled: true,
            requests_per_second: rps,
            burst_size: burst,
        }
    }

    #[test]
    fn test_burst_then_reject() {
        let limiter = ClientRateLimiter::from_config(&config(1, 2)).unwrap();
        let client: IpAddr = "10.0.0.1".parse().unwrap();
        assert!(limiter.check(client).is_ok());
        assert!(limiter.check(client).is_ok());
        let wait = limiter.check(client).unwrap_err();
        assert!(wait >= 1);
    }

    #[test]
    fn test_clients_are_independent() {
        let limiter = ClientRateLimiter::from_config(&config(1, 1)).unwrap();
        assert!(limiter.check("10.0.0.1".parse().unwrap()).is_ok());
        assert!(limiter.check("10.0.0.2".parse().unwrap()).is_ok());
        assert!(limiter.check("10.0.0.1".parse().unwrap()).is_err());
    }

    #[test]
    fn test_disabled() {
        let mut cfg = config(10, 10);
        cfg.enabled = false;
        assert!(ClientRateLimiter::from_config(&cfg).is_none());
        assert!(ClientRateLimiter::from_config(&config(0, 10)).is_none());
    }
}
