//! Exponential backoff with jitter.

use std::time::Duration;

use crate::config::RetryConfig;

/// Delay before retry number `attempt` (1-based). Attempt 0 never waits.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let exponential = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(exponential).min(max_ms);

    // Up to 10% extra so concurrent callers spread out.
    let jitter = match capped / 10 {
        0 => 0,
        range => fastrand::u64(0..range),
    };

    Duration::from_millis(capped + jitter)
}

/// Backoff using the configured base and cap.
pub fn retry_delay(attempt: u32, config: &RetryConfig) -> Duration {
    calculate_backoff(attempt, config.base_delay_ms, config.max_delay_ms)
}
