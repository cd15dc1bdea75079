//! Duplicate delivery detection.

use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

/// Entries kept before expired ones are swept.
const SWEEP_THRESHOLD: usize = 1024;

/// Remembers recently accepted signatures so a captured delivery cannot be
/// replayed within the window.
#[derive(Debug)]
pub struct ReplayGuard {
    window: Duration,
    seen: DashMap<String, Instant>,
}

impl ReplayGuard {
    /// A zero window disables the guard.
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            seen: DashMap::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.window.is_zero()
    }

    /// Record `key`; returns false when it was already seen inside the window.
    pub fn check_and_record(&self, key: &str) -> bool {
        if !self.is_enabled() {
            return true;
        }
        let now = Instant::now();

        if self.seen.len() >= SWEEP_THRESHOLD {
            self.seen.retain(|_, at| now.duration_since(*at) < self.window);
        }

        let mut fresh = true;
        self.seen
            .entry(key.to_string())
            .and_modify(|at| {
                if now.duration_since(*at) < self.window {
                    fresh = false;
                } else {
                    *at = now;
                }
            })
            .or_insert(now);
        fresh
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_replay_within_window_rejected() {
        let guard = ReplayGuard::new(Duration::from_secs(300));
        assert!(guard.check_and_record("crm:abc"));
        assert!(!guard.check_and_record("crm:abc"));
        assert!(guard.check_and_record("shopify:abc"));

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(guard.check_and_record("crm:abc"));
    }

    #[test]
    fn test_disabled_guard_accepts_everything() {
        let guard = ReplayGuard::new(Duration::ZERO);
        assert!(guard.check_and_record("crm:abc"));
        assert!(guard.check_and_record("crm:abc"));
    }
}
