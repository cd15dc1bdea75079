//! Timeout enforcement.
//!
//! Every upstream call and probe is wrapped in a Tokio deadline. On expiry the
//! inner future is dropped, which aborts the in-flight request, and a distinct
//! [`UpstreamError::Timeout`] is returned so the HTTP layer can answer 504.

use std::future::Future;
use std::time::Duration;

use crate::upstream::error::{UpstreamError, UpstreamResult};

/// Run `fut` with a deadline, mapping expiry to [`UpstreamError::Timeout`].
pub async fn with_timeout<T, F>(upstream: &str, timeout: Duration, fut: F) -> UpstreamResult<T>
where
    F: Future<Output = UpstreamResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(upstream, timeout_ms = timeout.as_millis() as u64, "Upstream call timed out");
            Err(UpstreamError::Timeout {
                upstream: upstream.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_timeout_maps_to_error() {
        let result: UpstreamResult<()> = with_timeout("pinecone", Duration::from_millis(250), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(
            result,
            Err(UpstreamError::Timeout { timeout_ms: 250, .. })
        ));
    }

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let result = with_timeout("pinecone", Duration::from_secs(1), async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
