//! Timeout enforcement.
//!
//! # Responsibilities
//! - Put an overall deadline on an upstream call
//! - Cancel the inner future cleanly when the deadline passes
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other errors and classify as retryable

use std::future::Future;
use std::time::Duration;

use crate::weather::types::UpstreamError;

/// Run `fut` with an overall deadline, mapping expiry to [`UpstreamError::Timeout`].
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, UpstreamError>
where
    F: Future<Output = Result<T, UpstreamError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::debug!(deadline = ?deadline, "Upstream call exceeded deadline");
            Err(UpstreamError::Timeout(format!(
                "no response within {:.1}s",
                deadline.as_secs_f64()
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let result: Result<(), _> = with_deadline(Duration::from_secs(8), async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(UpstreamError::Timeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_inner_result_passes_through() {
        let ok = with_deadline(Duration::from_secs(8), async { Ok::<_, UpstreamError>(7) }).await;
        assert_eq!(ok.unwrap(), 7);

        let err: Result<(), _> = with_deadline(Duration::from_secs(8), async {
            Err(UpstreamError::NotFound("atlantis".into()))
        })
        .await;
        assert!(matches!(err, Err(UpstreamError::NotFound(_))));
    }
}
