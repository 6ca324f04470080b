//! Per-call deadlines for external collaborators

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use super::error::DeadlineExceeded;

/// Runs `call` with an upper bound of `limit`.
///
/// An expired deadline is reported as the error type's `Timeout` variant and
/// is never retried here.
pub(crate) async fn bounded<T, E, F>(operation: &'static str, limit: Duration, call: F) -> Result<T, E>
where
    E: DeadlineExceeded,
    F: Future<Output = Result<T, E>>,
{
    match timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(
                operation,
                timeout_ms = limit.as_millis() as u64,
                "External call timed out"
            );
            Err(E::deadline_exceeded(operation, limit))
        }
    }
}
