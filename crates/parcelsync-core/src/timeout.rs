//! Bounded file I/O.

use std::future::Future;
use std::time::Duration;

use crate::error::SyncError;

/// Run `fut` with an upper bound on its duration.
///
/// The inner error is converted into [`SyncError`]; expiry becomes
/// [`SyncError::Timeout`] naming `operation`.
pub async fn bounded<F, T, E>(limit: Duration, operation: &str, fut: F) -> Result<T, SyncError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<SyncError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => {
            tracing::warn!(
                operation = %operation,
                timeout_secs = limit.as_secs(),
                "I/O operation timed out"
            );
            Err(SyncError::Timeout {
                operation: operation.to_string(),
                seconds: limit.as_secs(),
            })
        }
    }
}
