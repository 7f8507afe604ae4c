/// Deadline wrapper for store calls
use crate::error::AppError;
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug, thiserror::Error)]
pub enum TimeoutError {
    #[error("Store call timed out after {0:?}")]
    Elapsed(Duration),
}

/// Execute a fallible store future with a deadline.
///
/// Both the elapsed case and the operation's own failure surface as
/// `AppError`. Nothing is retried.
pub async fn with_timeout<F, T, E>(duration: Duration, future: F) -> Result<T, AppError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<AppError>,
{
    match timeout(duration, future).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(TimeoutError::Elapsed(duration).into()),
    }
}
