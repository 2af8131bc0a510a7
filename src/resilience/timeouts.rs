//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap external calls with a deadline
//! - Keep timeout errors distinct from call errors

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::resilience::retries::AttemptError;

/// Race `fut` against `deadline`.
pub async fn with_timeout<T, E, F>(deadline: Duration, fut: F) -> Result<T, AttemptError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match timeout(deadline, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(AttemptError::Failed(e)),
        Err(_) => Err(AttemptError::TimedOut(deadline)),
    }
}
