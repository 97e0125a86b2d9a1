//! Deadline wrapper shared by every remote call.
//!
//! The wrapped future is dropped when the deadline elapses. Dropping a reqwest
//! future aborts the underlying request, so a late response can never be observed,
//! and the timer is released together with the `Timeout` future on every exit path.

use std::future::Future;
use std::time::Duration;

use crate::adapters::AdapterError;

pub async fn with_deadline<T, F>(source: &str, deadline: Duration, operation: F) -> Result<T, AdapterError>
where
    F: Future<Output = Result<T, AdapterError>>,
{
    match tokio::time::timeout(deadline, operation).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(err)) => {
            log::debug!("{} failed before its deadline: {}", source, err);
            Err(err)
        }
        Err(_) => {
            log::warn!("{} timed out after {:?}", source, deadline);
            Err(AdapterError::Timeout {
                after: Some(deadline),
            })
        }
    }
}
