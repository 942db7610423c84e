//! Timeout + single-retry wrapper for network steps.

use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;

/// Runs `op` under `limit`. A timeout or transient error is retried once;
/// the second failure is surfaced to the caller.
pub async fn with_timeout_retry<T, F, Fut>(what: &str, limit: Duration, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let err = match tokio::time::timeout(limit, op()).await {
            Ok(Ok(v)) => return Ok(v),
            Ok(Err(e)) if !e.is_transient() => return Err(e),
            Ok(Err(e)) => e,
            Err(_) => Error::Timeout(format!("{} after {:?}", what, limit)),
        };
        if attempt >= 2 {
            return Err(err);
        }
        tracing::warn!(step = what, error = %err, "retrying once");
    }
}
