//! Bounded calls to external capabilities.
//!
//! Every call that leaves the process (generation, embedding, vector and
//! history stores) goes through [`bounded`], so a hung capability turns into
//! a [`DocentError::Timeout`] instead of stalling the request.

use crate::error::{DocentError, Result};
use std::future::Future;
use std::time::Duration;

/// Default per-call timeout.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Await `fut`, failing with a timeout error once `limit` elapses.
pub async fn bounded<T, F>(label: &str, limit: Duration, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(DocentError::Timeout(label.to_string(), limit.as_secs())),
    }
}
