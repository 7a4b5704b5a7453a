//! Retry logic for transient SOAP errors.

use std::future::Future;
use std::time::Duration;

use crate::sonos::soap::SoapResult;

/// Backoff between attempts (three retries after the first try).
const RETRY_DELAYS_MS: [u64; 3] = [200, 500, 1000];

/// Runs a SOAP operation, retrying transient faults (701/714/716) and timeouts.
///
/// Non-transient errors are returned immediately.
pub(crate) async fn with_retry<T, F, Fut>(action: &str, mut operation: F) -> SoapResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SoapResult<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(r) => return Ok(r),
            Err(e) if e.is_transient() && attempt < RETRY_DELAYS_MS.len() => {
                let delay_ms = RETRY_DELAYS_MS[attempt];
                attempt += 1;
                log::warn!(
                    "[SOAP] {} transient error: {} (retry {}/{} in {}ms)",
                    action,
                    e,
                    attempt,
                    RETRY_DELAYS_MS.len(),
                    delay_ms
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(e) => return Err(e),
        }
    }
}
