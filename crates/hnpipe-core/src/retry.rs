//! Per-call timeout and retry with exponential backoff for record fetches

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::SourceError;
use crate::model::{Item, ItemId};
use crate::shutdown::sleep_or_cancelled;
use crate::source::Source;

/// Timeout and retry settings for a single Source call.
///
/// Retries are off by default: transient failures are reported to the
/// coordinator rather than masked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchPolicy {
    pub timeout: Option<Duration>,
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            max_retries: 0,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl FetchPolicy {
    /// Exponential backoff: base, 2×base, 4×base, ...
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// Fetch one record under `policy`.
///
/// Returns `None` if `cancel` fired before an answer was available; the
/// in-flight call is dropped in that case.
pub async fn fetch_record<S: Source>(
    source: &S,
    id: ItemId,
    policy: &FetchPolicy,
    cancel: &CancellationToken,
) -> Option<Result<Item, SourceError>> {
    let mut attempt = 0u32;
    loop {
        let call = async {
            match policy.timeout {
                Some(limit) => tokio::time::timeout(limit, source.fetch_record(id))
                    .await
                    .unwrap_or(Err(SourceError::Timeout(limit))),
                None => source.fetch_record(id).await,
            }
        };
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return None,
            r = call => r,
        };

        match result {
            Err(e) if attempt < policy.max_retries && e.is_retryable() => {
                attempt += 1;
                let delay = policy.backoff(attempt);
                log::debug!(
                    "item {id}: attempt {attempt}/{} failed: {e}, retrying in {delay:?}",
                    policy.max_retries
                );
                if sleep_or_cancelled(delay, cancel).await {
                    return None;
                }
            }
            other => return Some(other),
        }
    }
}
