//! Graceful shutdown: global signal flag bridged into a cancellation token

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// How often the bridge task checks the signal flag
const FLAG_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Global shutdown flag, set by the SIGTERM/SIGINT handler
pub fn shutdown_flag() -> &'static AtomicBool {
    static FLAG: AtomicBool = AtomicBool::new(false);
    &FLAG
}

/// Check if shutdown was requested
pub fn is_shutdown_requested() -> bool {
    shutdown_flag().load(Ordering::Relaxed)
}

/// Request shutdown (for signal handlers)
pub fn request_shutdown() {
    shutdown_flag().store(true, Ordering::Relaxed);
}

/// Token cancelled once shutdown is requested.
///
/// Signal handlers may only touch the atomic flag, so a background task
/// polls it and cancels the token on their behalf.
pub fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let watched = token.clone();
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(FLAG_POLL_INTERVAL);
        loop {
            tokio::select! {
                _ = watched.cancelled() => return,
                _ = tick.tick() => {
                    if is_shutdown_requested() {
                        log::warn!("Shutdown requested, cancelling pipeline");
                        watched.cancel();
                        return;
                    }
                }
            }
        }
    });
    token
}

/// Sleep for `duration`, returning early with `true` if `cancel` fires first.
pub async fn sleep_or_cancelled(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_without_cancel() {
        let cancel = CancellationToken::new();
        assert!(!sleep_or_cancelled(Duration::from_secs(10), &cancel).await);
    }

    #[tokio::test]
    async fn sleep_interrupted_by_cancel() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(sleep_or_cancelled(Duration::from_secs(3600), &cancel).await);
    }
}
