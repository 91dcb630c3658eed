//! Fan-in: merge per-worker outputs into one stream with a completion barrier

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Merge `inputs` into a single receiver.
///
/// Results interleave arbitrarily but none is dropped or duplicated. The
/// merged stream ends only after every input has ended (each forwarder owns
/// a clone of the output sender; the channel closes when the last one
/// drops). On cancel the forwarders stop waiting and abandon pending sends.
pub fn fan_in<T: Send + 'static>(
    inputs: Vec<mpsc::Receiver<T>>,
    cancel: &CancellationToken,
    tracker: &TaskTracker,
) -> mpsc::Receiver<T> {
    let (tx, rx) = mpsc::channel(1);

    for mut input in inputs {
        let tx = tx.clone();
        let cancel = cancel.clone();
        tracker.spawn(async move {
            loop {
                let value = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    v = input.recv() => match v {
                        Some(v) => v,
                        None => break,
                    },
                };
                let sent = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => false,
                    r = tx.send(value) => r.is_ok(),
                };
                if !sent {
                    break;
                }
            }
        });
    }

    rx
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn feed(values: Vec<u32>, tracker: &TaskTracker) -> mpsc::Receiver<u32> {
        let (tx, rx) = mpsc::channel(1);
        tracker.spawn(async move {
            for v in values {
                if tx.send(v).await.is_err() {
                    break;
                }
            }
        });
        rx
    }

    #[tokio::test]
    async fn merges_everything_exactly_once() {
        let tracker = TaskTracker::new();
        let inputs = vec![
            feed(vec![1, 2, 3], &tracker),
            feed(vec![], &tracker),
            feed(vec![10, 20], &tracker),
        ];
        let mut merged = fan_in(inputs, &CancellationToken::new(), &tracker);

        let mut got = Vec::new();
        while let Some(v) = merged.recv().await {
            got.push(v);
        }
        got.sort_unstable();
        assert_eq!(got, vec![1, 2, 3, 10, 20]);

        tracker.close();
        tracker.wait().await;
    }

    #[tokio::test]
    async fn no_inputs_closes_immediately() {
        let tracker = TaskTracker::new();
        let mut merged: mpsc::Receiver<u32> = fan_in(Vec::new(), &CancellationToken::new(), &tracker);
        assert!(merged.recv().await.is_none());
    }

    #[tokio::test]
    async fn waits_for_slowest_input() {
        let tracker = TaskTracker::new();
        let (slow_tx, slow_rx) = mpsc::channel(1);
        let mut merged = fan_in(
            vec![feed(vec![1], &tracker), slow_rx],
            &CancellationToken::new(),
            &tracker,
        );

        assert_eq!(merged.recv().await, Some(1));
        // Slow input still open: the merged stream must not end yet
        let pending = tokio::time::timeout(Duration::from_millis(30), merged.recv()).await;
        assert!(pending.is_err());

        slow_tx.send(2).await.unwrap();
        drop(slow_tx);
        assert_eq!(merged.recv().await, Some(2));
        assert_eq!(merged.recv().await, None);
    }

    #[tokio::test]
    async fn cancel_releases_forwarders() {
        let tracker = TaskTracker::new();
        let cancel = CancellationToken::new();
        let (_never_tx, never_rx) = mpsc::channel::<u32>(1);
        let _merged = fan_in(
            vec![never_rx, feed((0..100).collect(), &tracker)],
            &cancel,
            &tracker,
        );

        cancel.cancel();
        tracker.close();
        tokio::time::timeout(Duration::from_secs(5), tracker.wait())
            .await
            .expect("forwarders exit on cancel");
    }
}
