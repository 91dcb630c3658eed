//! Lazy, cancelable identifier stream feeding the fetch workers

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::model::ItemId;

/// Emit `ids` one at a time on a shared channel.
///
/// The channel holds at most one identifier, so the producer blocks until a
/// worker is ready. The stream ends when every id has been claimed, when
/// `cancel` fires, or when every receiver has been dropped. Ids already
/// claimed by a worker are not retracted.
pub fn generate(
    ids: Vec<ItemId>,
    cancel: CancellationToken,
    tracker: &TaskTracker,
) -> async_channel::Receiver<ItemId> {
    let (tx, rx) = async_channel::bounded(1);

    tracker.spawn(async move {
        for id in ids {
            let sent = tokio::select! {
                biased;
                _ = cancel.cancelled() => false,
                r = tx.send(id) => r.is_ok(),
            };
            if !sent {
                break;
            }
        }
        // tx dropped here: receivers see end-of-stream
    });

    rx
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn ids(range: std::ops::Range<u64>) -> Vec<ItemId> {
        range.map(ItemId).collect()
    }

    #[tokio::test]
    async fn emits_in_order_then_closes() {
        let tracker = TaskTracker::new();
        let rx = generate(ids(0..5), CancellationToken::new(), &tracker);

        let mut got = Vec::new();
        while let Ok(id) = rx.recv().await {
            got.push(id.0);
        }
        assert_eq!(got, vec![0, 1, 2, 3, 4]);

        tracker.close();
        tracker.wait().await;
    }

    #[tokio::test]
    async fn empty_input_is_exhausted_immediately() {
        let tracker = TaskTracker::new();
        let rx = generate(Vec::new(), CancellationToken::new(), &tracker);
        assert!(rx.recv().await.is_err());
    }

    #[tokio::test]
    async fn producer_blocks_without_consumer() {
        let tracker = TaskTracker::new();
        let rx = generate(ids(0..100), CancellationToken::new(), &tracker);
        tokio::time::sleep(Duration::from_millis(20)).await;
        // Only one id may be buffered ahead of the consumer
        assert!(rx.len() <= 1);
        drop(rx);

        tracker.close();
        tokio::time::timeout(Duration::from_secs(5), tracker.wait())
            .await
            .expect("producer exits once receivers are gone");
    }

    #[tokio::test]
    async fn cancel_stops_producer() {
        let tracker = TaskTracker::new();
        let cancel = CancellationToken::new();
        let rx = generate(ids(0..1_000), cancel.clone(), &tracker);

        assert_eq!(rx.recv().await.unwrap(), ItemId(0));
        cancel.cancel();

        tracker.close();
        tokio::time::timeout(Duration::from_secs(5), tracker.wait())
            .await
            .expect("producer exits on cancel");

        // At most the one buffered id can still be drained
        let mut rest = 0;
        while rx.try_recv().is_ok() {
            rest += 1;
        }
        assert!(rest <= 1);
    }
}
