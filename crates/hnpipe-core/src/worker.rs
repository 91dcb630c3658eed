//! Fetch worker pool: N independent tasks turning identifiers into results

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::model::{FetchResult, ItemId};
use crate::retry::{self, FetchPolicy};
use crate::source::Source;

/// Spawn `count` fetch workers pulling from the shared `ids` stream.
///
/// Each worker gets its own output channel. A worker exits when the id
/// stream ends, when `cancel` fires, or when its output is dropped; its
/// output channel closes as it exits. A failed fetch is forwarded as
/// [`FetchResult::Failed`] and the worker carries on with the next id.
pub fn spawn_fetch_workers<S: Source>(
    count: usize,
    source: &Arc<S>,
    ids: &async_channel::Receiver<ItemId>,
    policy: FetchPolicy,
    cancel: &CancellationToken,
    tracker: &TaskTracker,
) -> Vec<mpsc::Receiver<FetchResult>> {
    (0..count)
        .map(|n| {
            let (tx, rx) = mpsc::channel(1);
            let source = Arc::clone(source);
            let ids = ids.clone();
            let cancel = cancel.clone();
            tracker.spawn(async move {
                let mut fetched = 0usize;
                loop {
                    let id = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        r = ids.recv() => match r {
                            Ok(id) => id,
                            Err(_) => break,
                        },
                    };

                    let result = match retry::fetch_record(&*source, id, &policy, &cancel).await {
                        None => break,
                        Some(Ok(item)) => FetchResult::Fetched(item),
                        Some(Err(error)) => {
                            log::debug!("worker {n}: item {id} failed: {error}");
                            FetchResult::Failed { id, error }
                        }
                    };
                    fetched += 1;

                    let sent = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => false,
                        r = tx.send(result) => r.is_ok(),
                    };
                    if !sent {
                        break;
                    }
                }
                log::trace!("worker {n}: exiting after {fetched} items");
            });
            rx
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::error::SourceError;
    use crate::generator::generate;
    use crate::model::{Item, ItemKind};

    /// Odd ids fail, even ids succeed.
    struct OddFails;

    impl Source for OddFails {
        async fn fetch_batch(&self) -> Result<Vec<ItemId>, SourceError> {
            Ok(vec![])
        }

        async fn fetch_record(&self, id: ItemId) -> Result<Item, SourceError> {
            if id.0 % 2 == 1 {
                Err(SourceError::Http {
                    status: Some(500),
                    message: "boom".into(),
                })
            } else {
                Ok(Item::new(id, ItemKind::Story))
            }
        }
    }

    #[tokio::test]
    async fn single_worker_survives_failures() {
        let tracker = TaskTracker::new();
        let cancel = CancellationToken::new();
        let ids = generate((0..6).map(ItemId).collect(), cancel.clone(), &tracker);
        let mut outputs = spawn_fetch_workers(
            1,
            &Arc::new(OddFails),
            &ids,
            FetchPolicy::default(),
            &cancel,
            &tracker,
        );
        drop(ids);

        let mut out = outputs.pop().unwrap();
        let (mut ok, mut failed) = (0, 0);
        while let Some(result) = out.recv().await {
            match result {
                FetchResult::Fetched(_) => ok += 1,
                FetchResult::Failed { id, .. } => {
                    assert_eq!(id.0 % 2, 1);
                    failed += 1;
                }
            }
        }
        assert_eq!((ok, failed), (3, 3));

        tracker.close();
        tracker.wait().await;
    }

    #[tokio::test]
    async fn zero_workers_produce_no_outputs() {
        let tracker = TaskTracker::new();
        let cancel = CancellationToken::new();
        let ids = generate(vec![ItemId(1)], cancel.clone(), &tracker);
        let outputs = spawn_fetch_workers(
            0,
            &Arc::new(OddFails),
            &ids,
            FetchPolicy::default(),
            &cancel,
            &tracker,
        );
        assert!(outputs.is_empty());
        drop(ids);

        tracker.close();
        tokio::time::timeout(Duration::from_secs(5), tracker.wait())
            .await
            .expect("generator exits with no workers");
    }

    #[tokio::test]
    async fn blocked_send_unwinds_on_cancel() {
        let tracker = TaskTracker::new();
        let cancel = CancellationToken::new();
        let ids = generate((0..10).map(ItemId).collect(), cancel.clone(), &tracker);
        // Keep outputs alive but never read them: workers block on send
        let _outputs = spawn_fetch_workers(
            2,
            &Arc::new(OddFails),
            &ids,
            FetchPolicy::default(),
            &cancel,
            &tracker,
        );
        drop(ids);

        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();
        tracker.close();
        tokio::time::timeout(Duration::from_secs(5), tracker.wait())
            .await
            .expect("workers exit on cancel");
    }
}
