//! Durable-queue contract, message codec and the shared delivery pump
//!
//! A [`Queue`] publishes one [`Message`] per identifier and delivers them to
//! any number of workers through a cloneable receiver. Delivery is
//! acknowledged at receipt: once a body is claimed from the backing store it
//! is gone, so a crash between receipt and persist loses that message.
//! Malformed bodies are put back at the tail of the queue.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::QueueError;
use crate::model::ItemId;
use crate::shutdown::sleep_or_cancelled;

/// Queue message. Carries only the identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: ItemId,
}

impl Message {
    pub fn new(id: ItemId) -> Self {
        Self { id }
    }

    pub fn encode(&self) -> Result<Vec<u8>, QueueError> {
        serde_json::to_vec(self).map_err(|e| QueueError::Encode(e.to_string()))
    }

    pub fn decode(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }
}

/// Durable message queue shared by seeders and consumers.
pub trait Queue: Send + Sync + 'static {
    fn publish(&self, msg: &Message) -> impl Future<Output = Result<(), QueueError>> + Send;

    /// Start delivering messages until `cancel` fires.
    ///
    /// The receiver may be cloned; each message goes to exactly one clone.
    /// Delivery runs on `tracker`, and messages no receiver took before
    /// cancellation are back in the queue once it finishes. Must be called
    /// from within a tokio runtime.
    fn consume(
        &self,
        cancel: CancellationToken,
        tracker: &TaskTracker,
    ) -> Result<async_channel::Receiver<Message>, QueueError>;
}

/// Raw storage behind a queue: hands out bodies oldest first.
pub trait MessageStore: Send + Sync + 'static {
    /// Remove and return the oldest body. Removal is the acknowledgment.
    fn claim(&self) -> impl Future<Output = Result<Option<Vec<u8>>, QueueError>> + Send;

    /// Put a body back at the tail.
    fn requeue(&self, body: Vec<u8>) -> impl Future<Output = Result<(), QueueError>> + Send;
}

/// Spawn the task that moves bodies from `store` to a delivery channel.
///
/// The channel holds at most one undelivered message. On cancellation the
/// message in hand and any still sitting in the channel are requeued, so only
/// messages a worker actually received count as acknowledged. The task runs on
/// `tracker`; wait on it to know every requeue has landed.
pub fn spawn_pump<M: MessageStore>(
    store: Arc<M>,
    poll_interval: Duration,
    cancel: CancellationToken,
    tracker: &TaskTracker,
) -> async_channel::Receiver<Message> {
    let (tx, rx) = async_channel::bounded(1);
    let leftovers = rx.clone();

    tracker.spawn(async move {
        log::debug!("consuming messages");
        let mut in_hand = None;
        while !cancel.is_cancelled() {
            let body = match store.claim().await {
                Ok(Some(body)) => body,
                Ok(None) => {
                    if sleep_or_cancelled(poll_interval, &cancel).await {
                        break;
                    }
                    continue;
                }
                Err(e) => {
                    log::error!("claiming message: {e}");
                    if sleep_or_cancelled(poll_interval, &cancel).await {
                        break;
                    }
                    continue;
                }
            };

            let msg = match Message::decode(&body) {
                Ok(msg) => msg,
                Err(e) => {
                    log::warn!("malformed queue message, requeueing: {e}");
                    put_back(&*store, body).await;
                    if sleep_or_cancelled(poll_interval, &cancel).await {
                        break;
                    }
                    continue;
                }
            };

            let delivered = tokio::select! {
                biased;
                _ = cancel.cancelled() => false,
                sent = tx.send(msg) => sent.is_ok(),
            };
            if !delivered {
                in_hand = Some(body);
                break;
            }
        }

        // Buffered first: it was claimed before the one in hand
        leftovers.close();
        let mut requeued = 0;
        while let Ok(msg) = leftovers.try_recv() {
            match msg.encode() {
                Ok(body) => put_back(&*store, body).await,
                Err(e) => log::error!("requeueing item {}: {e}", msg.id),
            }
            requeued += 1;
        }
        if let Some(body) = in_hand {
            put_back(&*store, body).await;
            requeued += 1;
        }
        if requeued > 0 {
            log::info!("requeued {requeued} undelivered messages");
        }
        log::debug!("stopped consuming messages");
    });

    rx
}

async fn put_back<M: MessageStore>(store: &M, body: Vec<u8>) {
    if let Err(e) = store.requeue(body).await {
        log::error!("requeueing message: {e}");
    }
}

/// In-process queue with the same delivery semantics as the durable one.
#[derive(Clone, Debug)]
pub struct MemoryQueue {
    store: Arc<MemoryStore>,
    poll_interval: Duration,
}

#[derive(Debug, Default)]
struct MemoryStore {
    bodies: Mutex<VecDeque<Vec<u8>>>,
}

impl MemoryStore {
    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Vec<u8>>> {
        self.bodies.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl MessageStore for MemoryStore {
    async fn claim(&self) -> Result<Option<Vec<u8>>, QueueError> {
        Ok(self.lock().pop_front())
    }

    async fn requeue(&self, body: Vec<u8>) -> Result<(), QueueError> {
        self.lock().push_back(body);
        Ok(())
    }
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self {
            store: Arc::default(),
            poll_interval: Duration::from_millis(10),
        }
    }

    /// Enqueue an arbitrary body, bypassing the codec.
    pub fn publish_raw(&self, body: Vec<u8>) {
        self.store.lock().push_back(body);
    }

    /// Bodies waiting to be claimed.
    pub fn len(&self) -> usize {
        self.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl Queue for MemoryQueue {
    async fn publish(&self, msg: &Message) -> Result<(), QueueError> {
        let body = msg.encode()?;
        self.store.lock().push_back(body);
        Ok(())
    }

    fn consume(
        &self,
        cancel: CancellationToken,
        tracker: &TaskTracker,
    ) -> Result<async_channel::Receiver<Message>, QueueError> {
        Ok(spawn_pump(self.store.clone(), self.poll_interval, cancel, tracker))
    }
}
