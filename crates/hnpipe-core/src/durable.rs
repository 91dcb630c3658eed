//! Durable-queue variant: a seeder publishes identifiers, consumers fetch and persist
//!
//! ```text
//! Seeder:   Source::fetch_batch ─▶ Queue::publish (one message per id)
//! Consumer: Queue::consume ─▶ worker × W ─▶ dispose ─▶ Sink::write
//! ```
//!
//! Seeders and consumers only share the queue, so they can run in separate
//! processes and scale independently. Messages are acknowledged at receipt.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::coordinator::fetch_batch;
use crate::error::PipelineError;
use crate::filter::{Disposition, dispose};
use crate::model::FetchResult;
use crate::queue::{Message, Queue};
use crate::retry::{self, FetchPolicy};
use crate::sink::Sink;
use crate::source::Source;
use crate::stats::{LiveSnapshot, LiveStats};

/// Default period between consumer progress lines
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome of a sequence of seeding passes.
#[derive(Debug, Default)]
pub struct SeedReport {
    pub passes: usize,
    pub failed_passes: usize,
    pub published: usize,
}

/// Publishes the current identifier batch to a queue.
pub struct Seeder<S, Q> {
    source: Arc<S>,
    queue: Arc<Q>,
    policy: FetchPolicy,
    interval: Duration,
}

impl<S: Source, Q: Queue> Seeder<S, Q> {
    pub fn new(source: Arc<S>, queue: Arc<Q>, policy: FetchPolicy, interval: Duration) -> Self {
        Self {
            source,
            queue,
            policy,
            interval,
        }
    }

    /// Fetch one batch and publish a message per identifier.
    ///
    /// Stops at the first publish failure; messages published before it stay
    /// enqueued and their count is carried in the error. Returns the number
    /// published, which is short of the batch size only when cancelled.
    pub async fn seed_once(&self, cancel: &CancellationToken) -> Result<usize, PipelineError> {
        let ids = match fetch_batch(&*self.source, &self.policy, cancel).await {
            None => return Ok(0),
            Some(Err(e)) => {
                log::error!("fetching batch: {e}");
                return Err(PipelineError::BatchFetch(e));
            }
            Some(Ok(ids)) => ids,
        };

        let mut published = 0;
        for id in &ids {
            if cancel.is_cancelled() {
                log::warn!("seeding cancelled after {published}/{} messages", ids.len());
                break;
            }
            if let Err(source) = self.queue.publish(&Message::new(*id)).await {
                log::error!("publishing item {id}: {source}");
                return Err(PipelineError::Publish { published, source });
            }
            published += 1;
        }
        log::info!("seeded {published} messages");
        Ok(published)
    }

    /// Seed immediately, then once per interval, until `cancel` fires.
    pub async fn run_on_interval(&self, cancel: &CancellationToken) -> SeedReport {
        let mut ticker = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut report = SeedReport::default();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            report.passes += 1;
            match self.seed_once(cancel).await {
                Ok(n) => report.published += n,
                Err(e) => {
                    report.failed_passes += 1;
                    if let PipelineError::Publish { published, .. } = &e {
                        report.published += published;
                    }
                    log::error!("seeding pass {} failed: {e}", report.passes);
                }
            }
        }
        report
    }
}

/// Pulls messages off a queue with a fixed pool of fetch workers.
pub struct QueueConsumer<S, K, Q> {
    source: Arc<S>,
    sink: Arc<K>,
    queue: Arc<Q>,
    workers: usize,
    policy: FetchPolicy,
    report_interval: Duration,
    stats: Arc<LiveStats>,
}

impl<S: Source, K: Sink, Q: Queue> QueueConsumer<S, K, Q> {
    pub fn new(
        source: Arc<S>,
        sink: Arc<K>,
        queue: Arc<Q>,
        workers: usize,
        policy: FetchPolicy,
    ) -> Self {
        Self {
            source,
            sink,
            queue,
            workers,
            policy,
            report_interval: DEFAULT_REPORT_INTERVAL,
            stats: Arc::default(),
        }
    }

    pub fn with_report_interval(mut self, every: Duration) -> Self {
        self.report_interval = every;
        self
    }

    /// Counters updated as messages are processed.
    pub fn stats(&self) -> Arc<LiveStats> {
        Arc::clone(&self.stats)
    }

    /// Consume until `cancel` fires, then wait for every worker to exit and
    /// for undelivered messages to be requeued.
    ///
    /// A message a worker received but could not finish before cancellation
    /// is acknowledged and lost, like a crash after receipt.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<LiveSnapshot, PipelineError> {
        let tracker = TaskTracker::new();
        let messages = self
            .queue
            .consume(cancel.clone(), &tracker)
            .map_err(PipelineError::Queue)?;
        log::info!("consuming with {} workers", self.workers);

        for n in 0..self.workers {
            let messages = messages.clone();
            let source = Arc::clone(&self.source);
            let sink = Arc::clone(&self.sink);
            let stats = Arc::clone(&self.stats);
            let policy = self.policy;
            let cancel = cancel.clone();
            tracker.spawn(async move {
                loop {
                    let msg = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        r = messages.recv() => match r {
                            Ok(msg) => msg,
                            Err(_) => break,
                        },
                    };
                    stats.record_received();

                    let result = match retry::fetch_record(&*source, msg.id, &policy, &cancel).await {
                        None => {
                            log::warn!("worker {n}: item {} abandoned on cancel", msg.id);
                            break;
                        }
                        Some(Ok(item)) => FetchResult::Fetched(item),
                        Some(Err(error)) => FetchResult::Failed { id: msg.id, error },
                    };
                    match dispose(&*sink, result).await {
                        Disposition::Stored => stats.record_succeeded(),
                        Disposition::Filtered => stats.record_filtered(),
                        Disposition::FetchFailed => stats.record_fetch_failed(),
                        Disposition::PersistFailed => stats.record_persist_failed(),
                    }
                }
            });
        }
        drop(messages);

        let stats = Arc::clone(&self.stats);
        let every = self.report_interval.max(Duration::from_millis(1));
        let reporter_cancel = cancel.clone();
        tracker.spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    biased;
                    _ = reporter_cancel.cancelled() => break,
                    _ = ticker.tick() => stats.snapshot().log(),
                }
            }
        });

        tracker.close();
        tracker.wait().await;

        let snapshot = self.stats.snapshot();
        snapshot.log();
        Ok(snapshot)
    }
}
