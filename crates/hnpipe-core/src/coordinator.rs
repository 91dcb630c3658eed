//! Pipeline coordinator: one run is batch fetch → fan-out → fan-in → filter/persist
//!
//! ```text
//! Source::fetch_batch ─▶ generate ─▶ worker × W ─▶ fan_in ─▶ dispose ─▶ Sink::write
//! ```
//!
//! The identifier set is captured once per run. Only a failed batch fetch
//! fails the run; item-level failures are counted and skipped.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::error::{PipelineError, SourceError};
use crate::fan_in::fan_in;
use crate::filter::{Disposition, dispose};
use crate::generator::generate;
use crate::model::ItemId;
use crate::progress::{ProgressContext, SharedProgress};
use crate::retry::FetchPolicy;
use crate::sink::Sink;
use crate::source::Source;
use crate::stats::{RunPhase, RunState, RunStats};
use crate::worker::spawn_fetch_workers;

/// Default pause between interval runs
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(300);

/// Host processor count, falling back to 4 when it cannot be determined.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

/// Runtime settings consumed by the pipeline.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Concurrent fetch workers per run (or per consumer process)
    pub workers: usize,
    /// Pause between runs / seeding passes
    pub interval: Duration,
    /// Cancel a run that is still going after this long
    pub run_deadline: Option<Duration>,
    pub fetch: FetchPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            interval: DEFAULT_INTERVAL,
            run_deadline: None,
            fetch: FetchPolicy::default(),
        }
    }
}

/// Outcome of a sequence of interval runs.
#[derive(Debug, Default)]
pub struct IntervalReport {
    pub runs: usize,
    pub failed_runs: usize,
    pub last: Option<RunStats>,
}

/// Batch-level Source call under the fetch timeout. `None` means cancelled.
pub(crate) async fn fetch_batch<S: Source>(
    source: &S,
    policy: &FetchPolicy,
    cancel: &CancellationToken,
) -> Option<Result<Vec<ItemId>, SourceError>> {
    let call = async {
        match policy.timeout {
            Some(limit) => tokio::time::timeout(limit, source.fetch_batch())
                .await
                .unwrap_or(Err(SourceError::Timeout(limit))),
            None => source.fetch_batch().await,
        }
    };
    tokio::select! {
        biased;
        _ = cancel.cancelled() => None,
        r = call => Some(r),
    }
}

/// Tracks the current phase and rejects illegal transitions.
struct Lifecycle(RunPhase);

impl Lifecycle {
    fn advance(&mut self, next: RunPhase) {
        debug_assert!(
            self.0.can_advance_to(next),
            "illegal run transition {} -> {next}",
            self.0
        );
        log::debug!("run: {} -> {next}", self.0);
        self.0 = next;
    }
}

/// Drives runs of the in-process pipeline against one Source and one Sink.
pub struct Coordinator<S, K> {
    source: Arc<S>,
    sink: Arc<K>,
    config: PipelineConfig,
    progress: SharedProgress,
}

impl<S: Source, K: Sink> Coordinator<S, K> {
    pub fn new(source: Arc<S>, sink: Arc<K>, config: PipelineConfig) -> Self {
        Self {
            source,
            sink,
            config,
            progress: Arc::new(ProgressContext::hidden()),
        }
    }

    /// Show a progress bar per run when `progress` is on a TTY.
    pub fn with_progress(mut self, progress: SharedProgress) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute one run.
    ///
    /// Returns `Err` only when the batch fetch fails, in which case no sink
    /// write was attempted. Cancellation is not an error: the stats come back
    /// with [`RunState::Cancelled`]. Every spawned task has exited by the time
    /// this returns.
    pub async fn run_once(&self, cancel: &CancellationToken) -> Result<RunStats, PipelineError> {
        let start = Instant::now();
        let mut stats = RunStats::new(Utc::now());
        let mut phase = Lifecycle(RunPhase::Idle);

        // Child token: the deadline may cancel this run without touching the caller's
        let run_cancel = cancel.child_token();
        let _release = run_cancel.clone().drop_guard();
        if let Some(deadline) = self.config.run_deadline {
            let token = run_cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = token.cancelled() => {}
                    _ = tokio::time::sleep(deadline) => {
                        log::warn!("run exceeded {deadline:?}, cancelling");
                        token.cancel();
                    }
                }
            });
        }

        phase.advance(RunPhase::FetchingBatch);
        let ids = match fetch_batch(&*self.source, &self.config.fetch, &run_cancel).await {
            None => {
                phase.advance(RunPhase::Cancelled);
                stats.state = RunState::Cancelled;
                stats.elapsed = start.elapsed();
                stats.log();
                return Ok(stats);
            }
            Some(Err(e)) => {
                log::error!("fetching batch: {e}");
                return Err(PipelineError::BatchFetch(e));
            }
            Some(Ok(ids)) => ids,
        };
        stats.requested = ids.len();
        log::info!(
            "fetched {} ids, fetching with {} workers",
            ids.len(),
            self.config.workers
        );

        phase.advance(RunPhase::FetchingItems);
        let tracker = TaskTracker::new();
        let id_stream = generate(ids, run_cancel.clone(), &tracker);
        let outputs = spawn_fetch_workers(
            self.config.workers,
            &self.source,
            &id_stream,
            self.config.fetch,
            &run_cancel,
            &tracker,
        );
        // Workers hold their own clones; with W = 0 this lets the generator finish
        drop(id_stream);
        let mut merged = fan_in(outputs, &run_cancel, &tracker);
        tracker.close();

        let pb = self.progress.run_bar(stats.requested);
        loop {
            let result = tokio::select! {
                biased;
                _ = run_cancel.cancelled() => break,
                r = merged.recv() => match r {
                    Some(r) => r,
                    None => break,
                },
            };
            pb.inc(1);
            match dispose(&*self.sink, result).await {
                Disposition::Stored => stats.succeeded += 1,
                Disposition::Filtered => stats.filtered += 1,
                Disposition::FetchFailed => stats.fetch_failed += 1,
                Disposition::PersistFailed => stats.persist_failed += 1,
            }
        }
        let cancelled = run_cancel.is_cancelled();
        drop(merged);
        tracker.wait().await;
        pb.finish_and_clear();

        if cancelled {
            phase.advance(RunPhase::Cancelled);
            stats.state = RunState::Cancelled;
        } else {
            phase.advance(RunPhase::Completed);
        }
        stats.elapsed = start.elapsed();
        stats.log();
        Ok(stats)
    }

    /// Run immediately, then once per interval, until `cancel` fires.
    ///
    /// A failed run is logged and the next one is still scheduled.
    pub async fn run_on_interval(&self, cancel: &CancellationToken) -> IntervalReport {
        let period = self.config.interval.max(Duration::from_millis(1));
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut report = IntervalReport::default();
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            report.runs += 1;
            match self.run_once(cancel).await {
                Ok(stats) => report.last = Some(stats),
                Err(e) => {
                    report.failed_runs += 1;
                    log::error!("run {} failed: {e}", report.runs);
                }
            }
        }
        log::info!(
            "stopped after {} runs ({} failed)",
            report.runs,
            report.failed_runs
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = PipelineConfig::default();
        assert!(config.workers >= 1);
        assert_eq!(config.interval, Duration::from_secs(300));
        assert!(config.run_deadline.is_none());
        assert_eq!(config.fetch.max_retries, 0);
    }

    #[test]
    #[should_panic(expected = "illegal run transition")]
    #[cfg(debug_assertions)]
    fn lifecycle_rejects_skips() {
        let mut phase = Lifecycle(RunPhase::Idle);
        phase.advance(RunPhase::Completed);
    }
}
