//! `hnpipe run` - in-process pipeline, once or on an interval

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use hnpipe_core::{Coordinator, SharedProgress};
use tokio_util::sync::CancellationToken;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Execute a single run and exit
    #[arg(long)]
    pub once: bool,

    /// Number of concurrent fetch workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Seconds between runs
    #[arg(long)]
    pub interval: Option<u64>,

    /// Cancel a run still going after this many seconds
    #[arg(long)]
    pub deadline: Option<u64>,
}

pub async fn run(
    args: RunArgs,
    config: &Config,
    progress: &SharedProgress,
    cancel: &CancellationToken,
) -> Result<()> {
    let mut pipeline = config.pipeline_config();
    if let Some(workers) = args.workers {
        pipeline.workers = workers;
    }
    if let Some(secs) = args.interval {
        pipeline.interval = Duration::from_secs(secs);
    }
    if let Some(secs) = args.deadline {
        pipeline.run_deadline = Some(Duration::from_secs(secs));
    }

    let source = Arc::new(super::open_source(config)?);
    let store = Arc::new(super::open_store(config)?);
    let coordinator =
        Coordinator::new(source, store, pipeline).with_progress(Arc::clone(progress));

    if args.once {
        let stats = coordinator.run_once(cancel).await?;
        if progress.is_tty() {
            stats.print();
        }
        return Ok(());
    }

    log::info!(
        "running every {:?} with {} workers",
        coordinator.config().interval,
        coordinator.config().workers
    );
    let report = coordinator.run_on_interval(cancel).await;
    if let Some(last) = report.last.filter(|_| progress.is_tty()) {
        last.print();
    }
    Ok(())
}
