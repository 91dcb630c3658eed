//! `hnpipe consume` - continuous queue workers persisting into the item store

use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use hnpipe_core::QueueConsumer;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct ConsumeArgs {
    /// Number of concurrent queue workers
    #[arg(short, long)]
    pub workers: Option<usize>,
}

pub async fn run(args: ConsumeArgs, config: &Config, cancel: &CancellationToken) -> Result<()> {
    let workers = args.workers.unwrap_or(config.pipeline.workers);
    let consumer = QueueConsumer::new(
        Arc::new(super::open_source(config)?),
        Arc::new(super::open_store(config)?),
        Arc::new(super::open_queue(config)?),
        workers,
        config.http_config().fetch_policy(),
    )
    .with_report_interval(config.stats_interval());

    consumer.run(cancel).await?;
    Ok(())
}
