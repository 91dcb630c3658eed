//! `hnpipe seed` - publish the current batch to the durable queue

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use hnpipe_core::Seeder;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

#[derive(Args, Debug)]
pub struct SeedArgs {
    /// Seed a single batch and exit
    #[arg(long)]
    pub once: bool,

    /// Seconds between seeding passes
    #[arg(long)]
    pub interval: Option<u64>,
}

pub async fn run(args: SeedArgs, config: &Config, cancel: &CancellationToken) -> Result<()> {
    let interval = args
        .interval
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.pipeline_config().interval);
    let seeder = Seeder::new(
        Arc::new(super::open_source(config)?),
        Arc::new(super::open_queue(config)?),
        config.http_config().fetch_policy(),
        interval,
    );

    if args.once {
        seeder.seed_once(cancel).await?;
        return Ok(());
    }

    let report = seeder.run_on_interval(cancel).await;
    log::info!(
        "seeder stopped: {} passes ({} failed), {} messages published",
        report.passes,
        report.failed_passes,
        report.published
    );
    Ok(())
}
