//! Subcommand implementations

pub mod consume;
pub mod list;
pub mod run;
pub mod seed;

use anyhow::{Context, Result};
use hnpipe_hn::{Feed, HnClient};
use hnpipe_store::{DuckDbStore, SpoolQueue};

use crate::config::Config;

pub(crate) fn open_source(config: &Config) -> Result<HnClient> {
    let feed = Feed::from_name(&config.source.feed)
        .with_context(|| format!("unknown feed: {}", config.source.feed))?;
    HnClient::new(&config.source.base_url, feed, &config.http_config())
        .context("Failed to build HTTP client")
}

pub(crate) fn open_store(config: &Config) -> Result<DuckDbStore> {
    DuckDbStore::open(&config.store.path)
        .with_context(|| format!("Failed to open item store {}", config.store.path.display()))
}

pub(crate) fn open_queue(config: &Config) -> Result<SpoolQueue> {
    SpoolQueue::open(&config.queue.dir, config.poll_interval())
        .with_context(|| format!("Failed to open queue {}", config.queue.dir.display()))
}
