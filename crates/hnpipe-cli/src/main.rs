//! hnpipe - fetch Hacker News items concurrently and persist the live ones
//!
//! `run` drives the in-process pipeline; `seed` and `consume` split it across
//! a durable spool queue so both sides can scale independently.

use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hnpipe_core::{ProgressContext, shutdown_flag, shutdown_token};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "hnpipe")]
#[command(about = "Concurrent Hacker News fetch-and-persist pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Config file path (default: ./hnpipe.toml or ~/.config/hnpipe/config.toml)
    #[arg(short, long, global = true)]
    config: Option<std::path::PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, global = true)]
    request_timeout: Option<u64>,

    /// Maximum retry attempts for transient failures
    #[arg(long, global = true)]
    max_retries: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch and persist items in-process, once or on an interval
    Run(cmd::run::RunArgs),
    /// Publish the current id batch to the durable queue
    Seed(cmd::seed::SeedArgs),
    /// Consume queued ids and persist the items
    Consume(cmd::consume::ConsumeArgs),
    /// List stored items
    List(cmd::list::ListArgs),
    /// Show current configuration
    Config,
}

/// First SIGINT/SIGTERM requests a graceful stop; a second one exits immediately.
fn install_signal_handlers() -> Result<()> {
    for signal in [signal_hook::consts::SIGTERM, signal_hook::consts::SIGINT] {
        // SAFETY: the handler only touches an atomic and calls exit
        unsafe {
            signal_hook::low_level::register(signal, || {
                if shutdown_flag().swap(true, Ordering::Relaxed) {
                    std::process::exit(130);
                }
            })
        }
        .with_context(|| format!("Failed to register handler for signal {signal}"))?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let progress = Arc::new(ProgressContext::new());

    // Logging:
    //   TTY:     info through the progress bars, debug with --debug
    //   non-TTY: plain lines, logs are the only progress indicator
    let multi = progress.is_tty().then(|| progress.multi());
    hnpipe_core::init_logging(false, cli.debug, multi);

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    if let Some(secs) = cli.request_timeout {
        config.http.request_timeout_secs = secs;
    }
    if let Some(n) = cli.max_retries {
        config.http.max_retries = n;
    }

    match cli.command {
        Command::List(args) => cmd::list::run(args, &config),
        Command::Config => {
            print_config(&config);
            Ok(())
        }
        command => {
            install_signal_handlers()?;
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start async runtime")?;
            runtime.block_on(async {
                let cancel = shutdown_token();
                let result = match command {
                    Command::Run(args) => cmd::run::run(args, &config, &progress, &cancel).await,
                    Command::Seed(args) => cmd::seed::run(args, &config, &cancel).await,
                    Command::Consume(args) => cmd::consume::run(args, &config, &cancel).await,
                    Command::List(_) | Command::Config => Ok(()),
                };
                // Stop the signal bridge task
                cancel.cancel();
                result
            })
        }
    }
}

fn print_config(config: &Config) {
    use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    table.add_row(vec!["Workers", &config.pipeline.workers.to_string()]);
    table.add_row(vec!["Interval", &format!("{}s", config.pipeline.interval_secs)]);
    table.add_row(vec![
        "Run deadline",
        &config
            .pipeline
            .run_deadline_secs
            .map_or("none".to_string(), |s| format!("{s}s")),
    ]);
    table.add_row(vec!["Source URL", &config.source.base_url]);
    table.add_row(vec!["Feed", &config.source.feed]);
    table.add_row(vec![
        "Timeouts",
        &format!(
            "connect {}s, request {}s",
            config.http.connect_timeout_secs, config.http.request_timeout_secs
        ),
    ]);
    table.add_row(vec![
        "Retries",
        &format!(
            "{} (base delay {}ms)",
            config.http.max_retries, config.http.retry_base_delay_ms
        ),
    ]);
    table.add_row(vec!["Item store", &config.store.path.display().to_string()]);
    table.add_row(vec!["Queue dir", &config.queue.dir.display().to_string()]);
    table.add_row(vec![
        "Queue poll",
        &format!("{}ms", config.queue.poll_interval_ms),
    ]);
    table.add_row(vec![
        "Consumer stats",
        &format!("every {}s", config.queue.stats_interval_secs),
    ]);

    eprintln!("\n{table}");
}
