//! Run lifecycle and statistics.
//!
//! - [`RunPhase`]: `Idle → FetchingBatch → FetchingItems → Completed`, with
//!   `Cancelled` reachable from every non-terminal phase.
//! - [`RunStats`]: per-run summary owned by the coordinator (single writer).
//! - [`LiveStats`]: continuous atomic counters for queue consumers, which have
//!   no run boundary.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::progress::fmt_num;

/// Phase of a single run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    FetchingBatch,
    FetchingItems,
    Completed,
    Cancelled,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Whether `self → next` is a legal step.
    pub fn can_advance_to(self, next: Self) -> bool {
        use RunPhase::*;
        match (self, next) {
            (Idle, FetchingBatch) | (FetchingBatch, FetchingItems) | (FetchingItems, Completed) => {
                true
            }
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::FetchingBatch => "fetching batch",
            Self::FetchingItems => "fetching items",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for RunPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of a finished run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Completed,
    Cancelled,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Summary of one run.
#[derive(Clone, Debug)]
pub struct RunStats {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    /// Identifiers returned by the batch fetch
    pub requested: usize,
    /// Items written to the sink (including idempotent duplicates)
    pub succeeded: usize,
    /// Dead or deleted items, deliberately skipped
    pub filtered: usize,
    pub fetch_failed: usize,
    pub persist_failed: usize,
    pub state: RunState,
}

impl RunStats {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            elapsed: Duration::ZERO,
            requested: 0,
            succeeded: 0,
            filtered: 0,
            fetch_failed: 0,
            persist_failed: 0,
            state: RunState::Completed,
        }
    }

    /// Item-level failures of either kind.
    pub fn failed(&self) -> usize {
        self.fetch_failed + self.persist_failed
    }

    /// Fetch results observed by the coordinator.
    pub fn attempted(&self) -> usize {
        self.succeeded + self.filtered + self.failed()
    }

    /// Log run completion (non-TTY mode and every interval run).
    pub fn log(&self) {
        log::info!(
            "run {}: {} stored, {} filtered, {} failed ({} fetch, {} persist) of {} requested [{:.1}s]",
            self.state,
            fmt_num(self.succeeded),
            fmt_num(self.filtered),
            fmt_num(self.failed()),
            fmt_num(self.fetch_failed),
            fmt_num(self.persist_failed),
            fmt_num(self.requested),
            self.elapsed.as_secs_f64()
        );
    }

    /// Format summary table as a string.
    pub fn format_table(&self) -> String {
        let pct = |n: usize| {
            if self.requested > 0 {
                format!("{:.1}", n as f64 / self.requested as f64 * 100.0)
            } else {
                "-".to_string()
            }
        };

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .apply_modifier(UTF8_ROUND_CORNERS)
            .set_header(vec![
                Cell::new(format!("Run ({})", self.state))
                    .fg(Color::Cyan)
                    .add_attribute(comfy_table::Attribute::Bold),
                Cell::new("Items").fg(Color::Cyan),
                Cell::new("%").fg(Color::Cyan),
            ]);
        table.add_row(vec![
            Cell::new("Requested"),
            Cell::new(fmt_num(self.requested)),
            Cell::new(""),
        ]);
        table.add_row(vec![
            Cell::new("Stored"),
            Cell::new(fmt_num(self.succeeded)).fg(Color::Green),
            Cell::new(pct(self.succeeded)),
        ]);
        table.add_row(vec![
            Cell::new("Filtered (dead/deleted)"),
            Cell::new(fmt_num(self.filtered)),
            Cell::new(pct(self.filtered)),
        ]);
        table.add_row(vec![
            Cell::new("Fetch failed"),
            Cell::new(fmt_num(self.fetch_failed)).fg(Color::Red),
            Cell::new(pct(self.fetch_failed)),
        ]);
        table.add_row(vec![
            Cell::new("Persist failed"),
            Cell::new(fmt_num(self.persist_failed)).fg(Color::Red),
            Cell::new(pct(self.persist_failed)),
        ]);
        table.add_row(vec![
            Cell::new("Elapsed"),
            Cell::new(format!("{:.1}s", self.elapsed.as_secs_f64())),
            Cell::new(""),
        ]);
        table.to_string()
    }

    /// Print summary table to stderr (TTY mode).
    pub fn print(&self) {
        eprintln!("\n{}", self.format_table());
    }
}

/// Continuous counters for queue consumers.
#[derive(Debug, Default)]
pub struct LiveStats {
    received: AtomicU64,
    succeeded: AtomicU64,
    filtered: AtomicU64,
    fetch_failed: AtomicU64,
    persist_failed: AtomicU64,
}

/// Point-in-time copy of [`LiveStats`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LiveSnapshot {
    pub received: u64,
    pub succeeded: u64,
    pub filtered: u64,
    pub fetch_failed: u64,
    pub persist_failed: u64,
}

impl LiveStats {
    pub fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_succeeded(&self) {
        self.succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_filtered(&self) {
        self.filtered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_fetch_failed(&self) {
        self.fetch_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persist_failed(&self) {
        self.persist_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        LiveSnapshot {
            received: self.received.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            fetch_failed: self.fetch_failed.load(Ordering::Relaxed),
            persist_failed: self.persist_failed.load(Ordering::Relaxed),
        }
    }
}

impl LiveSnapshot {
    pub fn log(&self) {
        log::info!(
            "consumer: {} received, {} stored, {} filtered, {} fetch failed, {} persist failed",
            self.received,
            self.succeeded,
            self.filtered,
            self.fetch_failed,
            self.persist_failed
        );
    }
}
