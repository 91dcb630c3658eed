//! Logging setup with indicatif integration

use indicatif::MultiProgress;

/// Crates whose records follow the chosen level; everything else stays at warn.
const OWN_TARGETS: &[&str] = &["hnpipe", "hnpipe_core", "hnpipe_hn", "hnpipe_store"];

/// ANSI color code and padded label for a log level.
fn level_style(level: log::Level, color: bool) -> (&'static str, &'static str, &'static str) {
    let label = match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    };
    if !color {
        return ("", label, "");
    }
    let ansi = match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    };
    (ansi, label, "\x1b[0m")
}

/// `RUST_LOG`-style default: warn globally, `level` for this workspace.
fn default_filter(level: &str) -> String {
    let mut filter = String::from("warn");
    for target in OWN_TARGETS {
        filter.push_str(&format!(",{target}={level}"));
    }
    filter
}

/// Logger that prints through indicatif MultiProgress so lines never tear a bar.
pub struct IndicatifLogger {
    inner: env_logger::Logger,
    multi: MultiProgress,
}

impl IndicatifLogger {
    pub fn new(inner: env_logger::Logger, multi: MultiProgress) -> Self {
        Self { inner, multi }
    }
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if self.inner.enabled(record.metadata()) {
            let (pre, label, post) = level_style(record.level(), true);
            let line = format!("[{pre}{label}{post}] {}", record.args());
            self.multi.suspend(|| eprintln!("{line}"));
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

/// Initialize logging with optional TTY mode (indicatif integration).
///
/// `RUST_LOG` overrides the default filter.
pub fn init_logging(quiet: bool, debug: bool, multi: Option<&MultiProgress>) {
    use std::io::Write;

    let level = if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let env = env_logger::Env::default().default_filter_or(default_filter(level));

    if let Some(multi) = multi {
        let logger = env_logger::Builder::from_env(env)
            .format_timestamp_millis()
            .build();
        let max_level = logger.filter();

        if log::set_boxed_logger(Box::new(IndicatifLogger::new(logger, multi.clone()))).is_ok() {
            log::set_max_level(max_level);
        }
    } else {
        // Non-TTY: no ANSI colors, RFC3339 timestamp for log aggregation
        let _ = env_logger::Builder::from_env(env)
            .format(|buf, record| {
                let (_, label, _) = level_style(record.level(), false);
                writeln!(buf, "{} [{label}] {}", buf.timestamp_millis(), record.args())
            })
            .try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_covers_workspace_crates() {
        let filter = default_filter("debug");
        assert!(filter.starts_with("warn,"));
        assert!(filter.contains("hnpipe_core=debug"));
        assert!(filter.contains("hnpipe=debug"));
    }

    #[test]
    fn plain_labels_have_no_ansi() {
        let (pre, label, post) = level_style(log::Level::Warn, false);
        assert_eq!((pre, label, post), ("", "WARN ", ""));
    }
}
