//! Error types for the fetch-and-persist pipeline
//!
//! Item-level errors ([`SourceError`] from a record fetch, [`SinkError`]) are
//! recorded in run statistics and never abort a run. [`PipelineError`] is
//! reserved for failures that end a run or a seeding pass outright.

use std::time::Duration;

/// Error from a Source call (batch or single record).
#[derive(Debug)]
pub enum SourceError {
    /// HTTP error with optional status code
    Http {
        status: Option<u16>,
        message: String,
    },
    /// Response body could not be decoded
    Decode(String),
    /// Call did not finish within the configured timeout
    Timeout(Duration),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http {
                status: Some(s),
                message,
            } => write!(f, "HTTP {s}: {message}"),
            Self::Http {
                status: None,
                message,
            } => write!(f, "HTTP error: {message}"),
            Self::Decode(msg) => write!(f, "decode error: {msg}"),
            Self::Timeout(d) => write!(f, "timed out after {:.1}s", d.as_secs_f64()),
        }
    }
}

impl std::error::Error for SourceError {}

impl SourceError {
    /// Create HTTP error from reqwest error.
    ///
    /// The URL is stripped so endpoints do not leak into logs.
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return Self::Http {
                status: None,
                message: "request timed out".to_string(),
            };
        }
        let status = e.status().map(|s| s.as_u16());
        if e.is_decode() {
            return Self::Decode(e.without_url().to_string());
        }
        Self::Http {
            status,
            message: e.without_url().to_string(),
        }
    }

    /// Rate limits, server errors, timeouts and transport failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status: None, .. } => true,
            Self::Http {
                status: Some(s), ..
            } => *s == 429 || (500..=599).contains(s),
            Self::Decode(_) => false,
            Self::Timeout(_) => true,
        }
    }
}

/// Error from a Sink write.
#[derive(Debug)]
pub enum SinkError {
    Database(String),
    /// The sink was closed or its worker thread went away
    Closed,
}

impl std::fmt::Display for SinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Database(msg) => write!(f, "database: {msg}"),
            Self::Closed => f.write_str("sink closed"),
        }
    }
}

impl std::error::Error for SinkError {}

/// Error from a durable queue.
#[derive(Debug)]
pub enum QueueError {
    Io(std::io::Error),
    Encode(String),
}

impl std::fmt::Display for QueueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO: {e}"),
            Self::Encode(msg) => write!(f, "encode: {msg}"),
        }
    }
}

impl std::error::Error for QueueError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Encode(_) => None,
        }
    }
}

impl From<std::io::Error> for QueueError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

/// Failure that ends a run or a seeding pass.
#[derive(Debug)]
pub enum PipelineError {
    /// The identifier batch could not be fetched; no item work was started
    BatchFetch(SourceError),
    /// Publishing to the queue failed part-way; `published` messages remain enqueued
    Publish { published: usize, source: QueueError },
    /// The queue could not be opened for consumption
    Queue(QueueError),
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BatchFetch(e) => write!(f, "fetching batch: {e}"),
            Self::Publish { published, source } => {
                write!(f, "publishing after {published} messages: {source}")
            }
            Self::Queue(e) => write!(f, "queue: {e}"),
        }
    }
}

impl std::error::Error for PipelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::BatchFetch(e) => Some(e),
            Self::Publish { source, .. } => Some(source),
            Self::Queue(e) => Some(e),
        }
    }
}
