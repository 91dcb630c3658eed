//! hnpipe Core - bounded concurrent fetch-and-persist pipeline
//!
//! This crate holds the Source/Sink/Queue seams, the in-process pipeline
//! (generator, fetch workers, fan-in, filter) and the durable-queue variant
//! (seeder and queue consumers). Concrete sources and stores live in the
//! `hnpipe-hn` and `hnpipe-store` crates.

pub mod coordinator;
pub mod durable;
pub mod error;
pub mod fan_in;
pub mod filter;
pub mod generator;
pub mod http;
pub mod logging;
pub mod model;
pub mod progress;
pub mod queue;
pub mod retry;
pub mod shutdown;
pub mod sink;
pub mod source;
pub mod stats;
pub mod worker;

// Re-exports for convenience
pub use coordinator::{Coordinator, IntervalReport, PipelineConfig, default_workers};
pub use durable::{QueueConsumer, SeedReport, Seeder};
pub use error::{PipelineError, QueueError, SinkError, SourceError};
pub use filter::{Disposition, dispose};
pub use http::HttpConfig;
pub use logging::{IndicatifLogger, init_logging};
pub use model::{FetchResult, Item, ItemId, ItemKind};
pub use progress::{ProgressContext, SharedProgress, fmt_num};
pub use queue::{MemoryQueue, Message, MessageStore, Queue, spawn_pump};
pub use retry::FetchPolicy;
pub use shutdown::{is_shutdown_requested, request_shutdown, shutdown_flag, shutdown_token};
pub use sink::{MemorySink, Sink};
pub use source::Source;
pub use stats::{LiveSnapshot, LiveStats, RunState, RunStats};
