//! hnpipe Store - durable collaborators for the pipeline
//!
//! - [`DuckDbStore`]: item [`Sink`](hnpipe_core::Sink) with an idempotent write
//!   and a read path for listing stored items.
//! - [`SpoolQueue`]: crash-resumable directory [`Queue`](hnpipe_core::Queue)
//!   safe for several consumer processes.

mod items;
mod spool;

pub use items::DuckDbStore;
pub use spool::{CLAIM_GRACE, DEFAULT_POLL_INTERVAL, SpoolQueue};
