//! Hacker News source for hnpipe
//!
//! The batch is one of the story feeds (`topstories.json` by default) and
//! each record is `item/{id}.json`. Unknown ids come back as JSON `null` and
//! are surfaced as deleted tombstones.

pub mod client;
pub mod item;

pub use client::{DEFAULT_BASE_URL, Feed, HnClient};
pub use item::{HnItem, decode_feed, decode_item};
