//! Read side of the pipeline: where identifiers and records come from

use std::future::Future;

use crate::error::SourceError;
use crate::model::{Item, ItemId};

/// Remote record source.
///
/// Implementations must be safe to share across workers; every fetch worker
/// of a run holds the same `Arc<S>`.
pub trait Source: Send + Sync + 'static {
    /// Ordered batch of identifiers to process in one run.
    fn fetch_batch(&self) -> impl Future<Output = Result<Vec<ItemId>, SourceError>> + Send;

    /// Full record for one identifier. Unknown or removed ids come back as
    /// records flagged `dead`/`deleted`, not as errors.
    fn fetch_record(&self, id: ItemId) -> impl Future<Output = Result<Item, SourceError>> + Send;
}
