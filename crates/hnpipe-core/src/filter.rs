//! Filter-and-persist step applied to every fetch result

use crate::model::FetchResult;
use crate::sink::Sink;

/// What happened to one fetch result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Stored,
    /// Dead or deleted: skipped on purpose, not an error
    Filtered,
    FetchFailed,
    PersistFailed,
}

/// Drop failures and dead/deleted items, write everything else to `sink`.
///
/// Errors are logged here and reported only through the returned
/// disposition; nothing is retried.
pub async fn dispose<K: Sink>(sink: &K, result: FetchResult) -> Disposition {
    match result {
        FetchResult::Failed { id, error } => {
            log::warn!("item {id}: fetch failed: {error}");
            Disposition::FetchFailed
        }
        FetchResult::Fetched(item) if !item.is_live() => {
            log::debug!(
                "item {}: skipped (dead={}, deleted={})",
                item.id,
                item.dead,
                item.deleted
            );
            Disposition::Filtered
        }
        FetchResult::Fetched(item) => match sink.write(&item).await {
            Ok(()) => {
                log::debug!("item {}: stored", item.id);
                Disposition::Stored
            }
            Err(e) => {
                log::error!("item {}: persist failed: {e}", item.id);
                Disposition::PersistFailed
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{SinkError, SourceError};
    use crate::model::{Item, ItemId, ItemKind};
    use crate::sink::MemorySink;

    struct BrokenSink;

    impl Sink for BrokenSink {
        async fn write(&self, _item: &Item) -> Result<(), SinkError> {
            Err(SinkError::Database("read-only".into()))
        }
    }

    #[tokio::test]
    async fn live_item_is_stored() {
        let sink = MemorySink::new();
        let d = dispose(&sink, FetchResult::Fetched(Item::new(1, ItemKind::Story))).await;
        assert_eq!(d, Disposition::Stored);
        assert_eq!(sink.len(), 1);
    }

    #[tokio::test]
    async fn dead_and_deleted_never_reach_sink() {
        let sink = MemorySink::new();
        let mut dead = Item::new(1, ItemKind::Story);
        dead.dead = true;
        let mut deleted = Item::new(2, ItemKind::Job);
        deleted.deleted = true;

        assert_eq!(
            dispose(&sink, FetchResult::Fetched(dead)).await,
            Disposition::Filtered
        );
        assert_eq!(
            dispose(&sink, FetchResult::Fetched(deleted)).await,
            Disposition::Filtered
        );
        assert_eq!(sink.attempts(), 0);
    }

    #[tokio::test]
    async fn fetch_error_is_recorded() {
        let sink = MemorySink::new();
        let result = FetchResult::Failed {
            id: ItemId(3),
            error: SourceError::Decode("truncated".into()),
        };
        assert_eq!(dispose(&sink, result).await, Disposition::FetchFailed);
        assert_eq!(sink.attempts(), 0);
    }

    #[tokio::test]
    async fn sink_error_is_recorded() {
        let d = dispose(&BrokenSink, FetchResult::Fetched(Item::new(4, ItemKind::Story))).await;
        assert_eq!(d, Disposition::PersistFailed);
    }
}
