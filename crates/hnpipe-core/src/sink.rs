//! Write side of the pipeline and an in-memory implementation

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::SinkError;
use crate::model::{Item, ItemId, ItemKind};

/// Durable record store.
///
/// `write` is an idempotent insert keyed by item id: writing an id that is
/// already stored is a silent no-op (no error, no update).
pub trait Sink: Send + Sync + 'static {
    fn write(&self, item: &Item) -> impl Future<Output = Result<(), SinkError>> + Send;
}

/// Map-backed sink. Keeps the first write of every id.
#[derive(Debug, Default)]
pub struct MemorySink {
    items: Mutex<BTreeMap<ItemId, Item>>,
    attempts: AtomicUsize,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `write` calls, duplicates included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: ItemId) -> Option<Item> {
        self.lock().get(&id).cloned()
    }

    /// Stored items in id order, optionally restricted to one kind.
    pub fn items(&self, kind: Option<ItemKind>) -> Vec<Item> {
        self.lock()
            .values()
            .filter(|item| kind.map_or(true, |k| item.kind == k))
            .cloned()
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<ItemId, Item>> {
        // A panic while holding the lock cannot leave the map half-updated
        self.items.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Sink for MemorySink {
    async fn write(&self, item: &Item) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::Relaxed);
        self.lock().entry(item.id).or_insert_with(|| item.clone());
        Ok(())
    }
}
