//! Spool-directory queue shared by seeder and consumer processes
//!
//! ```text
//! <dir>/tmp/<name>.tmp      being written
//! <dir>/ready/<name>.json   published, waiting
//! <dir>/claimed/<claimed-at>-<name>.json taken by one consumer, deleted once read
//! ```
//!
//! Names sort in publish order. Every state change is a rename within one
//! filesystem, so a message is visible in exactly one place and only one
//! process can win a claim. Opening the spool only recovers claims older
//! than [`CLAIM_GRACE`], so a consumer starting up never takes back a claim
//! another live consumer is still reading.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use hnpipe_core::{Message, MessageStore, Queue, QueueError, spawn_pump};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Default delay between polls of an empty queue
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Age after which a claimed message is presumed orphaned by a crash
pub const CLAIM_GRACE: Duration = Duration::from_secs(60);

/// Durable [`Queue`] backed by a directory.
#[derive(Clone, Debug)]
pub struct SpoolQueue {
    store: Arc<SpoolDir>,
    poll_interval: Duration,
}

#[derive(Clone, Debug)]
struct SpoolDir {
    ready: PathBuf,
    claimed: PathBuf,
    tmp: PathBuf,
    counter: Arc<AtomicU64>,
}

impl SpoolQueue {
    /// Open the spool at `dir`, creating it if needed.
    ///
    /// Leftover temp files are removed and messages claimed more than
    /// [`CLAIM_GRACE`] ago are put back in `ready/`.
    pub fn open(dir: &Path, poll_interval: Duration) -> Result<Self, QueueError> {
        let store = SpoolDir {
            ready: dir.join("ready"),
            claimed: dir.join("claimed"),
            tmp: dir.join("tmp"),
            counter: Arc::new(AtomicU64::new(0)),
        };
        for sub in [&store.ready, &store.claimed, &store.tmp] {
            fs::create_dir_all(sub)?;
        }
        let (removed, recovered) = store.recover(CLAIM_GRACE)?;
        if removed > 0 || recovered > 0 {
            log::info!(
                "queue {}: removed {removed} stale tmp files, recovered {recovered} claimed messages",
                dir.display()
            );
        }
        Ok(Self {
            store: Arc::new(store),
            poll_interval,
        })
    }

    /// Messages waiting in `ready/`.
    pub fn len(&self) -> Result<usize, QueueError> {
        Ok(self.store.ready_names()?.len())
    }

    pub fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len()? == 0)
    }
}

impl SpoolDir {
    fn recover(&self, grace: Duration) -> io::Result<(usize, usize)> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.tmp)? {
            let entry = entry?;
            if entry.path().is_file() {
                fs::remove_file(entry.path())?;
                removed += 1;
            }
        }
        let cutoff = unix_nanos().saturating_sub(grace.as_nanos());
        let mut recovered = 0;
        for entry in fs::read_dir(&self.claimed)? {
            let entry = entry?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            // Unparseable names have no claim time and are always stale
            let (claimed_at, name) = match file_name.split_once('-') {
                Some((at, name)) => (at.parse::<u128>().unwrap_or(0), name),
                None => (0, file_name.as_str()),
            };
            if claimed_at > cutoff {
                continue;
            }
            match fs::rename(entry.path(), self.ready.join(name)) {
                Ok(()) => recovered += 1,
                // Another process recovered it first
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok((removed, recovered))
    }

    /// Sortable unique name: `<unix-nanos>-<pid>-<counter>`.
    fn next_name(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{:020}-{:010}-{n:06}", unix_nanos(), std::process::id())
    }

    /// Write to `tmp/` then rename into `ready/`.
    fn append(&self, body: &[u8]) -> io::Result<()> {
        let name = self.next_name();
        let tmp = self.tmp.join(format!("{name}.tmp"));
        fs::write(&tmp, body)?;
        fs::rename(&tmp, self.ready.join(format!("{name}.json")))
    }

    fn ready_names(&self) -> io::Result<Vec<String>> {
        let mut names: Vec<String> = fs::read_dir(&self.ready)?
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .filter(|n| n.ends_with(".json"))
            .collect();
        names.sort_unstable();
        Ok(names)
    }

    fn take_oldest(&self) -> io::Result<Option<Vec<u8>>> {
        for name in self.ready_names()? {
            let claimed = self.claimed.join(format!("{:020}-{name}", unix_nanos()));
            match fs::rename(self.ready.join(&name), &claimed) {
                Ok(()) => {
                    let body = fs::read(&claimed)?;
                    fs::remove_file(&claimed)?;
                    return Ok(Some(body));
                }
                // Lost the race to another consumer; try the next one
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }
}

fn unix_nanos() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_nanos())
}

async fn blocking<T, F>(f: F) -> Result<T, QueueError>
where
    T: Send + 'static,
    F: FnOnce() -> io::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| QueueError::Io(io::Error::other(e)))?
        .map_err(QueueError::Io)
}

impl MessageStore for SpoolDir {
    async fn claim(&self) -> Result<Option<Vec<u8>>, QueueError> {
        let dir = self.clone();
        blocking(move || dir.take_oldest()).await
    }

    async fn requeue(&self, body: Vec<u8>) -> Result<(), QueueError> {
        let dir = self.clone();
        blocking(move || dir.append(&body)).await
    }
}

impl Queue for SpoolQueue {
    async fn publish(&self, msg: &Message) -> Result<(), QueueError> {
        let body = msg.encode()?;
        let store = Arc::clone(&self.store);
        blocking(move || store.append(&body)).await
    }

    fn consume(
        &self,
        cancel: CancellationToken,
        tracker: &TaskTracker,
    ) -> Result<async_channel::Receiver<Message>, QueueError> {
        log::debug!("consuming from {}", self.store.ready.display());
        Ok(spawn_pump(
            Arc::clone(&self.store),
            self.poll_interval,
            cancel,
            tracker,
        ))
    }
}

#[cfg(test)]
mod tests {
    use hnpipe_core::ItemId;
    use tempfile::TempDir;

    use super::*;

    fn open(dir: &TempDir) -> SpoolQueue {
        SpoolQueue::open(dir.path(), Duration::from_millis(10)).unwrap()
    }

    #[tokio::test]
    async fn publish_lands_in_ready() {
        let dir = TempDir::new().unwrap();
        let queue = open(&dir);
        queue.publish(&Message::new(ItemId(1))).await.unwrap();
        queue.publish(&Message::new(ItemId(2))).await.unwrap();

        assert_eq!(queue.len().unwrap(), 2);
        assert_eq!(fs::read_dir(dir.path().join("tmp")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn claims_oldest_first_and_acks() {
        let dir = TempDir::new().unwrap();
        let queue = open(&dir);
        for id in [5, 3, 9] {
            queue.publish(&Message::new(ItemId(id))).await.unwrap();
        }

        let mut got = Vec::new();
        while let Some(body) = queue.store.claim().await.unwrap() {
            got.push(Message::decode(&body).unwrap().id.0);
        }
        assert_eq!(got, vec![5, 3, 9]);
        assert!(queue.is_empty().unwrap());
        assert_eq!(fs::read_dir(dir.path().join("claimed")).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn requeue_goes_to_tail() {
        let dir = TempDir::new().unwrap();
        let queue = open(&dir);
        queue.publish(&Message::new(ItemId(1))).await.unwrap();
        queue.publish(&Message::new(ItemId(2))).await.unwrap();

        let first = queue.store.claim().await.unwrap().unwrap();
        queue.store.requeue(first).await.unwrap();

        let order: Vec<u64> = [
            queue.store.claim().await.unwrap().unwrap(),
            queue.store.claim().await.unwrap().unwrap(),
        ]
        .iter()
        .map(|b| Message::decode(b).unwrap().id.0)
        .collect();
        assert_eq!(order, vec![2, 1]);
    }

    #[test]
    fn reopen_recovers_claimed_and_cleans_tmp() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("claimed")).unwrap();
        fs::create_dir_all(dir.path().join("tmp")).unwrap();
        fs::write(
            dir.path()
                .join("claimed/00000000000000000002-00000000000000000001-0000000001-000000.json"),
            br#"{"id":4}"#,
        )
        .unwrap();
        fs::write(dir.path().join("tmp/half-written.tmp"), b"{\"i").unwrap();

        let queue = open(&dir);
        assert_eq!(queue.len().unwrap(), 1);
        assert_eq!(
            queue.store.ready_names().unwrap(),
            vec!["00000000000000000001-0000000001-000000.json".to_string()]
        );
        assert_eq!(fs::read_dir(dir.path().join("tmp")).unwrap().count(), 0);
        assert_eq!(fs::read_dir(dir.path().join("claimed")).unwrap().count(), 0);
    }

    #[test]
    fn reopen_leaves_fresh_claims_alone() {
        let dir = TempDir::new().unwrap();
        let queue = open(&dir);
        // A live consumer has just claimed this one
        let fresh = format!("{:020}-00000000000000000001-0000000001-000000.json", unix_nanos());
        fs::write(queue.store.claimed.join(&fresh), br#"{"id":4}"#).unwrap();

        let reopened = open(&dir);
        assert!(reopened.is_empty().unwrap());
        assert!(dir.path().join("claimed").join(&fresh).exists());

        // Past the grace period it counts as orphaned
        assert_eq!(reopened.store.recover(Duration::ZERO).unwrap(), (0, 1));
        assert_eq!(reopened.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn two_handles_never_share_a_message() {
        let dir = TempDir::new().unwrap();
        let a = open(&dir);
        let b = open(&dir);
        for id in 0..40 {
            a.publish(&Message::new(ItemId(id))).await.unwrap();
        }

        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let rx_a = a.consume(cancel.clone(), &tracker).unwrap();
        let rx_b = b.consume(cancel.clone(), &tracker).unwrap();
        let mut got = Vec::new();
        while got.len() < 40 {
            let msg = tokio::select! {
                m = rx_a.recv() => m.unwrap(),
                m = rx_b.recv() => m.unwrap(),
            };
            got.push(msg.id.0);
        }
        cancel.cancel();
        tracker.close();
        tracker.wait().await;

        got.sort_unstable();
        assert_eq!(got, (0..40).collect::<Vec<_>>());
        assert!(a.is_empty().unwrap());
    }
}
