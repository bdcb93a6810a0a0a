//! FIFO queue persisted in a [`StateStore`].
//!
//! Entries live at `<prefix><unix-seconds>_<nonce>`. The time component
//! orders entries across restarts; the nonce orders entries written within
//! the same second.
//!
//! Every operation except the wait inside [`PersistentQueue::next`] must run
//! under the caller's external lock, and only one `next` may be in flight.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{Mutex, MutexGuard, Notify};
use vertex_storage::{StateStore, StoreBatch, StoreError, StoreValue};

use crate::ShutdownSignal;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// Shutdown fired while waiting for an entry.
    #[error("queue wait cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Wakes the consumer of a queue after a write.
///
/// Firing is non-blocking and coalesces: a fire while no one waits is kept
/// as a single permit.
#[derive(Debug, Clone)]
pub struct QueueTrigger(Arc<Notify>);

impl QueueTrigger {
    pub fn fire(&self) {
        self.0.notify_one();
    }
}

/// A FIFO over a key prefix.
pub struct PersistentQueue {
    store: Arc<dyn StateStore>,
    prefix: String,
    nonce: AtomicU64,
    trigger: Arc<Notify>,
}

impl std::fmt::Debug for PersistentQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistentQueue")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl PersistentQueue {
    pub fn new(store: Arc<dyn StateStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            nonce: AtomicU64::new(0),
            trigger: Arc::new(Notify::new()),
        }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Add a put of `value` to `batch`.
    ///
    /// Returns the entry key (without prefix) and a trigger to fire once the
    /// batch has been written.
    pub fn enqueue<T: StoreValue>(
        &self,
        batch: &mut StoreBatch,
        value: &T,
    ) -> Result<(String, QueueTrigger), StoreError> {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let nonce = self.nonce.fetch_add(1, Ordering::Relaxed);
        let key = format!("{secs}_{nonce:08}");

        batch.put(format!("{}{key}", self.prefix), value)?;
        Ok((key, QueueTrigger(self.trigger.clone())))
    }

    /// Decode the first entry, returning its key without prefix.
    pub fn peek<T: StoreValue>(&self) -> Result<Option<(String, T)>, StoreError> {
        let mut first = None;
        self.store.iterate(&self.prefix, &mut |key, value| {
            let key = key.strip_prefix(self.prefix.as_str()).unwrap_or(key);
            first = Some((key.to_string(), T::decode_value(value)?));
            Ok(true)
        })?;
        Ok(first)
    }

    /// Wait for the first entry.
    ///
    /// Returns with `lock` held so the caller can inspect and delete the
    /// entry atomically.
    pub async fn next<'a, T: StoreValue, S>(
        &self,
        shutdown: &ShutdownSignal,
        lock: &'a Mutex<S>,
    ) -> Result<(String, T, MutexGuard<'a, S>), QueueError> {
        loop {
            if shutdown.is_shutdown() {
                return Err(QueueError::Cancelled);
            }

            let guard = lock.lock().await;
            if let Some((key, value)) = self.peek::<T>()? {
                return Ok((key, value, guard));
            }
            drop(guard);

            tokio::select! {
                _ = self.trigger.notified() => {}
                _ = shutdown.cancelled() => return Err(QueueError::Cancelled),
            }
        }
    }

    /// Add the deletion of `key` (as returned by `enqueue`/`peek`) to `batch`.
    pub fn delete(&self, batch: &mut StoreBatch, key: &str) {
        batch.delete(format!("{}{key}", self.prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Shutdown;
    use std::time::Duration;
    use vertex_storage::MemoryStateStore;

    fn queue() -> (Arc<MemoryStateStore>, PersistentQueue) {
        let store = Arc::new(MemoryStateStore::new());
        let queue = PersistentQueue::new(store.clone(), "test_queue_");
        (store, queue)
    }

    #[test]
    fn test_fifo_within_one_second() {
        let (store, queue) = queue();

        let mut batch = StoreBatch::new();
        let mut keys = Vec::new();
        for i in 0..12u64 {
            let (key, _) = queue.enqueue(&mut batch, &i).unwrap();
            keys.push(key);
        }
        store.write_batch(batch).unwrap();

        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);

        for expected in 0..12u64 {
            let (key, value) = queue.peek::<u64>().unwrap().unwrap();
            assert_eq!(value, expected);
            let mut batch = StoreBatch::new();
            queue.delete(&mut batch, &key);
            store.write_batch(batch).unwrap();
        }
        assert!(queue.peek::<u64>().unwrap().is_none());
    }

    #[test]
    fn test_key_format() {
        let (_, queue) = queue();
        let mut batch = StoreBatch::new();
        let (key, _) = queue.enqueue(&mut batch, &1u64).unwrap();

        let (secs, nonce) = key.split_once('_').unwrap();
        assert!(secs.parse::<u64>().unwrap() > 1_500_000_000);
        assert_eq!(nonce, "00000000");
    }

    #[test]
    fn test_peek_ignores_other_prefixes() {
        let (store, queue) = queue();
        store.put_raw("test_queue", b"0".to_vec()).unwrap();
        store.put_raw("test_queuf_1", b"0".to_vec()).unwrap();
        assert!(queue.peek::<u64>().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_next_returns_existing_entry_with_lock_held() {
        let (store, queue) = queue();
        let mut batch = StoreBatch::new();
        queue.enqueue(&mut batch, &7u64).unwrap();
        store.write_batch(batch).unwrap();

        let lock = Mutex::new(());
        let shutdown = Shutdown::new();
        let (_, value, _guard) = queue.next::<u64, _>(&shutdown.signal(), &lock).await.unwrap();
        assert_eq!(value, 7);
        assert!(lock.try_lock().is_err());
    }

    #[tokio::test]
    async fn test_next_waits_for_trigger() {
        let (store, queue) = queue();
        let queue = Arc::new(queue);
        let lock = Arc::new(Mutex::new(()));
        let shutdown = Shutdown::new();

        let consumer = {
            let queue = queue.clone();
            let lock = lock.clone();
            let signal = shutdown.signal();
            tokio::spawn(async move {
                let (_, value, _guard) = queue.next::<u64, _>(&signal, &lock).await.unwrap();
                value
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        {
            let _guard = lock.lock().await;
            let mut batch = StoreBatch::new();
            let (_, trigger) = queue.enqueue(&mut batch, &99u64).unwrap();
            store.write_batch(batch).unwrap();
            trigger.fire();
            trigger.fire();
        }

        let value = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(value, 99);
    }

    #[tokio::test]
    async fn test_next_cancelled() {
        let (_, queue) = queue();
        let lock = Mutex::new(());
        let shutdown = Shutdown::new();
        let signal = shutdown.signal();

        let wait = queue.next::<u64, _>(&signal, &lock);
        shutdown.trigger();
        assert_eq!(
            tokio::time::timeout(Duration::from_secs(1), wait)
                .await
                .unwrap()
                .map(|(key, _, _)| key),
            Err(QueueError::Cancelled)
        );
    }
}
