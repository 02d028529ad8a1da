//! Notifier — the sharded map, wrapped so every mutation that changes a
//! key's expiration also reports it to the collector.
//!
//! Grounded in `eventnotifierstorage.go`'s `EventNotifierStorage`: it
//! delegates every operation to the wrapped storage unchanged, and only
//! fires an `Event` when the *expiration* actually moved. Append,
//! Prepend and Incr never touch `exptime`, so — like the Go original —
//! they delegate without emitting anything.

use std::sync::Arc;

use bytes::Bytes;

use super::entry::Entry;
use super::error::{StorageError, StorageResult};
use super::event::{Event, EventSender};
use super::router::Router;
use super::shard::{CasOutcome, Direction};

pub struct Notifier {
    router: Arc<Router>,
    events: EventSender,
}

impl Notifier {
    pub fn new(router: Arc<Router>, events: EventSender) -> Self {
        Self { router, events }
    }

    pub fn shard_count(&self) -> usize {
        self.router.shard_count()
    }

    pub fn item_count(&self) -> usize {
        self.router.len()
    }

    pub async fn set(&self, key: Bytes, flags: u32, exptime: u32, content: Bytes) -> Entry {
        let shard = self.router.shard_for(&key);
        let (previous, current) = shard.set(key.clone(), flags, exptime, content);
        let event = match previous {
            Some(previous) => Event::Change {
                key,
                current_exptime: previous.exptime,
                new_exptime: exptime,
            },
            None => Event::Add { key, new_exptime: exptime },
        };
        let _ = self.events.send(event).await;
        current
    }

    pub async fn add(&self, key: Bytes, flags: u32, exptime: u32, content: Bytes) -> StorageResult<Entry> {
        let shard = self.router.shard_for(&key);
        let current = shard.add(key.clone(), flags, exptime, content)?;
        let _ = self.events.send(Event::Add { key, new_exptime: exptime }).await;
        Ok(current)
    }

    pub async fn replace(&self, key: Bytes, flags: u32, exptime: u32, content: Bytes) -> StorageResult<Entry> {
        let shard = self.router.shard_for(&key);
        let (previous, current) = shard.replace(&key, flags, exptime, content)?;
        let event = Event::Change {
            key,
            current_exptime: previous.exptime,
            new_exptime: exptime,
        };
        let _ = self.events.send(event).await;
        Ok(current)
    }

    pub fn append(&self, key: &Bytes, content: Bytes) -> StorageResult<Entry> {
        let shard = self.router.shard_for(key);
        let (_, current) = shard.append(key, content)?;
        Ok(current)
    }

    pub fn prepend(&self, key: &Bytes, content: Bytes) -> StorageResult<Entry> {
        let shard = self.router.shard_for(key);
        let (_, current) = shard.prepend(key, content)?;
        Ok(current)
    }

    pub async fn cas(
        &self,
        key: Bytes,
        flags: u32,
        exptime: u32,
        token: u64,
        content: Bytes,
    ) -> Result<Entry, StorageError> {
        let shard = self.router.shard_for(&key);
        match shard.cas(&key, flags, exptime, token, content) {
            CasOutcome::Stored { previous, current } => {
                let event = Event::Change {
                    key,
                    current_exptime: previous.exptime,
                    new_exptime: exptime,
                };
                let _ = self.events.send(event).await;
                Ok(current)
            }
            CasOutcome::Mismatch { .. } => Err(StorageError::CasMismatch),
            CasOutcome::NotFound => Err(StorageError::KeyNotFound),
        }
    }

    pub fn get(&self, key: &Bytes) -> Option<Entry> {
        self.router.shard_for(key).get(key)
    }

    pub async fn delete(&self, key: Bytes) -> StorageResult<Entry> {
        let shard = self.router.shard_for(&key);
        let deleted = shard.delete(&key)?;
        let event = Event::Delete {
            key,
            current_exptime: deleted.exptime,
        };
        let _ = self.events.send(event).await;
        Ok(deleted)
    }

    pub fn incr(&self, key: &Bytes, value: u64, direction: Direction) -> StorageResult<Entry> {
        let shard = self.router.shard_for(key);
        let (_, current) = shard.incr(key, value, direction)?;
        Ok(current)
    }

    pub async fn touch(&self, key: Bytes, exptime: u32) -> StorageResult<Entry> {
        let shard = self.router.shard_for(&key);
        let (previous, current) = shard.touch(&key, exptime)?;
        if previous.exptime != exptime {
            let event = Event::Change {
                key,
                current_exptime: previous.exptime,
                new_exptime: exptime,
            };
            let _ = self.events.send(event).await;
        }
        Ok(current)
    }

    /// Immediately empties every shard. Bypasses the event bus: the
    /// collector's stale generation entries are tolerated, not repaired.
    pub fn flush_all(&self) {
        for shard in self.router.shards() {
            shard.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::event::channel;
    use crate::storage::entry::now_unix;
    use std::sync::Arc;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[tokio::test]
    async fn set_on_new_key_emits_add() {
        let (tx, mut rx) = channel(16);
        let notifier = Notifier::new(Arc::new(Router::new(4)), tx);
        notifier.set(b("k"), 0, 0, b("v")).await;
        match rx.recv().await.unwrap() {
            Event::Add { key, new_exptime } => {
                assert_eq!(key, b("k"));
                assert_eq!(new_exptime, 0);
            }
            other => panic!("expected Add, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn set_on_existing_key_emits_change() {
        // exptime here is an absolute epoch, not a relative offset, so it
        // must lie far enough in the future that the entry is still live
        // when the second `set` observes it.
        let far_future_a = now_unix() + 10_000;
        let far_future_b = now_unix() + 20_000;
        let (tx, mut rx) = channel(16);
        let notifier = Notifier::new(Arc::new(Router::new(4)), tx);
        notifier.set(b("k"), 0, far_future_a, b("v1")).await;
        rx.recv().await.unwrap();
        notifier.set(b("k"), 0, far_future_b, b("v2")).await;
        match rx.recv().await.unwrap() {
            Event::Change { current_exptime, new_exptime, .. } => {
                assert_eq!(current_exptime, far_future_a);
                assert_eq!(new_exptime, far_future_b);
            }
            other => panic!("expected Change, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn delete_emits_delete_event() {
        let (tx, mut rx) = channel(16);
        let notifier = Notifier::new(Arc::new(Router::new(4)), tx);
        notifier.set(b("k"), 0, 0, b("v")).await;
        rx.recv().await.unwrap();
        notifier.delete(b("k")).await.unwrap();
        match rx.recv().await.unwrap() {
            Event::Delete { key, .. } => assert_eq!(key, b("k")),
            other => panic!("expected Delete, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn touch_without_exptime_change_emits_nothing() {
        let far_future = now_unix() + 10_000;
        let (tx, mut rx) = channel(16);
        let notifier = Notifier::new(Arc::new(Router::new(4)), tx);
        notifier.set(b("k"), 0, far_future, b("v")).await;
        rx.recv().await.unwrap();
        notifier.touch(b("k"), far_future).await.unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn append_and_incr_emit_nothing() {
        let (tx, mut rx) = channel(16);
        let notifier = Notifier::new(Arc::new(Router::new(4)), tx);
        notifier.set(b("n"), 0, 0, b("1")).await;
        rx.recv().await.unwrap();
        notifier.append(&b("n"), b("0")).unwrap();
        notifier.incr(&b("n"), 5, Direction::Increment).unwrap();
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn flush_all_empties_every_shard() {
        let (tx, _rx) = channel(16);
        let notifier = Notifier::new(Arc::new(Router::new(4)), tx);
        notifier.set(b("a"), 0, 0, b("1")).await;
        notifier.set(b("b"), 0, 0, b("2")).await;
        assert_eq!(notifier.item_count(), 2);
        notifier.flush_all();
        assert_eq!(notifier.item_count(), 0);
    }
}
