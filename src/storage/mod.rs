//! Sharded, TTL-aware key/value storage core.
//!
//! Wires together the pieces in this module into one `Cache` facade: a
//! [`Router`] of independently-locked [`Shard`]s, a [`Notifier`] that
//! reports expiration changes onto an event bus, a [`Collector`] that
//! consumes those events to reclaim expired keys generationally, and a
//! [`Ticker`] that drives the collector's clock.

mod collector;
mod entry;
mod error;
mod event;
mod notifier;
mod router;
mod shard;
mod ticker;

pub use collector::{Collector, GENERATION_SIZE, STORAGE_THRESHOLD};
pub use entry::{normalize_exptime, now_unix, Entry, MAX_RELATIVE_EXPTIME};
pub use error::{StorageError, StorageResult};
pub use event::{Event, DEFAULT_CAPACITY};
pub use notifier::Notifier;
pub use router::Router;
pub use shard::{CasOutcome, Direction, Shard};
pub use ticker::Ticker;

use std::sync::Arc;

/// Top-level handle to the storage core. Spawns the collector and ticker
/// as background tasks on construction and hands out a cheaply-cloneable
/// facade for the connection-handling layer.
#[derive(Clone)]
pub struct Cache {
    notifier: Arc<Notifier>,
}

impl Cache {
    /// Builds the storage core and spawns its background tasks:
    /// the generational collector draining the event bus, and the
    /// ticker driving its clock at `collector_interval_secs`.
    pub fn spawn(shard_count: usize, collector_interval_secs: u64) -> Self {
        let router = Arc::new(Router::new(shard_count));
        let (sender, receiver) = event::channel(DEFAULT_CAPACITY);

        let collector = Collector::new(router.clone(), receiver, now_unix());
        tokio::spawn(collector.run());
        Ticker::spawn(sender.clone(), collector_interval_secs);

        Self {
            notifier: Arc::new(Notifier::new(router, sender)),
        }
    }

    pub fn shard_count(&self) -> usize {
        self.notifier.shard_count()
    }

    pub fn item_count(&self) -> usize {
        self.notifier.item_count()
    }

    pub async fn set(&self, key: bytes::Bytes, flags: u32, exptime: u32, content: bytes::Bytes) -> Entry {
        self.notifier.set(key, flags, exptime, content).await
    }

    pub async fn add(&self, key: bytes::Bytes, flags: u32, exptime: u32, content: bytes::Bytes) -> StorageResult<Entry> {
        self.notifier.add(key, flags, exptime, content).await
    }

    pub async fn replace(&self, key: bytes::Bytes, flags: u32, exptime: u32, content: bytes::Bytes) -> StorageResult<Entry> {
        self.notifier.replace(key, flags, exptime, content).await
    }

    pub fn append(&self, key: &bytes::Bytes, content: bytes::Bytes) -> StorageResult<Entry> {
        self.notifier.append(key, content)
    }

    pub fn prepend(&self, key: &bytes::Bytes, content: bytes::Bytes) -> StorageResult<Entry> {
        self.notifier.prepend(key, content)
    }

    pub async fn cas(
        &self,
        key: bytes::Bytes,
        flags: u32,
        exptime: u32,
        token: u64,
        content: bytes::Bytes,
    ) -> StorageResult<Entry> {
        self.notifier.cas(key, flags, exptime, token, content).await
    }

    pub fn get(&self, key: &bytes::Bytes) -> Option<Entry> {
        self.notifier.get(key)
    }

    pub async fn delete(&self, key: bytes::Bytes) -> StorageResult<Entry> {
        self.notifier.delete(key).await
    }

    pub fn incr(&self, key: &bytes::Bytes, value: u64, direction: Direction) -> StorageResult<Entry> {
        self.notifier.incr(key, value, direction)
    }

    pub async fn touch(&self, key: bytes::Bytes, exptime: u32) -> StorageResult<Entry> {
        self.notifier.touch(key, exptime).await
    }

    pub fn flush_all(&self) {
        self.notifier.flush_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[tokio::test]
    async fn cache_routes_set_and_get_through_the_full_stack() {
        let cache = Cache::spawn(4, 60);
        cache.set(Bytes::from_static(b"k"), 0, 0, Bytes::from_static(b"v")).await;
        assert_eq!(cache.get(&Bytes::from_static(b"k")).unwrap().content, Bytes::from_static(b"v"));
        assert_eq!(cache.item_count(), 1);
    }
}
