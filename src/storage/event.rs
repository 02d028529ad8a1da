//! Event bus — decouples shard mutation from expiry bookkeeping.
//!
//! Grounded in `eventnotifierstorage.go`'s `UpdateMessage`/`updatesChannel`:
//! every mutating shard operation emits one message describing what
//! changed, which the collector consumes independently of the request
//! path. Generalized from Go's unbuffered channel + dedicated reader
//! goroutine to a bounded `tokio::sync::mpsc` channel, since producers
//! here are async connection tasks rather than OS threads.

use bytes::Bytes;

/// Default channel capacity.
pub const DEFAULT_CAPACITY: usize = 5000;

/// A change to a key's presence or expiration, reported by a shard
/// operation to the collector.
#[derive(Debug, Clone)]
pub enum Event {
    /// Key newly published; `new_exptime` is its absolute expiration
    /// (0 = never).
    Add { key: Bytes, new_exptime: u32 },
    /// Key removed; `current_exptime` is the expiration it had before
    /// removal.
    Delete { key: Bytes, current_exptime: u32 },
    /// Key's expiration moved from `current_exptime` to `new_exptime`
    /// (a `set`/`replace`/`cas`/`touch` on an existing key).
    Change { key: Bytes, current_exptime: u32, new_exptime: u32 },
    /// Periodic wake-up, carrying the current wall-clock time, telling
    /// the collector to sweep any generations that have come due.
    Tick { now: u32 },
}

pub type EventSender = tokio::sync::mpsc::Sender<Event>;
pub type EventReceiver = tokio::sync::mpsc::Receiver<Event>;

pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    tokio::sync::mpsc::channel(capacity)
}
