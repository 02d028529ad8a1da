//! slotcache — an in-memory key/value cache server speaking the
//! memcached ASCII text protocol.
//!
//! A sharded concurrent map with CAS tokens and TTLs, backed by an
//! asynchronous generational expiry collector driven by event
//! notifications from the storage core.

pub mod metrics;
pub mod protocol;
pub mod server;
pub mod storage;

pub use metrics::Metrics;
pub use protocol::{AsciiCodec, ProtocolError};
pub use server::{Config, Server};
pub use storage::{Cache, StorageError};
