//! Storage Entry
//!
//! Immutable value record bound to a key: flags, absolute expiration,
//! CAS token and payload. Published as a unit; mutation is replacement,
//! never in-place edit.

use bytes::Bytes;
use std::time::{SystemTime, UNIX_EPOCH};

/// Thirty days in seconds — the memcached boundary between a relative
/// and an absolute `exptime`.
pub const MAX_RELATIVE_EXPTIME: u32 = 60 * 60 * 24 * 30;

/// An immutable value bound to a key at the moment it was published.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Absolute unix-seconds expiration; 0 means "never expires".
    pub exptime: u32,
    /// Opaque client flags, returned verbatim on GET.
    pub flags: u32,
    /// Payload length in bytes; always equal to `content.len()`.
    pub bytes: u32,
    /// Monotonic per-key version stamp.
    pub cas_unique: u64,
    /// The stored payload.
    pub content: Bytes,
}

impl Entry {
    pub fn new(exptime: u32, flags: u32, cas_unique: u64, content: Bytes) -> Self {
        Self {
            exptime,
            flags,
            bytes: content.len() as u32,
            cas_unique,
            content,
        }
    }

    /// `true` iff this entry has a finite expiration that has already
    /// passed. Callers must treat an expired entry as absent regardless
    /// of whether the collector has swept it yet.
    pub fn is_expired_at(&self, now: u32) -> bool {
        self.exptime != 0 && self.exptime <= now
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(now_unix())
    }
}

/// Current unix time in whole seconds.
pub fn now_unix() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs() as u32
}

/// Normalizes a protocol-supplied `exptime` into an absolute unix epoch,
/// per memcached convention: 0 means never, values under 30 days are
/// relative to now, anything larger is already absolute.
pub fn normalize_exptime(exptime: u32, now: u32) -> u32 {
    if exptime == 0 {
        0
    } else if exptime < MAX_RELATIVE_EXPTIME {
        now + exptime
    } else {
        exptime
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_expires_when_exptime_zero() {
        let e = Entry::new(0, 0, 0, Bytes::from_static(b"v"));
        assert!(!e.is_expired_at(u32::MAX));
    }

    #[test]
    fn expired_once_past_exptime() {
        let e = Entry::new(100, 0, 0, Bytes::from_static(b"v"));
        assert!(!e.is_expired_at(99));
        assert!(e.is_expired_at(100));
        assert!(e.is_expired_at(101));
    }

    #[test]
    fn normalize_relative_vs_absolute() {
        assert_eq!(normalize_exptime(0, 1000), 0);
        assert_eq!(normalize_exptime(60, 1000), 1060);
        let absolute = MAX_RELATIVE_EXPTIME + 500;
        assert_eq!(normalize_exptime(absolute, 1000), absolute);
    }
}
