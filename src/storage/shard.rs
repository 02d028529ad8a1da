//! Shard — one partition of the concurrent key/value map.
//!
//! Grounded in `mapcachestorage.go`'s `MapCacheStorage`: a single
//! `RwLock`-guarded map enforcing per-key serialization and CAS
//! monotonicity. Generalized here from a process-global lock to one lock
//! per shard (the `Router` in `router.rs` picks which shard a key lands
//! in), and from a global `sync.RWMutex` to `parking_lot::RwLock`.

use bytes::{Bytes, BytesMut};
use hashbrown::HashMap;
use parking_lot::RwLock;

use super::entry::{now_unix, Entry};
use super::error::{StorageError, StorageResult};

/// Direction of an Incr/Decr mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increment,
    Decrement,
}

/// Outcome of a `Cas` call — the one operation whose failure mode still
/// needs to carry data back to the caller (the previous entry, so the
/// dispatcher can echo it if the protocol ever wants to).
#[derive(Debug, Clone)]
pub enum CasOutcome {
    Stored { previous: Entry, current: Entry },
    Mismatch { previous: Entry },
    NotFound,
}

/// One partition of the sharded map. Holds a plain `HashMap` behind a
/// single reader/writer lock: reads use the read side, every mutating
/// operation takes the write side for the whole critical section,
/// giving linearizable ordering of operations on the same key.
#[derive(Default)]
pub struct Shard {
    map: RwLock<HashMap<Bytes, Entry>>,
}

impl Shard {
    pub fn new() -> Self {
        Self {
            map: RwLock::new(HashMap::new()),
        }
    }

    fn live(entry: &Entry, now: u32) -> bool {
        !entry.is_expired_at(now)
    }

    /// Unconditionally publishes a new entry. Returns the previous entry,
    /// if one existed and was still live. An expired-but-mapped entry is
    /// treated as fresh, so its CAS token resets to 0.
    pub fn set(&self, key: Bytes, flags: u32, exptime: u32, content: Bytes) -> (Option<Entry>, Entry) {
        let now = now_unix();
        let mut map = self.map.write();
        let previous = map.get(&key).cloned();
        let cas = match &previous {
            Some(p) if Self::live(p, now) => p.cas_unique + 1,
            _ => 0,
        };
        let current = Entry::new(exptime, flags, cas, content);
        map.insert(key, current.clone());
        let previous = previous.filter(|p| Self::live(p, now));
        (previous, current)
    }

    pub fn add(&self, key: Bytes, flags: u32, exptime: u32, content: Bytes) -> StorageResult<Entry> {
        let now = now_unix();
        let mut map = self.map.write();
        if let Some(existing) = map.get(&key) {
            if Self::live(existing, now) {
                return Err(StorageError::KeyAlreadyInUse);
            }
        }
        let current = Entry::new(exptime, flags, 0, content);
        map.insert(key, current.clone());
        Ok(current)
    }

    pub fn replace(
        &self,
        key: &Bytes,
        flags: u32,
        exptime: u32,
        content: Bytes,
    ) -> StorageResult<(Entry, Entry)> {
        let now = now_unix();
        let mut map = self.map.write();
        match map.get(key) {
            Some(previous) if Self::live(previous, now) => {
                let previous = previous.clone();
                let current = Entry::new(exptime, flags, previous.cas_unique + 1, content);
                map.insert(key.clone(), current.clone());
                Ok((previous, current))
            }
            _ => Err(StorageError::KeyNotFound),
        }
    }

    pub fn append(&self, key: &Bytes, content: Bytes) -> StorageResult<(Entry, Entry)> {
        self.concat(key, content, false)
    }

    pub fn prepend(&self, key: &Bytes, content: Bytes) -> StorageResult<(Entry, Entry)> {
        self.concat(key, content, true)
    }

    fn concat(&self, key: &Bytes, content: Bytes, prepend: bool) -> StorageResult<(Entry, Entry)> {
        let now = now_unix();
        let mut map = self.map.write();
        match map.get(key) {
            Some(previous) if Self::live(previous, now) => {
                let previous = previous.clone();
                let mut buf = BytesMut::with_capacity(previous.content.len() + content.len());
                if prepend {
                    buf.extend_from_slice(&content);
                    buf.extend_from_slice(&previous.content);
                } else {
                    buf.extend_from_slice(&previous.content);
                    buf.extend_from_slice(&content);
                }
                let current = Entry::new(
                    previous.exptime,
                    previous.flags,
                    previous.cas_unique + 1,
                    buf.freeze(),
                );
                map.insert(key.clone(), current.clone());
                Ok((previous, current))
            }
            _ => Err(StorageError::KeyNotFound),
        }
    }

    pub fn cas(&self, key: &Bytes, flags: u32, exptime: u32, token: u64, content: Bytes) -> CasOutcome {
        let now = now_unix();
        let mut map = self.map.write();
        match map.get(key) {
            Some(previous) if Self::live(previous, now) => {
                let previous = previous.clone();
                if previous.cas_unique != token {
                    return CasOutcome::Mismatch { previous };
                }
                let current = Entry::new(exptime, flags, previous.cas_unique + 1, content);
                map.insert(key.clone(), current.clone());
                CasOutcome::Stored { previous, current }
            }
            _ => CasOutcome::NotFound,
        }
    }

    pub fn get(&self, key: &Bytes) -> Option<Entry> {
        let now = now_unix();
        let map = self.map.read();
        map.get(key).filter(|e| Self::live(e, now)).cloned()
    }

    pub fn delete(&self, key: &Bytes) -> StorageResult<Entry> {
        let now = now_unix();
        let mut map = self.map.write();
        match map.get(key) {
            Some(entry) if Self::live(entry, now) => {
                let entry = entry.clone();
                map.remove(key);
                Ok(entry)
            }
            _ => Err(StorageError::KeyNotFound),
        }
    }

    /// `bytes` is left `u32` per the wire protocol's `<bytes>` field but
    /// is unused here: the new content length is recomputed from the
    /// decimal string, matching memcached's incr/decr contract.
    pub fn incr(&self, key: &Bytes, value: u64, direction: Direction) -> StorageResult<(Entry, Entry)> {
        let now = now_unix();
        let mut map = self.map.write();
        match map.get(key) {
            Some(previous) if Self::live(previous, now) => {
                let previous = previous.clone();
                let text = std::str::from_utf8(&previous.content).map_err(|_| StorageError::IllegalParameter)?;
                let current_value: u64 = text.trim().parse().map_err(|_| StorageError::IllegalParameter)?;
                let new_value = match direction {
                    Direction::Increment => current_value.wrapping_add(value),
                    Direction::Decrement => current_value.saturating_sub(value),
                };
                let content = Bytes::from(new_value.to_string());
                let current = Entry::new(previous.exptime, previous.flags, previous.cas_unique + 1, content);
                map.insert(key.clone(), current.clone());
                Ok((previous, current))
            }
            _ => Err(StorageError::KeyNotFound),
        }
    }

    /// Rewrites only `exptime`; content, flags and cas_unique are
    /// preserved (memcached's `touch` never bumps cas).
    pub fn touch(&self, key: &Bytes, exptime: u32) -> StorageResult<(Entry, Entry)> {
        let now = now_unix();
        let mut map = self.map.write();
        match map.get(key) {
            Some(previous) if Self::live(previous, now) => {
                let previous = previous.clone();
                let mut current = previous.clone();
                current.exptime = exptime;
                map.insert(key.clone(), current.clone());
                Ok((previous, current))
            }
            _ => Err(StorageError::KeyNotFound),
        }
    }

    /// Unconditionally removes the key, used by the collector. Tolerates
    /// a stale reference (key already gone) by returning `None`.
    pub fn expire(&self, key: &Bytes) -> Option<Entry> {
        let mut map = self.map.write();
        map.remove(key)
    }

    /// Drops every key unconditionally, returning how many were removed.
    /// Used by `flush_all`, which bypasses the event bus entirely: the
    /// collector simply tolerates stale generation entries afterwards.
    pub fn clear(&self) -> usize {
        let mut map = self.map.write();
        let count = map.len();
        map.clear();
        count
    }

    /// Number of keys currently mapped (includes logically-expired but
    /// not-yet-collected entries).
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn set_on_fresh_key_resets_cas() {
        let shard = Shard::new();
        let (previous, current) = shard.set(b("k"), 0, 0, b("v1"));
        assert!(previous.is_none());
        assert_eq!(current.cas_unique, 0);
    }

    #[test]
    fn set_on_live_key_bumps_cas_from_previous() {
        let shard = Shard::new();
        shard.set(b("k"), 0, 0, b("v1"));
        let (previous, current) = shard.set(b("k"), 0, 0, b("v2"));
        assert_eq!(previous.unwrap().cas_unique, 0);
        assert_eq!(current.cas_unique, 1);
    }

    #[test]
    fn add_fails_on_live_key() {
        let shard = Shard::new();
        shard.add(b("k"), 0, 0, b("v1")).unwrap();
        let err = shard.add(b("k"), 0, 0, b("v2")).unwrap_err();
        assert_eq!(err, StorageError::KeyAlreadyInUse);
    }

    #[test]
    fn add_succeeds_on_expired_key() {
        let shard = Shard::new();
        shard.add(b("k"), 0, 1, b("v1")).unwrap(); // exptime=1 (absolute, in the past)
        let current = shard.add(b("k"), 0, 0, b("v2")).unwrap();
        assert_eq!(current.cas_unique, 0);
    }

    #[test]
    fn replace_requires_live_key() {
        let shard = Shard::new();
        assert_eq!(
            shard.replace(&b("missing"), 0, 0, b("v")).unwrap_err(),
            StorageError::KeyNotFound
        );
        shard.set(b("k"), 0, 0, b("v1"));
        let (previous, current) = shard.replace(&b("k"), 0, 0, b("v2")).unwrap();
        assert_eq!(previous.content, b("v1"));
        assert_eq!(current.content, b("v2"));
        assert_eq!(current.cas_unique, 1);
    }

    #[test]
    fn append_and_prepend_concatenate() {
        let shard = Shard::new();
        shard.set(b("k"), 0, 0, b("X"));
        let (_, current) = shard.append(&b("k"), b("Y")).unwrap();
        assert_eq!(current.content, b("XY"));
        let (_, current) = shard.prepend(&b("k"), b("Z")).unwrap();
        assert_eq!(current.content, b("ZXY"));
    }

    #[test]
    fn append_on_missing_key_fails() {
        let shard = Shard::new();
        assert_eq!(
            shard.append(&b("missing"), b("Y")).unwrap_err(),
            StorageError::KeyNotFound
        );
    }

    #[test]
    fn cas_rejects_stale_token() {
        let shard = Shard::new();
        shard.set(b("k"), 0, 0, b("v1"));
        match shard.cas(&b("k"), 0, 0, 999, b("v2")) {
            CasOutcome::Mismatch { previous } => assert_eq!(previous.content, b("v1")),
            other => panic!("expected mismatch, got {other:?}"),
        }
        match shard.cas(&b("k"), 0, 0, 0, b("v2")) {
            CasOutcome::Stored { current, .. } => assert_eq!(current.content, b("v2")),
            other => panic!("expected stored, got {other:?}"),
        }
    }

    #[test]
    fn delete_is_not_idempotent() {
        let shard = Shard::new();
        shard.set(b("k"), 0, 0, b("v"));
        shard.delete(&b("k")).unwrap();
        assert_eq!(shard.delete(&b("k")).unwrap_err(), StorageError::KeyNotFound);
    }

    #[test]
    fn incr_decr_round_trip_with_saturation() {
        let shard = Shard::new();
        shard.set(b("n"), 0, 0, b("10"));
        let (_, current) = shard.incr(&b("n"), 5, Direction::Increment).unwrap();
        assert_eq!(current.content, b("15"));
        let (_, current) = shard.incr(&b("n"), 100, Direction::Decrement).unwrap();
        assert_eq!(current.content, b("0"));
    }

    #[test]
    fn incr_on_non_decimal_content_is_illegal() {
        let shard = Shard::new();
        shard.set(b("n"), 0, 0, b("not-a-number"));
        assert_eq!(
            shard.incr(&b("n"), 1, Direction::Increment).unwrap_err(),
            StorageError::IllegalParameter
        );
    }

    #[test]
    fn expired_entry_is_invisible_without_collection() {
        let shard = Shard::new();
        shard.set(b("k"), 0, 1, b("v")); // exptime=1, already in the past
        assert!(shard.get(&b("k")).is_none());
        assert_eq!(shard.delete(&b("k")).unwrap_err(), StorageError::KeyNotFound);
    }

    #[test]
    fn touch_changes_exptime_only() {
        let shard = Shard::new();
        shard.set(b("k"), 7, 0, b("v"));
        let (_, current) = shard.touch(&b("k"), 500).unwrap();
        assert_eq!(current.exptime, 500);
        assert_eq!(current.flags, 7);
        assert_eq!(current.cas_unique, 0);
    }

    #[test]
    fn expire_tolerates_missing_key() {
        let shard = Shard::new();
        assert!(shard.expire(&b("missing")).is_none());
    }
}
