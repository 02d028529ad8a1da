//! Router — picks which shard a key belongs to.
//!
//! Grounded in `hashingstorage.go`'s `HashingStorage`: a fixed array of
//! buckets selected by a Horner-style polynomial hash of the key, mod
//! the bucket count.

use bytes::Bytes;

use super::shard::Shard;

/// Horner-style polynomial hash: `h = 1; for each byte x: h = h + h*31 + x`.
/// Deliberately the same recurrence as the original bucket hasher, kept
/// so shard placement is reproducible across runs for a fixed key set.
pub fn horner_hash(key: &[u8]) -> u32 {
    let mut hash: u32 = 1;
    for &byte in key {
        hash = hash.wrapping_add(hash.wrapping_mul(31)).wrapping_add(byte as u32);
    }
    hash
}

/// Fixed set of independently-locked shards, addressed by key hash.
pub struct Router {
    shards: Vec<Shard>,
}

impl Router {
    pub fn new(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1);
        let shards = (0..shard_count).map(|_| Shard::new()).collect();
        Self { shards }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    pub fn shard_for(&self, key: &Bytes) -> &Shard {
        let index = horner_hash(key) as usize % self.shards.len();
        &self.shards[index]
    }

    pub fn shards(&self) -> &[Shard] {
        &self.shards
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(Shard::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
