//! Generational collector — reclaims expired keys without scanning the
//! whole map.
//!
//! Grounded in `generationalstorage.go`'s `GenerationalStorage` /
//! `processNodeChanges`: keys are bucketed into fixed-width time slots
//! ("generations") keyed by their expiration, and a periodic tick sweeps
//! every generation whose slot has fully elapsed. A key with `exptime ==
//! 0` rounds into the slot at exactly `GENERATION_SIZE`, a slot no real
//! unix timestamp ever reaches — the same "permanent bucket" trick the
//! original uses, reclaimed only under memory pressure.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use super::event::{Event, EventReceiver};
use super::router::Router;

/// Width of one generation, in seconds.
pub const GENERATION_SIZE: u32 = 60;

/// Soft item-count ceiling that triggers a permanent-bucket purge.
pub const STORAGE_THRESHOLD: usize = 5000;

fn round_time(epoch: u32) -> u32 {
    epoch - (epoch % GENERATION_SIZE) + GENERATION_SIZE
}

struct Generation {
    inhabitants: HashSet<Bytes>,
}

impl Generation {
    fn new() -> Self {
        Self {
            inhabitants: HashSet::new(),
        }
    }
}

/// Owns the generation map exclusively; runs as a single task draining
/// the event receiver, so no lock is needed around its bookkeeping.
pub struct Collector {
    router: Arc<Router>,
    events: EventReceiver,
    generations: HashMap<u32, Generation>,
    last_collected: u32,
    items: usize,
}

impl Collector {
    pub fn new(router: Arc<Router>, events: EventReceiver, now: u32) -> Self {
        Self {
            router,
            events,
            generations: HashMap::new(),
            last_collected: round_time(now) - GENERATION_SIZE,
            items: 0,
        }
    }

    /// Drains the event bus until the sender side is dropped. Intended
    /// to be the body of a dedicated tokio task.
    pub async fn run(mut self) {
        while let Some(event) = self.events.recv().await {
            self.handle(event);
        }
    }

    fn handle(&mut self, event: Event) {
        match event {
            Event::Add { key, new_exptime } => self.on_add(key, new_exptime),
            Event::Delete { key, current_exptime } => self.on_delete(&key, current_exptime),
            Event::Change {
                key,
                current_exptime,
                new_exptime,
            } => self.on_change(key, current_exptime, new_exptime),
            Event::Tick { now } => self.on_tick(now),
        }
    }

    fn on_add(&mut self, key: Bytes, new_exptime: u32) {
        let slot = round_time(new_exptime);
        self.generations.entry(slot).or_insert_with(Generation::new).inhabitants.insert(key);
        self.items += 1;
    }

    fn on_delete(&mut self, key: &Bytes, current_exptime: u32) {
        let slot = round_time(current_exptime);
        if let Some(generation) = self.generations.get_mut(&slot) {
            if generation.inhabitants.remove(key) {
                self.items = self.items.saturating_sub(1);
            }
        }
    }

    fn on_change(&mut self, key: Bytes, current_exptime: u32, new_exptime: u32) {
        let old_slot = round_time(current_exptime);
        if let Some(generation) = self.generations.get_mut(&old_slot) {
            generation.inhabitants.remove(&key);
        }
        let new_slot = round_time(new_exptime);
        self.generations.entry(new_slot).or_insert_with(Generation::new).inhabitants.insert(key);
    }

    fn on_tick(&mut self, now: u32) {
        let due = round_time(now) - GENERATION_SIZE;
        while self.last_collected + GENERATION_SIZE <= due {
            let slot = self.last_collected + GENERATION_SIZE;
            self.last_collected = slot;
            if let Some(generation) = self.generations.remove(&slot) {
                self.sweep(generation);
            }
        }
        if self.items > STORAGE_THRESHOLD {
            debug!(items = self.items, "memory pressure, purging permanent generation");
            if let Some(generation) = self.generations.remove(&GENERATION_SIZE) {
                self.sweep(generation);
            }
        }
    }

    fn sweep(&mut self, generation: Generation) {
        for key in generation.inhabitants {
            self.router.shard_for(&key).expire(&key);
            self.items = self.items.saturating_sub(1);
        }
    }

    #[cfg(test)]
    fn items(&self) -> usize {
        self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::event;

    fn b(s: &str) -> Bytes {
        Bytes::copy_from_slice(s.as_bytes())
    }

    #[test]
    fn round_time_quantizes_into_the_next_slot_boundary() {
        assert_eq!(round_time(0), GENERATION_SIZE);
        assert_eq!(round_time(1), GENERATION_SIZE);
        assert_eq!(round_time(GENERATION_SIZE), GENERATION_SIZE * 2);
        assert_eq!(round_time(GENERATION_SIZE + 1), GENERATION_SIZE * 2);
    }

    #[tokio::test]
    async fn tick_sweeps_due_generation_and_expires_keys() {
        let router = Arc::new(Router::new(2));
        let (tx, rx) = event::channel(16);
        let key = b("k");
        router.shard_for(&key).set(key.clone(), 0, 120, Bytes::from_static(b"v"));

        let mut collector = Collector::new(router.clone(), rx, 0);
        tx.send(Event::Add { key: key.clone(), new_exptime: 120 }).await.unwrap();
        collector.handle_next().await;
        assert_eq!(collector.items(), 1);

        tx.send(Event::Tick { now: 200 }).await.unwrap();
        collector.handle_next().await;

        assert_eq!(collector.items(), 0);
        // The collector calls `Shard::expire` directly, bypassing the
        // notifier, so the key is gone from the map too.
        assert!(router.shard_for(&key).get(&key).is_none());
    }

    impl Collector {
        async fn handle_next(&mut self) {
            let event = self.events.recv().await.unwrap();
            self.handle(event);
        }
    }

    #[test]
    fn change_moves_key_between_generations() {
        let router = Arc::new(Router::new(1));
        let (_tx, rx) = event::channel(16);
        let mut collector = Collector::new(router, rx, 0);
        collector.on_add(b("k"), 120);
        assert_eq!(collector.generations.get(&round_time(120)).unwrap().inhabitants.len(), 1);
        collector.on_change(b("k"), 120, 300);
        assert!(collector.generations.get(&round_time(120)).is_none_or(|g| g.inhabitants.is_empty()));
        assert_eq!(collector.generations.get(&round_time(300)).unwrap().inhabitants.len(), 1);
    }

    #[test]
    fn permanent_bucket_survives_normal_ticks() {
        // A real unix epoch is enormous relative to GENERATION_SIZE, so the
        // permanent slot (at exactly GENERATION_SIZE) is never reached by
        // ordinary due-slot advancement.
        let base: u32 = 1_000_000;
        let router = Arc::new(Router::new(1));
        let (_tx, rx) = event::channel(16);
        let mut collector = Collector::new(router, rx, base);
        collector.on_add(b("forever"), 0); // exptime=0 -> permanent slot
        for tick in 1..=5 {
            collector.on_tick(base + tick * GENERATION_SIZE);
        }
        assert_eq!(collector.items(), 1, "permanent bucket must not be swept by ordinary ticks");
    }

    #[test]
    fn pressure_purges_permanent_bucket() {
        let base: u32 = 1_000_000;
        let router = Arc::new(Router::new(1));
        let (_tx, rx) = event::channel(16);
        let mut collector = Collector::new(router, rx, base);
        for i in 0..=STORAGE_THRESHOLD {
            collector.on_add(Bytes::from(format!("k{i}")), 0);
        }
        assert!(collector.items() > STORAGE_THRESHOLD);
        collector.on_tick(base + GENERATION_SIZE);
        assert_eq!(collector.items(), 0);
    }
}
