//! Ticker — periodic heartbeat that tells the collector to sweep due
//! generations.
//!
//! Grounded in `storage/ttl.rs`'s `TtlCleaner`: a `tokio::time::interval`
//! loop spawned as its own task. Generalized from "cleanup_expired on
//! every tick" to "emit a `Tick` event and let the collector decide what
//! is due" (the collector's generational bookkeeping needs the wall
//! clock, not a direct sweep call).

use std::time::Duration;

use tokio::time::interval;
use tracing::info;

use super::entry::now_unix;
use super::event::{Event, EventSender};

pub struct Ticker {
    events: EventSender,
    interval: Duration,
}

impl Ticker {
    pub fn new(events: EventSender, interval_secs: u64) -> Self {
        Self {
            events,
            interval: Duration::from_secs(interval_secs.max(1)),
        }
    }

    pub async fn run(self) {
        let mut ticker = interval(self.interval);
        info!(interval = ?self.interval, "collector ticker started");
        loop {
            ticker.tick().await;
            if self.events.send(Event::Tick { now: now_unix() }).await.is_err() {
                break;
            }
        }
    }

    pub fn spawn(events: EventSender, interval_secs: u64) -> tokio::task::JoinHandle<()> {
        let ticker = Self::new(events, interval_secs);
        tokio::spawn(ticker.run())
    }
}
