//! Per-connection handler — reads frames off a `Framed` socket, dispatches
//! them against the cache, and writes replies back.

use std::sync::Arc;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use tracing::warn;

use crate::metrics::Metrics;
use crate::protocol::{dispatch, AsciiCodec, Outcome, Response};
use crate::storage::Cache;

pub struct Handler {
    cache: Cache,
    metrics: Arc<Metrics>,
    started_at: Instant,
}

impl Handler {
    pub fn new(cache: Cache, metrics: Arc<Metrics>, started_at: Instant) -> Self {
        Self { cache, metrics, started_at }
    }

    pub async fn run(self, mut framed: Framed<TcpStream, AsciiCodec>) -> std::io::Result<()> {
        loop {
            let Some(frame) = framed.next().await else {
                return Ok(());
            };
            let parsed = frame?;

            let outcome = match parsed {
                Ok(command) => dispatch(&self.cache, &self.metrics, self.started_at, command).await,
                Err(err) => Outcome::Reply(Response::ClientError(err.to_string())),
            };

            match outcome {
                Outcome::Reply(Response::None) => {}
                Outcome::Reply(response) => {
                    if let Err(err) = framed.send(response).await {
                        warn!(error = %err, "failed to write reply");
                        return Err(err);
                    }
                }
                Outcome::Close => return Ok(()),
            }
        }
    }
}
