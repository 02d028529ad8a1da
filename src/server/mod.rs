//! Server module
//!
//! TCP server for handling ASCII protocol connections.

mod config;
mod handler;

pub use config::Config;
pub use handler::Handler;

use std::sync::Arc;
use std::time::Instant;

use tokio::net::TcpListener;
use tokio_util::codec::Framed;
use tracing::{error, info};

use crate::metrics::Metrics;
use crate::protocol::AsciiCodec;
use crate::storage::Cache;

/// slotcache server: binds a listener, spawns the storage core's
/// background tasks, and spawns one task per accepted connection.
pub struct Server {
    config: Config,
    cache: Cache,
    metrics: Arc<Metrics>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        let cache = Cache::spawn(config.shards, config.collector_interval);
        Self {
            config,
            cache,
            metrics: Arc::new(Metrics::new()),
        }
    }

    pub async fn run(self) -> std::io::Result<()> {
        let addr = format!("{}:{}", self.config.bind, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        info!(%addr, shards = self.config.shards, "slotcache server listening");
        self.serve(listener).await
    }

    /// Runs the accept loop against an already-bound listener. Split out
    /// from `run` so tests can bind an ephemeral port and read back its
    /// real address before the server starts serving it.
    pub async fn serve(self, listener: TcpListener) -> std::io::Result<()> {
        let started_at = Instant::now();

        loop {
            match listener.accept().await {
                Ok((socket, peer_addr)) => {
                    info!(%peer_addr, "new connection");
                    self.metrics.record_connection();

                    let cache = self.cache.clone();
                    let metrics = self.metrics.clone();

                    tokio::spawn(async move {
                        let framed = Framed::new(socket, AsciiCodec::new());
                        let handler = Handler::new(cache, metrics, started_at);

                        if let Err(err) = handler.run(framed).await {
                            error!(%peer_addr, error = %err, "connection error");
                        }

                        info!(%peer_addr, "connection closed");
                    });
                }
                Err(err) => {
                    error!(error = %err, "accept error");
                }
            }
        }
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }
}
