//! slotcache server binary
//!
//! In-memory cache server speaking the memcached ASCII protocol.

use clap::Parser;
use slotcache::server::Config;
use slotcache::Server;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Bind address
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Port number
    #[arg(long, default_value_t = 11211)]
    port: u16,

    /// Number of map shards (0 or 1 disables sharding)
    #[arg(long, default_value_t = 10)]
    shards: usize,

    /// Generational collector tick interval, in seconds
    #[arg(long, default_value_t = 60)]
    collector_interval: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("slotcache=info".parse()?))
        .init();

    let args = Args::parse();

    info!(bind = %args.bind, port = args.port, shards = args.shards, "starting slotcache server");

    let config = Config::default()
        .with_bind(&args.bind)
        .with_port(args.port)
        .with_shards(args.shards)
        .with_collector_interval(args.collector_interval);

    let server = Server::new(config);
    server.run().await?;

    Ok(())
}
