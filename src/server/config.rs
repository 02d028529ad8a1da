//! Server configuration.

/// Server configuration, built via chained `with_*` setters and
/// populated from CLI flags in the `slotcache-server` binary.
#[derive(Debug, Clone)]
pub struct Config {
    /// Bind address.
    pub bind: String,

    /// Port number.
    pub port: u16,

    /// Number of map shards (0 or 1 disables sharding).
    pub shards: usize,

    /// Generational collector tick interval, in seconds.
    pub collector_interval: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 11211,
            shards: 10,
            collector_interval: 60,
        }
    }
}

impl Config {
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_bind(mut self, bind: impl Into<String>) -> Self {
        self.bind = bind.into();
        self
    }

    pub fn with_shards(mut self, shards: usize) -> Self {
        self.shards = shards;
        self
    }

    pub fn with_collector_interval(mut self, interval: u64) -> Self {
        self.collector_interval = interval;
        self
    }
}
