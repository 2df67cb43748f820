use std::time::Duration;

use envconfig::Envconfig;

/// Only the HTTP service itself is configured from the environment. The
/// remote endpoint and credentials arrive at runtime through `/store-data`
/// and are never persisted.
#[derive(Envconfig)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "0.0.0.0")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3300")]
    pub port: u16,

    #[envconfig(default = "true")]
    pub export_prometheus: bool,

    #[envconfig(from = "RPC_TIMEOUT_SECONDS", default = "30")]
    pub rpc_timeout_seconds: u64,
}

impl Config {
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_seconds)
    }
}
