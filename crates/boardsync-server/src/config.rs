//! Process configuration: command-line flags with environment fallbacks.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::bus::DEFAULT_TOPIC;

/// Which message bus connects this process to its peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BusKind {
    /// Redis PUBLISH/SUBSCRIBE, for any number of processes
    Redis,
    /// In-process channel, for a single process
    Memory,
}

/// boardsync relay server
#[derive(Parser, Debug, Clone)]
#[command(name = "boardsync-server", version, about = "Shared whiteboard relay server")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// Bind address
    #[arg(long, env = "BOARDSYNC_BIND_ADDRESS", default_value = "0.0.0.0")]
    pub bind_address: IpAddr,

    /// Redis host
    #[arg(long, env = "REDIS_HOST", default_value = "127.0.0.1")]
    pub redis_host: String,

    /// Redis port
    #[arg(long, env = "REDIS_PORT", default_value_t = 6379)]
    pub redis_port: u16,

    /// Bus topic shared by all processes serving the same board
    #[arg(long, env = "BOARDSYNC_TOPIC", default_value = DEFAULT_TOPIC)]
    pub topic: String,

    /// Directory of static frontend files
    #[arg(long, env = "BOARDSYNC_STATIC_DIR", default_value = "public")]
    pub static_dir: PathBuf,

    /// Message bus backend
    #[arg(long, env = "BOARDSYNC_BUS", value_enum, default_value_t = BusKind::Redis)]
    pub bus: BusKind,

    /// Emit structured JSON logs
    #[arg(long, env = "BOARDSYNC_JSON_LOGS")]
    pub json_logs: bool,
}

impl Config {
    pub fn redis_url(&self) -> String {
        format!("redis://{}:{}/", self.redis_host, self.redis_port)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port)
    }
}
