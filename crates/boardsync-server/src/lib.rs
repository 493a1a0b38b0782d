//! boardsync relay server
//!
//! Serves the whiteboard frontend, accepts WebSocket clients and keeps this
//! process's board in step with every other process on the same bus topic.

pub mod bus;
pub mod config;
pub mod gateway;
pub mod hub;

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use bus::{BusError, MemoryBus, MessageBus, RedisBus};
use config::{BusKind, Config};

/// Server startup errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Bus error: {0}")]
    Bus(#[from] BusError),
}

/// Connect the bus, start the hub and serve until the listener fails.
pub async fn run(config: Config) -> Result<(), ServerError> {
    let bus: Arc<dyn MessageBus> = match config.bus {
        BusKind::Redis => Arc::new(RedisBus::connect(&config.redis_url(), config.topic.clone()).await?),
        BusKind::Memory => Arc::new(MemoryBus::new(config.topic.clone())),
    };
    let hub = hub::start(bus).await?;

    let static_dir = config.static_dir.is_dir().then_some(config.static_dir.as_path());
    if static_dir.is_none() {
        info!(dir = %config.static_dir.display(), "Static directory not found, serving API only");
    }
    let app = gateway::router(hub, static_dir);

    let addr = config.listen_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Whiteboard running at http://{}", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
