//! Message bus abstraction.
//!
//! One topic per bus. Every subscribed process receives every published
//! message, including its own. Delivery is at-most-once and there is no
//! ordering guarantee between different publishers.

mod memory;
mod redis_bus;

pub use memory::MemoryBus;
pub use redis_bus::RedisBus;

use futures_util::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Default topic shared by all server processes.
pub const DEFAULT_TOPIC: &str = "whiteboard-events";

/// Bus errors.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("Bus closed")]
    Closed,
}

/// Result type for bus operations.
pub type BusResult<T> = Result<T, BusError>;

/// Boxed future for bus operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Stream of raw messages received on the topic.
pub type BusStream = Pin<Box<dyn Stream<Item = String> + Send>>;

/// A publish/subscribe channel bound to one topic.
pub trait MessageBus: Send + Sync {
    /// Topic this bus publishes to and subscribes on.
    fn topic(&self) -> &str;

    /// Publish a raw message. No acknowledgement, no retry.
    fn publish(&self, payload: String) -> BoxFuture<'_, BusResult<()>>;

    /// Start receiving every message published on the topic from now on.
    fn subscribe(&self) -> BoxFuture<'_, BusResult<BusStream>>;
}
