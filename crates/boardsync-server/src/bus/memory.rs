//! In-process bus backed by a tokio broadcast channel.

use super::{BoxFuture, BusResult, BusStream, MessageBus};
use futures_util::stream;
use tokio::sync::broadcast;
use tracing::warn;

const CHANNEL_CAPACITY: usize = 1024;

/// In-memory bus for tests and single-node deployments.
///
/// Clones share the same channel, so several hubs holding clones of one
/// `MemoryBus` behave like several server processes on one Redis topic.
#[derive(Clone)]
pub struct MemoryBus {
    topic: String,
    tx: broadcast::Sender<String>,
}

impl MemoryBus {
    pub fn new(topic: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            topic: topic.into(),
            tx,
        }
    }
}

impl MessageBus for MemoryBus {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn publish(&self, payload: String) -> BoxFuture<'_, BusResult<()>> {
        // No subscribers means nobody to deliver to, same as Redis.
        let _ = self.tx.send(payload);
        Box::pin(async { Ok(()) })
    }

    fn subscribe(&self) -> BoxFuture<'_, BusResult<BusStream>> {
        let rx = self.tx.subscribe();
        let topic = self.topic.clone();
        Box::pin(async move {
            let messages = stream::unfold(rx, move |mut rx| {
                let topic = topic.clone();
                async move {
                    loop {
                        match rx.recv().await {
                            Ok(message) => return Some((message, rx)),
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!(topic = %topic, skipped, "Bus subscriber lagged, messages lost");
                            }
                            Err(broadcast::error::RecvError::Closed) => return None,
                        }
                    }
                }
            });
            Ok(Box::pin(messages) as BusStream)
        })
    }
}
