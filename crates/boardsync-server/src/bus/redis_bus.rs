//! Redis PUBLISH/SUBSCRIBE bus.

use super::{BoxFuture, BusResult, BusStream, MessageBus};
use futures_util::StreamExt;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tracing::{info, warn};

/// Bus spanning every server process connected to the same Redis topic.
///
/// Publishing goes through one multiplexed connection, so events issued by
/// this process reach Redis in issue order. Subscriptions open a dedicated
/// pub/sub connection. Lost connections are not re-established.
pub struct RedisBus {
    client: redis::Client,
    publisher: MultiplexedConnection,
    topic: String,
}

impl RedisBus {
    /// Connect the publishing side to `url` (e.g. `redis://127.0.0.1:6379/`).
    pub async fn connect(url: &str, topic: impl Into<String>) -> BusResult<Self> {
        let client = redis::Client::open(url)?;
        let publisher = client.get_multiplexed_async_connection().await?;
        info!(url, "Connected to Redis");
        Ok(Self {
            client,
            publisher,
            topic: topic.into(),
        })
    }
}

impl MessageBus for RedisBus {
    fn topic(&self) -> &str {
        &self.topic
    }

    fn publish(&self, payload: String) -> BoxFuture<'_, BusResult<()>> {
        let mut conn = self.publisher.clone();
        let topic = self.topic.clone();
        Box::pin(async move {
            let _receivers: i64 = conn.publish(topic, payload).await?;
            Ok(())
        })
    }

    fn subscribe(&self) -> BoxFuture<'_, BusResult<BusStream>> {
        let client = self.client.clone();
        let topic = self.topic.clone();
        Box::pin(async move {
            let mut pubsub = client.get_async_pubsub().await?;
            pubsub.subscribe(&topic).await?;
            info!(topic = %topic, "Subscribed to Redis topic");

            let messages = pubsub.into_on_message().filter_map(|msg| async move {
                match msg.get_payload::<String>() {
                    Ok(payload) => Some(payload),
                    Err(e) => {
                        warn!(error = %e, "Dropping non-text Redis message");
                        None
                    }
                }
            });
            Ok(Box::pin(messages) as BusStream)
        })
    }
}
