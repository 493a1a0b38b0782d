//! The per-process event loop.
//!
//! One task owns the [`SyncRelay`] and the outboxes of every locally
//! connected client. Connection events and bus deliveries are funnelled
//! through a single command channel and handled strictly one at a time, so
//! the relay needs no locking.
//!
//! ```text
//! gateway ──Connect/Client/Disconnect──┐
//!                                      ▼
//!                                   Hub task ──publish──▶ publisher task ──▶ bus
//!                                      ▲                                     │
//! bus pump ───────────Bus(raw)─────────┘◀────────────────────────────────────┘
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use boardsync_core::{BusEvent, ClientMessage, ConnectionId, ServerMessage, Stroke, SyncRelay};
use futures_util::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::bus::{BusResult, MessageBus};

/// Pushes buffered per client before it counts as lagging.
pub const OUTBOX_CAPACITY: usize = 256;

/// Sender half of a client's outbound queue (encoded JSON frames).
///
/// Bounded by [`OUTBOX_CAPACITY`]. A client whose queue is full is detached:
/// its outbox is dropped, which ends the socket loop and sends `Disconnect`.
pub type Outbox = mpsc::Sender<String>;

/// The hub task has stopped.
#[derive(Debug, Error)]
#[error("Hub event loop has stopped")]
pub struct HubClosed;

enum Command {
    Connect { conn: ConnectionId, outbox: Outbox },
    Client { conn: ConnectionId, message: ClientMessage },
    Disconnect { conn: ConnectionId },
    Bus(String),
    Snapshot(oneshot::Sender<Vec<Stroke>>),
}

/// Cloneable front door to a running hub.
#[derive(Clone)]
pub struct HubHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl HubHandle {
    /// Attach a connection. Broadcasts reach it from now on, registered or not.
    pub fn connect(&self, conn: ConnectionId, outbox: Outbox) -> Result<(), HubClosed> {
        self.send(Command::Connect { conn, outbox })
    }

    pub fn client(&self, conn: ConnectionId, message: ClientMessage) -> Result<(), HubClosed> {
        self.send(Command::Client { conn, message })
    }

    pub fn disconnect(&self, conn: ConnectionId) -> Result<(), HubClosed> {
        self.send(Command::Disconnect { conn })
    }

    /// Hand over one raw message received from the bus.
    pub fn deliver(&self, raw: String) -> Result<(), HubClosed> {
        self.send(Command::Bus(raw))
    }

    /// Current board as seen by this process.
    pub async fn snapshot(&self) -> Result<Vec<Stroke>, HubClosed> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Snapshot(tx))?;
        rx.await.map_err(|_| HubClosed)
    }

    fn send(&self, command: Command) -> Result<(), HubClosed> {
        self.tx.send(command).map_err(|_| HubClosed)
    }
}

struct Hub {
    relay: SyncRelay,
    outboxes: HashMap<ConnectionId, Outbox>,
    publisher: mpsc::UnboundedSender<String>,
}

impl Hub {
    fn handle(&mut self, command: Command) {
        match command {
            Command::Connect { conn, outbox } => {
                self.outboxes.insert(conn, outbox);
                debug!(connections = self.outboxes.len(), "Connection attached");
            }
            Command::Client { conn, message } => {
                let event = message.event_name();
                let reaction = self.relay.handle_client(&conn, message);
                for reply in &reaction.replies {
                    self.reply(&conn, reply);
                }
                if let Some(bus_event) = reaction.publish {
                    self.publish(&bus_event);
                } else if reaction.replies.is_empty() {
                    debug!(%conn, event, "Client event dropped");
                }
            }
            Command::Disconnect { conn } => {
                self.outboxes.remove(&conn);
                let user_id = self.relay.on_disconnect(&conn);
                debug!(%conn, ?user_id, connections = self.outboxes.len(), "Connection detached");
            }
            Command::Bus(raw) => {
                let pushes = self.relay.on_bus_message(&raw);
                for push in &pushes {
                    self.broadcast(push);
                }
            }
            Command::Snapshot(reply) => {
                let _ = reply.send(self.relay.store().snapshot());
            }
        }
    }

    fn publish(&self, event: &BusEvent) {
        match event.encode() {
            Ok(payload) => {
                if self.publisher.send(payload).is_err() {
                    error!(kind = event.kind(), "Publisher task has stopped, event dropped");
                }
            }
            Err(e) => warn!(error = %e, kind = event.kind(), "Failed to encode bus event"),
        }
    }

    fn reply(&mut self, conn: &ConnectionId, message: &ServerMessage) {
        let Some(text) = encode_push(message) else {
            return;
        };
        let keep = match self.outboxes.get(conn) {
            Some(outbox) => offer(conn, outbox, text),
            None => return,
        };
        if !keep {
            self.outboxes.remove(conn);
        }
    }

    fn broadcast(&mut self, message: &ServerMessage) {
        let Some(text) = encode_push(message) else {
            return;
        };
        self.outboxes
            .retain(|conn, outbox| offer(conn, outbox, text.clone()));
    }
}

fn encode_push(message: &ServerMessage) -> Option<String> {
    match message.encode() {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(error = %e, "Failed to encode push");
            None
        }
    }
}

/// Queue `text` for one client. Returns false if the outbox should be dropped.
fn offer(conn: &ConnectionId, outbox: &Outbox, text: String) -> bool {
    match outbox.try_send(text) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            warn!(%conn, capacity = OUTBOX_CAPACITY, "Client lagging, detaching");
            false
        }
        // Socket already gone; its Disconnect is queued.
        Err(TrySendError::Closed(_)) => false,
    }
}

/// Spawn the hub event loop and its publisher task on `bus`.
///
/// Nothing is delivered from the bus until [`start`] (or the caller) feeds
/// messages through [`HubHandle::deliver`].
pub fn spawn(bus: Arc<dyn MessageBus>) -> HubHandle {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (publisher, publish_rx) = mpsc::unbounded_channel();

    tokio::spawn(run_publisher(bus, publish_rx));
    tokio::spawn(async move {
        let mut hub = Hub {
            relay: SyncRelay::new(),
            outboxes: HashMap::new(),
            publisher,
        };
        while let Some(command) = rx.recv().await {
            hub.handle(command);
        }
        debug!("Hub event loop stopped");
    });

    HubHandle { tx }
}

/// Subscribe to `bus`, spawn the hub and pump every bus message into it.
pub async fn start(bus: Arc<dyn MessageBus>) -> BusResult<HubHandle> {
    // Subscribe first so our own first publish is observed.
    let mut messages = bus.subscribe().await?;
    let topic = bus.topic().to_string();
    let handle = spawn(bus);

    let pump = handle.clone();
    tokio::spawn(async move {
        while let Some(raw) = messages.next().await {
            if pump.deliver(raw).is_err() {
                return;
            }
        }
        error!(topic = %topic, "Bus subscription ended, no further board updates");
    });

    info!("Hub started");
    Ok(handle)
}

/// Publish queued events one by one so that this process's events reach the
/// bus in the order they were issued.
async fn run_publisher(bus: Arc<dyn MessageBus>, mut rx: mpsc::UnboundedReceiver<String>) {
    while let Some(payload) = rx.recv().await {
        if let Err(e) = bus.publish(payload).await {
            warn!(error = %e, topic = bus.topic(), "Publish failed, event dropped");
        }
    }
}
