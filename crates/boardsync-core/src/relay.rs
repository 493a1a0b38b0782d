//! Sync relay: the bridge between local client intents and the bus.
//!
//! The relay never applies a client's mutation directly. A local `draw`,
//! `clear-all` or `clear-mine` only yields a [`BusEvent`] to publish; the
//! stroke store changes when that event comes back through
//! [`SyncRelay::on_bus_message`], on this process and every other one alike.

use log::{debug, info, warn};

use crate::protocol::{BusEvent, ClientMessage, ServerMessage};
use crate::session::{ConnectionId, SessionRegistry};
use crate::store::StrokeStore;
use crate::stroke::{Stroke, StrokePayload};

/// What handling one client event asks the caller to do.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reaction {
    /// Pushes for the originating connection only.
    pub replies: Vec<ServerMessage>,
    /// Event to publish on the bus.
    pub publish: Option<BusEvent>,
}

impl Reaction {
    fn reply(replies: Vec<ServerMessage>) -> Self {
        Self {
            replies,
            publish: None,
        }
    }

    fn publish(event: Option<BusEvent>) -> Self {
        Self {
            replies: Vec::new(),
            publish: event,
        }
    }
}

/// Owns the stroke store and session registry of one server process.
#[derive(Debug, Default)]
pub struct SyncRelay {
    store: StrokeStore,
    sessions: SessionRegistry,
}

impl SyncRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &StrokeStore {
        &self.store
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    // --- Connection lifecycle ---

    /// Dispatch one inbound client event.
    pub fn handle_client(&mut self, conn: &ConnectionId, message: ClientMessage) -> Reaction {
        match message {
            ClientMessage::Register { user_id } => {
                Reaction::reply(self.on_register(conn, user_id.as_deref()))
            }
            ClientMessage::Draw(payload) => Reaction::publish(self.on_local_draw(conn, payload)),
            ClientMessage::ClearAll => Reaction::publish(self.on_local_clear_all(conn)),
            ClientMessage::ClearMine => Reaction::publish(self.on_local_clear_mine(conn)),
        }
    }

    /// Register a connection and bootstrap it with the current board.
    ///
    /// Replies `user-info` followed by `init-board`. Registering again keeps
    /// the user id and simply resends both, which doubles as a resync.
    pub fn on_register(&mut self, conn: &ConnectionId, supplied: Option<&str>) -> Vec<ServerMessage> {
        let user_id = self.sessions.register(conn, supplied);
        info!("User registered: {} as {}", conn, user_id);
        vec![
            ServerMessage::UserInfo { user_id },
            ServerMessage::InitBoard(self.store.snapshot()),
        ]
    }

    /// Forget a closed connection. Nothing is broadcast.
    pub fn on_disconnect(&mut self, conn: &ConnectionId) -> Option<String> {
        let user_id = self.sessions.remove(conn);
        debug!("Session removed: {} ({:?})", conn, user_id);
        user_id
    }

    // --- Local intents (publish only) ---

    pub fn on_local_draw(&self, conn: &ConnectionId, payload: StrokePayload) -> Option<BusEvent> {
        let user_id = self.registered_user(conn, "draw")?;
        Some(BusEvent::Draw {
            data: Stroke::new(payload, user_id),
        })
    }

    pub fn on_local_clear_all(&self, conn: &ConnectionId) -> Option<BusEvent> {
        self.registered_user(conn, "clear-all")?;
        Some(BusEvent::ClearAll)
    }

    pub fn on_local_clear_mine(&self, conn: &ConnectionId) -> Option<BusEvent> {
        let user_id = self.registered_user(conn, "clear-mine")?;
        Some(BusEvent::ClearUser {
            user_id: user_id.to_string(),
        })
    }

    fn registered_user(&self, conn: &ConnectionId, event: &str) -> Option<&str> {
        let user_id = self.sessions.lookup(conn);
        if user_id.is_none() {
            debug!("Dropping {} from unregistered connection {}", event, conn);
        }
        user_id
    }

    // --- Bus delivery (the only mutation path) ---

    /// Apply one raw bus message and return the pushes for every local client.
    ///
    /// Malformed messages are logged and dropped; nothing is broadcast.
    pub fn on_bus_message(&mut self, raw: &str) -> Vec<ServerMessage> {
        match BusEvent::decode(raw) {
            Ok(event) => self.apply(event),
            Err(e) => {
                warn!("Ignoring malformed bus message: {}", e);
                Vec::new()
            }
        }
    }

    /// Apply a decoded bus event and return the pushes for every local client.
    pub fn apply(&mut self, event: BusEvent) -> Vec<ServerMessage> {
        match event {
            BusEvent::Draw { data } => {
                self.store.apply_draw(data.clone());
                vec![ServerMessage::Draw(data)]
            }
            BusEvent::ClearAll => {
                self.store.apply_clear_all();
                vec![ServerMessage::ClearAll]
            }
            BusEvent::ClearUser { user_id } => {
                let removed = self.store.apply_clear_user(&user_id);
                debug!("Cleared {} strokes of {}", removed, user_id);
                // A partial clear is followed by the full board so clients
                // never have to patch ordering themselves.
                vec![
                    ServerMessage::ClearUser { user_id },
                    ServerMessage::ResetBoard(self.store.snapshot()),
                ]
            }
        }
    }
}
