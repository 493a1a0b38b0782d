//! WebSocket connection gateway and HTTP routes.
//!
//! Routes:
//! - `GET /ws`: WebSocket endpoint speaking the client frame protocol
//! - `GET /health`: liveness probe
//! - everything else: static frontend files

use std::path::Path;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use boardsync_core::{ClientMessage, ConnectionId};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::hub::{HubHandle, OUTBOX_CAPACITY};

#[derive(Clone)]
struct GatewayState {
    hub: HubHandle,
}

/// Build the HTTP router. Static files are served from `static_dir` if given.
pub fn router(hub: HubHandle, static_dir: Option<&Path>) -> Router {
    let mut router = Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health));
    if let Some(dir) = static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }
    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(GatewayState { hub })
}

async fn health() -> &'static str {
    "ok"
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<GatewayState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

/// Pump one WebSocket until it closes.
///
/// Inbound text frames become hub commands; the connection's outbox is
/// drained back onto the socket.
async fn handle_socket(socket: WebSocket, hub: HubHandle) {
    let conn = ConnectionId::new(Uuid::new_v4().to_string());
    info!(%conn, "Socket connected");

    let (mut sender, mut receiver) = socket.split();
    let (outbox, mut inbox) = mpsc::channel::<String>(OUTBOX_CAPACITY);
    if hub.connect(conn.clone(), outbox).is_err() {
        warn!(%conn, "Hub unavailable, dropping connection");
        return;
    }

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match ClientMessage::decode(text.as_str()) {
                            Ok(message) => {
                                if hub.client(conn.clone(), message).is_err() {
                                    break;
                                }
                            }
                            Err(e) => warn!(%conn, error = %e, "Invalid client frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Binary, ping, pong
                    Some(Err(e)) => {
                        warn!(%conn, error = %e, "WebSocket error");
                        break;
                    }
                }
            }

            out = inbox.recv() => {
                match out {
                    Some(text) => {
                        if sender.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        }
    }

    let _ = hub.disconnect(conn.clone());
    info!(%conn, "Socket disconnected");
}
