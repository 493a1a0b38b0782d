//! Wire protocol.
//!
//! Three message families, all JSON:
//!
//! Bus events, shared by every server process on one topic:
//! ```json
//! { "type": "draw", "data": { "x": 1, "y": 1, "color": "red", "userId": "AAAA" } }
//! { "type": "clear-all" }
//! { "type": "clear-user", "userId": "AAAA" }
//! ```
//!
//! Client frames (client → server), an event name plus optional payload:
//! ```json
//! { "event": "register", "data": { "userId": "AAAA" } }
//! { "event": "draw", "data": { "x": 1, "y": 1, "color": "red" } }
//! { "event": "clear-all" }
//! { "event": "clear-mine" }
//! ```
//!
//! Server pushes (server → client) use the same envelope with the
//! `user-info`, `init-board`, `draw`, `clear-all`, `clear-user` and
//! `reset-board` events.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::stroke::{Stroke, StrokePayload, USER_ID_KEY};

/// Protocol errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unknown event: {0}")]
    UnknownEvent(String),
    #[error("Invalid payload for {event}: {reason}")]
    InvalidPayload { event: &'static str, reason: String },
}

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// A board mutation as carried by the message bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum BusEvent {
    /// Append a stroke
    Draw { data: Stroke },
    /// Remove every stroke
    ClearAll,
    /// Remove every stroke of one user
    ClearUser {
        #[serde(rename = "userId")]
        user_id: String,
    },
}

impl BusEvent {
    pub fn encode(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Event name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            BusEvent::Draw { .. } => "draw",
            BusEvent::ClearAll => "clear-all",
            BusEvent::ClearUser { .. } => "clear-user",
        }
    }
}

/// An inbound event from a connected client.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Bind the connection to a user id (derived if absent)
    Register { user_id: Option<String> },
    /// Draw a stroke
    Draw(StrokePayload),
    /// Clear the whole board
    ClearAll,
    /// Clear the strokes of the sender
    ClearMine,
}

/// Raw `{ event, data }` envelope.
#[derive(Debug, Serialize, Deserialize)]
struct Frame {
    event: String,
    #[serde(default, skip_serializing_if = "Value::is_null")]
    data: Value,
}

impl ClientMessage {
    pub fn decode(text: &str) -> ProtocolResult<Self> {
        let frame: Frame = serde_json::from_str(text)?;
        match frame.event.as_str() {
            "register" => Ok(ClientMessage::Register {
                user_id: register_user_id(frame.data)?,
            }),
            "draw" => match frame.data {
                Value::Object(payload) => Ok(ClientMessage::Draw(payload)),
                other => Err(ProtocolError::InvalidPayload {
                    event: "draw",
                    reason: format!("expected an object, got {}", json_type(&other)),
                }),
            },
            "clear-all" => Ok(ClientMessage::ClearAll),
            "clear-mine" => Ok(ClientMessage::ClearMine),
            other => Err(ProtocolError::UnknownEvent(other.to_string())),
        }
    }

    pub fn encode(&self) -> ProtocolResult<String> {
        let data = match self {
            ClientMessage::Register { user_id: Some(user_id) } => {
                serde_json::json!({ USER_ID_KEY: user_id })
            }
            ClientMessage::Register { user_id: None } => serde_json::json!({}),
            ClientMessage::Draw(payload) => Value::Object(payload.clone()),
            ClientMessage::ClearAll | ClientMessage::ClearMine => Value::Null,
        };
        let frame = Frame {
            event: self.event_name().to_string(),
            data,
        };
        Ok(serde_json::to_string(&frame)?)
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            ClientMessage::Register { .. } => "register",
            ClientMessage::Draw(_) => "draw",
            ClientMessage::ClearAll => "clear-all",
            ClientMessage::ClearMine => "clear-mine",
        }
    }
}

fn register_user_id(data: Value) -> ProtocolResult<Option<String>> {
    let mut map = match data {
        Value::Null => return Ok(None),
        Value::Object(map) => map,
        other => {
            return Err(ProtocolError::InvalidPayload {
                event: "register",
                reason: format!("expected an object, got {}", json_type(&other)),
            });
        }
    };
    match map.remove(USER_ID_KEY) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(user_id)) => Ok(Some(user_id)),
        Some(other) => Err(ProtocolError::InvalidPayload {
            event: "register",
            reason: format!("userId must be a string, got {}", json_type(&other)),
        }),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// A push from the server to a connected client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// The user id assigned at registration
    UserInfo {
        #[serde(rename = "userId")]
        user_id: String,
    },
    /// Full board state for a freshly registered client
    InitBoard(Vec<Stroke>),
    /// A stroke was appended
    Draw(Stroke),
    /// The board was cleared
    ClearAll,
    /// One user's strokes were removed
    ClearUser {
        #[serde(rename = "userId")]
        user_id: String,
    },
    /// Authoritative full board state after a partial clear
    ResetBoard(Vec<Stroke>),
}

impl ServerMessage {
    pub fn encode(&self) -> ProtocolResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(text: &str) -> ProtocolResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}
