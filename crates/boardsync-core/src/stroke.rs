//! Strokes: opaque drawing payloads attributed to one user.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON key carrying the author of a stroke.
pub const USER_ID_KEY: &str = "userId";

/// Positional/visual data of a stroke (coordinates, color, ...).
///
/// The relay never looks inside it.
pub type StrokePayload = Map<String, Value>;

/// One atomic drawing primitive.
///
/// On the wire a stroke is its payload object with `userId` merged in:
/// `{ "x": 1, "y": 1, "color": "red", "userId": "AAAA" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stroke {
    #[serde(rename = "userId")]
    user_id: String,
    #[serde(flatten)]
    payload: StrokePayload,
}

impl Stroke {
    /// Attribute a payload to `user_id`.
    ///
    /// Any `userId` the payload already carries is discarded; attribution
    /// always comes from the session.
    pub fn new(mut payload: StrokePayload, user_id: impl Into<String>) -> Self {
        payload.remove(USER_ID_KEY);
        Self {
            user_id: user_id.into(),
            payload,
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn payload(&self) -> &StrokePayload {
        &self.payload
    }
}
