//! boardsync core library
//!
//! Platform-agnostic state for a shared, append-only whiteboard that is kept
//! consistent across server processes by replaying one bus event stream.
//!
//! Nothing in here performs I/O: the [`SyncRelay`] turns client intents into
//! [`BusEvent`]s to publish and turns bus deliveries into [`ServerMessage`]
//! pushes. The server crate owns the sockets, the bus and the event loop.

pub mod protocol;
pub mod relay;
pub mod session;
pub mod store;
pub mod stroke;

pub use protocol::{BusEvent, ClientMessage, ProtocolError, ServerMessage};
pub use relay::{Reaction, SyncRelay};
pub use session::{ConnectionId, SessionRegistry, derive_user_id, DERIVED_USER_ID_LEN};
pub use store::StrokeStore;
pub use stroke::{Stroke, StrokePayload, USER_ID_KEY};
