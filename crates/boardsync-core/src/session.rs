//! Session registry: which user a live connection speaks for.

use std::collections::HashMap;
use std::fmt;

/// Number of connection-id characters used for a derived user id.
pub const DERIVED_USER_ID_LEN: usize = 5;

/// Opaque identity of one transport connection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(String);

impl ConnectionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ConnectionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ConnectionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Default user id for a connection that did not supply one.
///
/// The uppercased first [`DERIVED_USER_ID_LEN`] characters of the connection
/// id: short enough to read on screen, random enough for a handful of users
/// on one board.
pub fn derive_user_id(connection_id: &ConnectionId) -> String {
    connection_id
        .as_str()
        .chars()
        .take(DERIVED_USER_ID_LEN)
        .collect::<String>()
        .to_uppercase()
}

/// Maps live connections to the user id they registered as.
///
/// Process-local and never persisted; an entry lives from `register` until
/// the connection goes away.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<ConnectionId, String>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `connection_id` to a user id and return it.
    ///
    /// A non-empty `supplied` id is adopted verbatim, otherwise one is derived
    /// from the connection id. Once bound, the user id never changes: a
    /// repeated registration returns the existing id and ignores `supplied`.
    pub fn register(&mut self, connection_id: &ConnectionId, supplied: Option<&str>) -> String {
        self.sessions
            .entry(connection_id.clone())
            .or_insert_with(|| match supplied {
                Some(user_id) if !user_id.is_empty() => user_id.to_string(),
                _ => derive_user_id(connection_id),
            })
            .clone()
    }

    pub fn lookup(&self, connection_id: &ConnectionId) -> Option<&str> {
        self.sessions.get(connection_id).map(String::as_str)
    }

    /// Forget a connection. Removing an unknown connection is not an error.
    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<String> {
        self.sessions.remove(connection_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_user_id() {
        let conn = ConnectionId::new("a1b2c3d4-0000-4000-8000-000000000000");
        assert_eq!(derive_user_id(&conn), "A1B2C");
    }

    #[test]
    fn test_derive_user_id_short_connection() {
        assert_eq!(derive_user_id(&ConnectionId::new("ab")), "AB");
        assert_eq!(derive_user_id(&ConnectionId::new("")), "");
    }

    #[test]
    fn test_supplied_user_id_is_adopted_verbatim() {
        let mut sessions = SessionRegistry::new();
        let conn = ConnectionId::new("xyz12345");
        assert_eq!(sessions.register(&conn, Some("alice")), "alice");
        assert_eq!(sessions.lookup(&conn), Some("alice"));
    }

    #[test]
    fn test_empty_supplied_user_id_falls_back() {
        let mut sessions = SessionRegistry::new();
        let conn = ConnectionId::new("xyz12345");
        assert_eq!(sessions.register(&conn, Some("")), "XYZ12");
    }

    #[test]
    fn test_registration_determinism() {
        let mut sessions = SessionRegistry::new();
        let conn = ConnectionId::new("qwerty-123");
        let first = sessions.register(&conn, None);
        let second = sessions.register(&conn, None);
        assert_eq!(first, "QWERT");
        assert_eq!(first, second);
    }

    #[test]
    fn test_user_id_fixed_for_session_lifetime() {
        let mut sessions = SessionRegistry::new();
        let conn = ConnectionId::new("conn-1");
        sessions.register(&conn, Some("alice"));
        assert_eq!(sessions.register(&conn, Some("bob")), "alice");
        assert_eq!(sessions.register(&conn, None), "alice");
    }

    #[test]
    fn test_lookup_before_register_and_after_remove() {
        let mut sessions = SessionRegistry::new();
        let conn = ConnectionId::new("conn-1");
        assert_eq!(sessions.lookup(&conn), None);

        sessions.register(&conn, Some("alice"));
        assert_eq!(sessions.remove(&conn), Some("alice".to_string()));
        assert_eq!(sessions.lookup(&conn), None);
        assert!(sessions.is_empty());

        // Removing twice is harmless
        assert_eq!(sessions.remove(&conn), None);
    }

    #[test]
    fn test_reregister_after_remove_starts_fresh() {
        let mut sessions = SessionRegistry::new();
        let conn = ConnectionId::new("conn-1");
        sessions.register(&conn, Some("alice"));
        sessions.remove(&conn);
        assert_eq!(sessions.register(&conn, Some("bob")), "bob");
    }
}
