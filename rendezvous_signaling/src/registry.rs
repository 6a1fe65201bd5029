//! Connection registry
//!
//! Tracks every live connection and the room it currently belongs to.
//! Room membership is only changed by the router, which keeps this table and
//! the [`RoomTable`](crate::rooms::RoomTable) in step.

use crate::error::RelayError;
use rendezvous_protocol::{ConnectionId, RoomId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-connection state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    /// `None` until the connection joins a room
    pub room: Option<RoomId>,
}

impl Connection {
    fn new(id: ConnectionId) -> Self {
        Self { id, room: None }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection with no room.
    ///
    /// Fails if the id is already live.
    pub fn register(&mut self, id: ConnectionId) -> Result<(), RelayError> {
        if self.connections.contains_key(&id) {
            return Err(RelayError::DuplicateConnection(id));
        }
        self.connections.insert(id.clone(), Connection::new(id));
        Ok(())
    }

    pub fn lookup(&self, id: &ConnectionId) -> Option<&Connection> {
        self.connections.get(id)
    }

    pub fn lookup_mut(&mut self, id: &ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(id)
    }

    /// Remove a connection, returning its last state.
    ///
    /// Room cleanup must already have happened.
    pub fn unregister(&mut self, id: &ConnectionId) -> Option<Connection> {
        self.connections.remove(id)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Connection> {
        self.connections.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_starts_without_room() {
        let mut registry = ConnectionRegistry::new();
        registry.register("a".into()).unwrap();

        let connection = registry.lookup(&"a".into()).unwrap();
        assert_eq!(connection.id, ConnectionId::from("a"));
        assert!(connection.room.is_none());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_duplicate_fails() {
        let mut registry = ConnectionRegistry::new();
        registry.register("a".into()).unwrap();

        assert_eq!(
            registry.register("a".into()),
            Err(RelayError::DuplicateConnection("a".into()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unregister_returns_last_state() {
        let mut registry = ConnectionRegistry::new();
        registry.register("a".into()).unwrap();
        registry.lookup_mut(&"a".into()).unwrap().room = Some("r1".into());

        let removed = registry.unregister(&"a".into()).unwrap();
        assert_eq!(removed.room, Some(RoomId::from("r1")));
        assert!(!registry.contains(&"a".into()));
        assert!(registry.unregister(&"a".into()).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn lookup_unknown_is_none() {
        let registry = ConnectionRegistry::new();
        assert!(registry.lookup(&"ghost".into()).is_none());
    }
}
