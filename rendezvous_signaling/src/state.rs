//! Shared relay state
//!
//! [`RelayState`] owns the connection registry and the room table behind a
//! single lock. Every read or mutation of either table happens inside one
//! critical section, so joins, leaves and disconnects touching the same room
//! are linearized and the two tables never disagree between operations.

use crate::{
    error::RelayError,
    registry::{Connection, ConnectionRegistry},
    rooms::RoomTable,
};
use parking_lot::Mutex;
use rendezvous_protocol::{ConnectionId, RoomId};
use serde::{Deserialize, Serialize};

/// Both tables, only reachable through [`RelayState::with`]
///
/// Serializable so a host that does not keep the process alive between
/// requests can carry the tables over.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Tables {
    pub connections: ConnectionRegistry,
    pub rooms: RoomTable,
}

impl Tables {
    /// Check that every member of `room_id` is registered and points back at it.
    pub fn verify_room(&self, room_id: &RoomId) -> Result<(), RelayError> {
        let Some(room) = self.rooms.get(room_id) else {
            return Ok(());
        };
        if room.is_empty() {
            return Err(RelayError::Inconsistent {
                room: room_id.clone(),
                detail: "room has no members".to_string(),
            });
        }
        for member in room.members() {
            match self.connections.lookup(member) {
                None => {
                    return Err(RelayError::Inconsistent {
                        room: room_id.clone(),
                        detail: format!("member {member} is not registered"),
                    });
                }
                Some(connection) if connection.room.as_ref() != Some(room_id) => {
                    return Err(RelayError::Inconsistent {
                        room: room_id.clone(),
                        detail: format!("member {member} belongs to {:?}", connection.room),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Drop a room and clear every connection that points at it.
    ///
    /// Returns the connections that lost their room.
    pub fn reset_room(&mut self, room_id: &RoomId) -> Vec<ConnectionId> {
        let mut cleared = self.rooms.remove_room(room_id);
        let stragglers: Vec<ConnectionId> = self
            .connections
            .iter()
            .filter(|connection| connection.room.as_ref() == Some(room_id))
            .map(|connection| connection.id.clone())
            .collect();
        for id in stragglers {
            if !cleared.contains(&id) {
                cleared.push(id);
            }
        }
        for id in &cleared {
            if let Some(connection) = self.connections.lookup_mut(id) {
                if connection.room.as_ref() == Some(room_id) {
                    connection.room = None;
                }
            }
        }
        cleared
    }

    /// Every violation of the registry/room-table agreement, in both directions
    pub fn violations(&self) -> Vec<RelayError> {
        let mut violations: Vec<RelayError> = self
            .rooms
            .iter()
            .filter_map(|room| self.verify_room(&room.id).err())
            .collect();

        for connection in self.connections.iter() {
            let Some(room_id) = &connection.room else {
                continue;
            };
            let is_member = self
                .rooms
                .get(room_id)
                .is_some_and(|room| room.contains(&connection.id));
            if !is_member {
                violations.push(RelayError::Inconsistent {
                    room: room_id.clone(),
                    detail: format!("connection {} is not a member", connection.id),
                });
            }
        }
        violations
    }
}

/// Connection and room counts at one instant
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub connections: usize,
    pub rooms: usize,
}

/// The single mutation authority over both tables
#[derive(Debug, Default)]
pub struct RelayState {
    tables: Mutex<Tables>,
}

impl RelayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to both tables
    pub fn with<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        let mut tables = self.tables.lock();
        f(&mut tables)
    }

    /// Copy of both tables as they are right now
    pub fn snapshot(&self) -> Tables {
        self.with(|tables| tables.clone())
    }

    /// Replace both tables wholesale
    pub fn restore(&self, snapshot: Tables) {
        self.with(|tables| *tables = snapshot);
    }

    pub fn stats(&self) -> RelayStats {
        self.with(|tables| RelayStats {
            connections: tables.connections.len(),
            rooms: tables.rooms.len(),
        })
    }

    pub fn connection(&self, id: &ConnectionId) -> Option<Connection> {
        self.with(|tables| tables.connections.lookup(id).cloned())
    }

    pub fn room_members(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.with(|tables| tables.rooms.members(room_id))
    }

    pub fn check_invariants(&self) -> Result<(), Vec<RelayError>> {
        let violations = self.with(|tables| tables.violations());
        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}
