//! Room table
//!
//! Maps each room to its members in join order. A room exists exactly as long
//! as it has at least one member: it is created by the first join and dropped
//! by the last leave.

use indexmap::IndexSet;
use rendezvous_protocol::{ConnectionId, RoomId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    members: IndexSet<ConnectionId>,
}

impl Room {
    fn new(id: RoomId) -> Self {
        Self {
            id,
            members: IndexSet::new(),
        }
    }

    pub fn members(&self) -> impl Iterator<Item = &ConnectionId> {
        self.members.iter()
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.members.contains(id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Result of [`RoomTable::join`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinOutcome {
    /// `false` when the connection was already a member
    pub added: bool,
    /// Membership after the join, in join order
    pub members: Vec<ConnectionId>,
}

impl JoinOutcome {
    pub fn user_count(&self) -> usize {
        self.members.len()
    }
}

/// Result of [`RoomTable::leave`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaveOutcome {
    /// The room does not exist or the connection was not in it
    NotMember,
    /// Removed; the room lives on with these members
    Left { remaining: Vec<ConnectionId> },
    /// Removed the last member and dropped the room
    Emptied,
}

impl LeaveOutcome {
    pub fn removed(&self) -> bool {
        !matches!(self, Self::NotMember)
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomTable {
    rooms: HashMap<RoomId, Room>,
}

impl RoomTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection to a room, creating the room on first use.
    ///
    /// Joining twice leaves a single membership entry.
    pub fn join(&mut self, room_id: &RoomId, id: &ConnectionId) -> JoinOutcome {
        let room = self
            .rooms
            .entry(room_id.clone())
            .or_insert_with(|| Room::new(room_id.clone()));
        let added = room.members.insert(id.clone());

        JoinOutcome {
            added,
            members: room.members.iter().cloned().collect(),
        }
    }

    /// Remove a connection from a room. Absent rooms and members are a no-op.
    pub fn leave(&mut self, room_id: &RoomId, id: &ConnectionId) -> LeaveOutcome {
        let Some(room) = self.rooms.get_mut(room_id) else {
            return LeaveOutcome::NotMember;
        };
        if !room.members.shift_remove(id) {
            return LeaveOutcome::NotMember;
        }

        if room.members.is_empty() {
            self.rooms.remove(room_id);
            LeaveOutcome::Emptied
        } else {
            LeaveOutcome::Left {
                remaining: room.members.iter().cloned().collect(),
            }
        }
    }

    pub fn get(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn member_count(&self, room_id: &RoomId) -> usize {
        self.rooms.get(room_id).map_or(0, Room::len)
    }

    pub fn members(&self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|room| room.members.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Drop a room wholesale, returning the members it had
    pub fn remove_room(&mut self, room_id: &RoomId) -> Vec<ConnectionId> {
        self.rooms
            .remove(room_id)
            .map(|room| room.members.into_iter().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }
}
