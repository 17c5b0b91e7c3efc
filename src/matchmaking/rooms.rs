//! Room registry: two-member sessions and relay target resolution

use crate::types::{ConnectionId, Room, RoomId, RoomStatus};
use crate::utils::{current_timestamp, generate_room_id};
use std::collections::HashMap;

/// A room removed because one of its members left
#[derive(Debug, Clone)]
pub struct ClosedRoom {
    /// Final record, with status `Closing`
    pub room: Room,
    /// Member that is still connected
    pub remaining: ConnectionId,
}

#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
    by_member: HashMap<ConnectionId, RoomId>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an active room for two participants
    pub fn open_room(&mut self, first: ConnectionId, second: ConnectionId) -> Room {
        let room = Room {
            id: generate_room_id(),
            members: [first.clone(), second.clone()],
            created_at: current_timestamp(),
            status: RoomStatus::Active,
        };

        self.by_member.insert(first, room.id);
        self.by_member.insert(second, room.id);
        self.rooms.insert(room.id, room.clone());
        room
    }

    pub fn get(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    pub fn room_of(&self, connection_id: &str) -> Option<RoomId> {
        self.by_member.get(connection_id).copied()
    }

    /// The member that should receive a message `sender` sent to `room_id`.
    ///
    /// `None` when the room is gone or `sender` is not one of its members.
    pub fn relay_target(&self, room_id: &RoomId, sender: &str) -> Option<&ConnectionId> {
        self.rooms
            .get(room_id)
            .filter(|room| room.status == RoomStatus::Active)
            .and_then(|room| room.partner_of(sender))
    }

    /// Destroy the room containing `departing`, if any
    pub fn close_room_of(&mut self, departing: &str) -> Option<ClosedRoom> {
        let room_id = self.by_member.remove(departing)?;
        let mut room = self.rooms.remove(&room_id)?;
        room.status = RoomStatus::Closing;

        let remaining = room.partner_of(departing)?.clone();
        self.by_member.remove(&remaining);

        Some(ClosedRoom { room, remaining })
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

    /// Number of connections indexed as room members
    pub fn member_count(&self) -> usize {
        self.by_member.len()
    }
}
