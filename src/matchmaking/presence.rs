//! Presence registry of every live connection

use crate::types::{Category, ConnectionId, Location, Participant, Placement, RoomId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Registry record for one connection
#[derive(Debug, Clone)]
pub struct PresenceEntry {
    pub connection_id: ConnectionId,
    pub location: Location,
    pub connected_at: DateTime<Utc>,
    /// Set by the latest preference declaration
    pub participant: Option<Participant>,
    pub placement: Placement,
    /// Partner left and a delayed re-match is owed
    pub rematch_pending: bool,
}

impl PresenceEntry {
    pub fn is_idle(&self) -> bool {
        self.placement == Placement::Idle
    }

    pub fn waiting_category(&self) -> Option<Category> {
        match self.placement {
            Placement::Waiting(category) => Some(category),
            _ => None,
        }
    }

    pub fn room_id(&self) -> Option<RoomId> {
        match self.placement {
            Placement::InRoom(room_id) => Some(room_id),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct PresenceRegistry {
    entries: HashMap<ConnectionId, PresenceEntry>,
}

impl PresenceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection as idle. Returns `false` if the id is taken.
    pub fn insert(
        &mut self,
        connection_id: ConnectionId,
        location: Location,
        connected_at: DateTime<Utc>,
    ) -> bool {
        if self.entries.contains_key(&connection_id) {
            return false;
        }

        self.entries.insert(
            connection_id.clone(),
            PresenceEntry {
                connection_id,
                location,
                connected_at,
                participant: None,
                placement: Placement::Idle,
                rematch_pending: false,
            },
        );
        true
    }

    pub fn remove(&mut self, connection_id: &str) -> Option<PresenceEntry> {
        self.entries.remove(connection_id)
    }

    pub fn get(&self, connection_id: &str) -> Option<&PresenceEntry> {
        self.entries.get(connection_id)
    }

    pub fn get_mut(&mut self, connection_id: &str) -> Option<&mut PresenceEntry> {
        self.entries.get_mut(connection_id)
    }

    pub fn contains(&self, connection_id: &str) -> bool {
        self.entries.contains_key(connection_id)
    }

    /// Update the placement of a connection. Returns `false` if unknown.
    pub fn set_placement(&mut self, connection_id: &str, placement: Placement) -> bool {
        match self.entries.get_mut(connection_id) {
            Some(entry) => {
                entry.placement = placement;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PresenceEntry> {
        self.entries.values()
    }

    /// Number of connections that are neither waiting nor paired
    pub fn idle_count(&self) -> usize {
        self.entries.values().filter(|entry| entry.is_idle()).count()
    }
}
