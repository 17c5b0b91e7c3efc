//! Common types used throughout the matchmaking service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque identifier of one live connection
pub type ConnectionId = String;

/// Unique identifier for rooms
pub type RoomId = Uuid;

/// Self-reported category of a participant, also used for the desired partner category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Male,
    Female,
    /// The "either" value
    #[default]
    Both,
}

impl Category {
    /// Every category, in bucket order
    pub const ALL: [Category; 3] = [Category::Male, Category::Female, Category::Both];

    /// Whether a participant desiring `self` accepts a partner of `category`
    pub fn accepts(self, category: Category) -> bool {
        self == Category::Both || self == category
    }

    /// Stable index of the waiting bucket for this category
    pub fn index(self) -> usize {
        match self {
            Category::Male => 0,
            Category::Female => 1,
            Category::Both => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Male => "male",
            Category::Female => "female",
            Category::Both => "both",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse location attached to a connection at connect time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub code: String,
    pub name: String,
    pub flag: String,
    pub timezone: String,
}

impl Location {
    /// Location used when nothing better is known
    pub fn unknown() -> Self {
        Self {
            code: "XX".to_string(),
            name: "Unknown".to_string(),
            flag: "🌍".to_string(),
            timezone: "GMT+0".to_string(),
        }
    }

    /// Location reported for local development connections
    pub fn local_development() -> Self {
        Self {
            code: "US".to_string(),
            name: "United States".to_string(),
            flag: "🇺🇸".to_string(),
            timezone: "GMT-5".to_string(),
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Self::unknown()
    }
}

/// A connected peer that has declared its preferences
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    pub id: ConnectionId,
    pub category: Category,
    pub desired: Category,
    pub location: Location,
    pub joined_at: DateTime<Utc>,
}

impl Participant {
    /// Both sides accept each other
    pub fn is_compatible_with(&self, other: &Participant) -> bool {
        self.desired.accepts(other.category) && other.desired.accepts(self.category)
    }
}

/// Where a connected participant currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "value")]
pub enum Placement {
    /// Connected, neither waiting nor paired
    Idle,
    /// Queued in the waiting bucket of its own category
    Waiting(Category),
    /// Paired in a room
    InRoom(RoomId),
}

/// Why a participant left its room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaveReason {
    Disconnect,
    Next,
    Cancel,
}

impl LeaveReason {
    pub fn as_str(self) -> &'static str {
        match self {
            LeaveReason::Disconnect => "disconnect",
            LeaveReason::Next => "next",
            LeaveReason::Cancel => "cancel",
        }
    }
}

impl std::fmt::Display for LeaveReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    Active,
    Closing,
}

/// A two-member session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub members: [ConnectionId; 2],
    pub created_at: DateTime<Utc>,
    pub status: RoomStatus,
}

impl Room {
    pub fn contains(&self, connection_id: &str) -> bool {
        self.members.iter().any(|member| member == connection_id)
    }

    /// The other member, if `connection_id` belongs to this room
    pub fn partner_of(&self, connection_id: &str) -> Option<&ConnectionId> {
        if self.members[0] == connection_id {
            Some(&self.members[1])
        } else if self.members[1] == connection_id {
            Some(&self.members[0])
        } else {
            None
        }
    }
}

/// Kind of negotiation message relayed between room members
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SignalKind {
    Offer,
    Answer,
    IceCandidate,
}

impl SignalKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SignalKind::Offer => "offer",
            SignalKind::Answer => "answer",
            SignalKind::IceCandidate => "ice-candidate",
        }
    }
}

/// STUN/TURN server entry handed to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(urls: impl Into<String>) -> Self {
        Self {
            urls: urls.into(),
            username: None,
            credential: None,
        }
    }
}

/// What a matched participant learns about its partner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartnerDescriptor {
    pub id: ConnectionId,
    pub category: Category,
    pub location: Location,
    pub joined_at: DateTime<Utc>,
}

impl From<&Participant> for PartnerDescriptor {
    fn from(participant: &Participant) -> Self {
        Self {
            id: participant.id.clone(),
            category: participant.category,
            location: participant.location.clone(),
            joined_at: participant.joined_at,
        }
    }
}

/// Events delivered to a single connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ServerEvent {
    ConnectionSuccess {
        connection_id: ConnectionId,
        location: Location,
        ice_servers: Vec<IceServer>,
    },
    WaitingForMatch,
    MatchFound {
        room_id: RoomId,
        partner: PartnerDescriptor,
        /// The receiver should create the WebRTC offer
        initiator: bool,
    },
    PartnerLeft {
        reason: LeaveReason,
    },
    Offer {
        room_id: RoomId,
        from: ConnectionId,
        payload: serde_json::Value,
    },
    Answer {
        room_id: RoomId,
        from: ConnectionId,
        payload: serde_json::Value,
    },
    IceCandidate {
        room_id: RoomId,
        from: ConnectionId,
        payload: serde_json::Value,
    },
    ReportSubmitted {
        room_id: RoomId,
    },
    Error {
        message: String,
    },
}

impl ServerEvent {
    /// Build the relay event for a negotiation message
    pub fn signal(
        kind: SignalKind,
        room_id: RoomId,
        from: ConnectionId,
        payload: serde_json::Value,
    ) -> Self {
        match kind {
            SignalKind::Offer => ServerEvent::Offer {
                room_id,
                from,
                payload,
            },
            SignalKind::Answer => ServerEvent::Answer {
                room_id,
                from,
                payload,
            },
            SignalKind::IceCandidate => ServerEvent::IceCandidate {
                room_id,
                from,
                payload,
            },
        }
    }

    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::ConnectionSuccess { .. } => "connection-success",
            ServerEvent::WaitingForMatch => "waiting-for-match",
            ServerEvent::MatchFound { .. } => "match-found",
            ServerEvent::PartnerLeft { .. } => "partner-left",
            ServerEvent::Offer { .. } => "offer",
            ServerEvent::Answer { .. } => "answer",
            ServerEvent::IceCandidate { .. } => "ice-candidate",
            ServerEvent::ReportSubmitted { .. } => "report-submitted",
            ServerEvent::Error { .. } => "error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_accepts() {
        assert!(Category::Both.accepts(Category::Male));
        assert!(Category::Both.accepts(Category::Both));
        assert!(Category::Male.accepts(Category::Male));
        assert!(!Category::Male.accepts(Category::Female));
        assert!(!Category::Female.accepts(Category::Both));
    }

    #[test]
    fn test_category_wire_names() {
        let parsed: Category = serde_json::from_value(json!("female")).unwrap();
        assert_eq!(parsed, Category::Female);
        assert_eq!(serde_json::to_value(Category::Both).unwrap(), json!("both"));
        assert!(serde_json::from_value::<Category>(json!("other")).is_err());
        assert_eq!(Category::default(), Category::Both);
    }

    #[test]
    fn test_room_partner_lookup() {
        let room = Room {
            id: Uuid::new_v4(),
            members: ["a".to_string(), "b".to_string()],
            created_at: Utc::now(),
            status: RoomStatus::Active,
        };

        assert_eq!(room.partner_of("a"), Some(&"b".to_string()));
        assert_eq!(room.partner_of("b"), Some(&"a".to_string()));
        assert_eq!(room.partner_of("c"), None);
        assert!(room.contains("a"));
        assert!(!room.contains("c"));
    }

    #[test]
    fn test_server_event_shape() {
        let room_id = Uuid::new_v4();
        let event = ServerEvent::signal(
            SignalKind::IceCandidate,
            room_id,
            "peer-1".to_string(),
            json!({"candidate": "candidate:1"}),
        );

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "ice-candidate");
        assert_eq!(value["roomId"], json!(room_id));
        assert_eq!(value["from"], "peer-1");
        assert_eq!(event.name(), "ice-candidate");

        let left = serde_json::to_value(ServerEvent::PartnerLeft {
            reason: LeaveReason::Next,
        })
        .unwrap();
        assert_eq!(left, json!({"type": "partner-left", "reason": "next"}));
    }
}
