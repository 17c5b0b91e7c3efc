//! Signaling relay configuration

use crate::types::IceServer;
use serde::{Deserialize, Serialize};

/// Public STUN servers handed to every client by default
pub const DEFAULT_STUN_SERVERS: [&str; 5] = [
    "stun:stun.l.google.com:19302",
    "stun:stun1.l.google.com:19302",
    "stun:stun2.l.google.com:19302",
    "stun:stun3.l.google.com:19302",
    "stun:stun4.l.google.com:19302",
];

/// Optional TURN relay credentials
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnSettings {
    pub url: String,
    pub username: String,
    pub credential: String,
}

/// Settings for the WebSocket signaling surface
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalingSettings {
    /// Largest accepted client frame in bytes
    pub max_message_bytes: usize,
    /// STUN server URLs
    pub stun_servers: Vec<String>,
    /// TURN relay, only advertised when fully configured
    pub turn: Option<TurnSettings>,
}

impl Default for SignalingSettings {
    fn default() -> Self {
        Self {
            max_message_bytes: 64 * 1024,
            stun_servers: DEFAULT_STUN_SERVERS.iter().map(|s| s.to_string()).collect(),
            turn: None,
        }
    }
}

impl SignalingSettings {
    /// ICE server list sent in the connection greeting
    pub fn ice_servers(&self) -> Vec<IceServer> {
        let mut servers: Vec<IceServer> = self
            .stun_servers
            .iter()
            .map(|url| IceServer::stun(url.clone()))
            .collect();

        if let Some(turn) = &self.turn {
            servers.push(IceServer {
                urls: turn.url.clone(),
                username: Some(turn.username.clone()),
                credential: Some(turn.credential.clone()),
            });
        }

        servers
    }
}
