//! Client-to-server wire messages
//!
//! JSON text frames tagged by `type`. Field names follow the browser client
//! (`roomId`, `gender`, `preference`).

use crate::error::{MatchError, Result};
use crate::types::{Category, RoomId, SignalKind};
use serde::{Deserialize, Serialize};

/// Longest accepted report reason, in characters
pub const MAX_REPORT_REASON_CHARS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum ClientMessage {
    /// Declare own category and desired partner category, then start matching
    SetPreferences {
        #[serde(default, rename = "gender")]
        category: Category,
        #[serde(default, rename = "preference")]
        desired: Category,
    },
    Offer {
        room_id: RoomId,
        #[serde(alias = "offer")]
        payload: serde_json::Value,
    },
    Answer {
        room_id: RoomId,
        #[serde(alias = "answer")]
        payload: serde_json::Value,
    },
    IceCandidate {
        room_id: RoomId,
        #[serde(alias = "candidate")]
        payload: serde_json::Value,
    },
    /// Leave the current partner and look for another
    NextUser,
    /// Stop searching or leave the current room without re-entering matching
    CancelMatch,
    ReportUser {
        room_id: RoomId,
        #[serde(default)]
        reason: String,
    },
}

impl ClientMessage {
    /// Negotiation kind, for relayed messages
    pub fn signal_kind(&self) -> Option<SignalKind> {
        match self {
            ClientMessage::Offer { .. } => Some(SignalKind::Offer),
            ClientMessage::Answer { .. } => Some(SignalKind::Answer),
            ClientMessage::IceCandidate { .. } => Some(SignalKind::IceCandidate),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClientMessage::SetPreferences { .. } => "set-preferences",
            ClientMessage::Offer { .. } => "offer",
            ClientMessage::Answer { .. } => "answer",
            ClientMessage::IceCandidate { .. } => "ice-candidate",
            ClientMessage::NextUser => "next-user",
            ClientMessage::CancelMatch => "cancel-match",
            ClientMessage::ReportUser { .. } => "report-user",
        }
    }
}

/// Utility functions for decoding client frames
pub struct MessageUtils;

impl MessageUtils {
    /// Decode and validate one text frame
    pub fn parse(text: &str, max_bytes: usize) -> Result<ClientMessage> {
        if text.len() > max_bytes {
            return Err(MatchError::InvalidMessage {
                reason: format!(
                    "message of {} bytes exceeds limit of {} bytes",
                    text.len(),
                    max_bytes
                ),
            }
            .into());
        }

        let message: ClientMessage =
            serde_json::from_str(text).map_err(|e| MatchError::InvalidMessage {
                reason: e.to_string(),
            })?;

        Self::validate(&message)?;
        Ok(message)
    }

    /// Validate decoded message contents
    pub fn validate(message: &ClientMessage) -> Result<()> {
        match message {
            ClientMessage::Offer { payload, .. }
            | ClientMessage::Answer { payload, .. }
            | ClientMessage::IceCandidate { payload, .. } => {
                if payload.is_null() {
                    return Err(MatchError::InvalidMessage {
                        reason: format!("{} payload cannot be null", message.name()),
                    }
                    .into());
                }
            }
            ClientMessage::ReportUser { reason, .. } => {
                if reason.chars().count() > MAX_REPORT_REASON_CHARS {
                    return Err(MatchError::InvalidMessage {
                        reason: format!(
                            "report reason exceeds {} characters",
                            MAX_REPORT_REASON_CHARS
                        ),
                    }
                    .into());
                }
            }
            _ => {}
        }
        Ok(())
    }
}
