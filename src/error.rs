//! Error types for the matchmaking service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchError {
    #[error("Invalid client message: {reason}")]
    InvalidMessage { reason: String },

    #[error("Participant not found: {connection_id}")]
    ParticipantNotFound { connection_id: String },

    #[error("Participant is not a member of room {room_id}: {connection_id}")]
    NotRoomMember {
        connection_id: String,
        room_id: String,
    },

    #[error("Matchmaking invariant violated: {message}")]
    InvariantViolation { message: String },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}
