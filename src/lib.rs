//! Pairline - anonymous peer matchmaking and WebRTC signaling relay
//!
//! Participants declare their own category and the category they want to be
//! paired with. Compatible participants are paired into two-member rooms and
//! the service relays WebRTC negotiation messages between room members. When
//! one side leaves, the other is notified and re-enters matching after a
//! short delay.

pub mod config;
pub mod error;
pub mod matchmaking;
pub mod metrics;
pub mod service;
pub mod signaling;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchError, Result};
pub use types::*;

// Re-export key components
pub use matchmaking::{MatchOutcome, MatchmakingStats, SessionManager};
pub use signaling::{ChannelEventPublisher, EventPublisher};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
