pub mod manager;
pub mod matcher;
pub mod pool;
pub mod presence;
pub mod rematch;
pub mod rooms;

pub use manager::{MatchOutcome, MatchTrigger, MatchmakingStats, SessionManager};
pub use matcher::{PartnerMatcher, PreferenceMatcher};
pub use pool::{WaitingEntry, WaitingPool};
pub use presence::{PresenceEntry, PresenceRegistry};
pub use rematch::RematchDriver;
pub use rooms::{ClosedRoom, RoomRegistry};
