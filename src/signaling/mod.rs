//! WebSocket signaling surface: wire messages, event delivery, connection
//! lifecycle and the auxiliary location and report hooks.

pub mod handler;
pub mod location;
pub mod messages;
pub mod publisher;
pub mod reports;

pub use handler::{dispatch_message, router, SignalingState};
pub use location::{FallbackLocationResolver, LocationResolver};
pub use messages::{ClientMessage, MessageUtils};
pub use publisher::{ChannelEventPublisher, EventPublisher, MockEventPublisher};
pub use reports::{AbuseReport, LoggingReportForwarder, RecordingReportForwarder, ReportForwarder};
