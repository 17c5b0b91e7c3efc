//! Configuration management for the pairline service
//!
//! This module handles configuration loading from TOML files and environment
//! variables, validation, and default values.

pub mod app;
pub mod http;
pub mod signaling;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, MatchmakingSettings, ServiceSettings};
pub use http::{HttpSettings, ANY_ORIGIN};
pub use signaling::{SignalingSettings, TurnSettings, DEFAULT_STUN_SERVERS};
