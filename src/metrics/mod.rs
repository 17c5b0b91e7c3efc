//! Prometheus collection and the HTTP surface
//!
//! The HTTP server carries the health, stats and metrics endpoints, limits
//! the `/api` routes per client address and mounts the signaling socket.

pub mod collector;
pub mod health;
pub mod rate_limit;

pub use collector::{
    MatchMetrics, MetricsCollector, MetricsTimer, PerformanceMetrics, ServiceMetrics,
    SessionMetrics, SignalingMetrics,
};
pub use health::{HealthServer, HealthServerConfig, HealthServerState};
pub use rate_limit::ApiRateLimiter;
