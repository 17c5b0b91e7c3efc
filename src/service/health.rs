//! Health check functionality
//!
//! Readiness and liveness checks for the pairline service. The full check
//! also verifies that the matchmaking registries agree with each other.

use crate::matchmaking::{MatchmakingStats, SessionManager};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::error;

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Gauge value exported as `pairline_health_status`
    pub fn as_gauge(self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    fn combine(self, other: HealthStatus) -> HealthStatus {
        match (self, other) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Seconds since the service started
    pub uptime_seconds: u64,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    pub stats: MatchmakingStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Optional error message if not healthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

impl HealthCheck {
    /// Perform a comprehensive health check of the service
    pub async fn check(
        service_name: &str,
        manager: &SessionManager,
        is_running: &RwLock<bool>,
        started_at: Instant,
    ) -> Result<Self> {
        let service_check = Self::check_service_running(is_running).await;
        let session_check = Self::check_session_manager(manager, true);

        let status = service_check.status.combine(session_check.status);
        let stats = manager.stats().unwrap_or_default();

        Ok(HealthCheck {
            status,
            service: service_name.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            uptime_seconds: started_at.elapsed().as_secs(),
            checks: vec![service_check, session_check],
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(is_running: &RwLock<bool>) -> Result<HealthStatus> {
        if *is_running.read().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - verify service can handle connections.
    ///
    /// Only confirms the session state is reachable; the consistency walk
    /// is left to [`HealthCheck::check`].
    pub async fn readiness_check(
        manager: &SessionManager,
        is_running: &RwLock<bool>,
    ) -> Result<HealthStatus> {
        if !*is_running.read().await {
            return Ok(HealthStatus::Unhealthy);
        }

        Ok(Self::check_session_manager(manager, false).status)
    }

    async fn check_service_running(is_running: &RwLock<bool>) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = if *is_running.read().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Session state must be reachable and, when `verify` is set,
    /// internally consistent
    fn check_session_manager(manager: &SessionManager, verify: bool) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = match manager.stats() {
            Ok(_) if !verify => (HealthStatus::Healthy, None),
            Ok(_) => match manager.check_invariants() {
                Ok(()) => (HealthStatus::Healthy, None),
                Err(e) => {
                    error!("Session state invariant violated: {}", e);
                    (HealthStatus::Degraded, Some(e.to_string()))
                }
            },
            Err(e) => (
                HealthStatus::Unhealthy,
                Some(format!("Cannot access session state: {}", e)),
            ),
        };

        ComponentCheck {
            name: "session_manager".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsCollector;
    use crate::signaling::MockEventPublisher;
    use std::sync::Arc;
    use std::time::Duration;

    fn create_test_manager() -> SessionManager {
        SessionManager::new(
            Arc::new(MockEventPublisher::new()),
            Arc::new(MetricsCollector::new().expect("Failed to create collector")),
            Duration::ZERO,
        )
    }

    #[tokio::test]
    async fn test_checks_follow_running_flag() {
        let manager = create_test_manager();
        let is_running = RwLock::new(false);

        assert_eq!(
            HealthCheck::liveness_check(&is_running).await.unwrap(),
            HealthStatus::Unhealthy
        );
        assert_eq!(
            HealthCheck::readiness_check(&manager, &is_running)
                .await
                .unwrap(),
            HealthStatus::Unhealthy
        );

        *is_running.write().await = true;
        assert_eq!(
            HealthCheck::liveness_check(&is_running).await.unwrap(),
            HealthStatus::Healthy
        );
        assert_eq!(
            HealthCheck::readiness_check(&manager, &is_running)
                .await
                .unwrap(),
            HealthStatus::Healthy
        );
    }

    #[tokio::test]
    async fn test_full_check_reports_stats() {
        let manager = create_test_manager();
        manager
            .connect("a", crate::types::Location::unknown())
            .unwrap();
        let is_running = RwLock::new(true);

        let health = HealthCheck::check("pairline", &manager, &is_running, Instant::now())
            .await
            .unwrap();

        assert_eq!(health.status, HealthStatus::Healthy);
        assert_eq!(health.checks.len(), 2);
        assert_eq!(health.stats.connected, 1);
        assert!(health.to_json().unwrap().contains("session_manager"));
    }

    #[test]
    fn test_status_combination() {
        assert_eq!(
            HealthStatus::Healthy.combine(HealthStatus::Degraded),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::Degraded.combine(HealthStatus::Unhealthy),
            HealthStatus::Unhealthy
        );
        assert_eq!(HealthStatus::Unhealthy.as_gauge(), 0);
    }
}
