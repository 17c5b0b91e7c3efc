//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the pairline matchmaking and
//! signaling service using Prometheus metrics.

use crate::matchmaking::manager::{MatchTrigger, MatchmakingStats};
use crate::types::{Category, LeaveReason, SignalKind};
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Main metrics collector for the matchmaking service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Connection and placement metrics
    session_metrics: SessionMetrics,

    /// Pairing metrics
    match_metrics: MatchMetrics,

    /// Relay and report metrics
    signaling_metrics: SignalingMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Connection and placement metrics
#[derive(Clone)]
pub struct SessionMetrics {
    /// Total connections accepted
    pub connections_total: IntCounter,

    /// Total disconnections processed
    pub disconnections_total: IntCounter,

    /// Participants currently connected
    pub connected_participants: IntGauge,

    /// Participants currently waiting, by own category
    pub waiting_participants: IntGaugeVec,

    /// Rooms currently open
    pub active_rooms: IntGauge,

    /// Partner departures by reason
    pub partner_left_total: IntCounterVec,
}

/// Pairing metrics
#[derive(Clone)]
pub struct MatchMetrics {
    /// Rooms opened, by what triggered the match
    pub matches_total: IntCounterVec,

    /// Re-match attempts by outcome
    pub rematches_total: IntCounterVec,

    /// Time the matched partner spent waiting
    pub time_to_match_seconds: Histogram,
}

/// Relay and report metrics
#[derive(Clone)]
pub struct SignalingMetrics {
    /// Negotiation messages by kind and outcome
    pub signals_total: IntCounterVec,

    /// Abuse reports received
    pub reports_total: IntCounter,

    /// Client frames that failed to decode or validate
    pub invalid_messages_total: IntCounter,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Session operation durations
    pub operation_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let session_metrics = SessionMetrics::new(&registry)?;
        let match_metrics = MatchMetrics::new(&registry)?;
        let signaling_metrics = SignalingMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            session_metrics,
            match_metrics,
            signaling_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn session(&self) -> &SessionMetrics {
        &self.session_metrics
    }

    pub fn matching(&self) -> &MatchMetrics {
        &self.match_metrics
    }

    pub fn signaling(&self) -> &SignalingMetrics {
        &self.signaling_metrics
    }

    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Set the current-state gauges from a stats snapshot
    pub fn update_from_session_stats(&self, stats: &MatchmakingStats) {
        self.session_metrics
            .connected_participants
            .set(stats.connected as i64);
        self.session_metrics
            .active_rooms
            .set(stats.active_rooms as i64);

        for category in Category::ALL {
            self.session_metrics
                .waiting_participants
                .with_label_values(&[category.as_str()])
                .set(stats.waiting_in(category) as i64);
        }
    }

    pub fn record_connection(&self) {
        self.session_metrics.connections_total.inc();
    }

    pub fn record_disconnection(&self) {
        self.session_metrics.disconnections_total.inc();
    }

    pub fn record_partner_left(&self, reason: LeaveReason) {
        self.session_metrics
            .partner_left_total
            .with_label_values(&[reason.as_str()])
            .inc();
    }

    /// Record a room being opened
    pub fn record_match(&self, trigger: MatchTrigger, partner_waited: Duration) {
        self.match_metrics
            .matches_total
            .with_label_values(&[trigger.as_str()])
            .inc();

        self.match_metrics
            .time_to_match_seconds
            .observe(partner_waited.as_secs_f64());
    }

    /// Record a fired re-match; `outcome` is "matched", "waiting" or "stale"
    pub fn record_rematch(&self, outcome: &str) {
        self.match_metrics
            .rematches_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn record_signal(&self, kind: SignalKind, relayed: bool) {
        let outcome = if relayed { "relayed" } else { "dropped" };

        self.signaling_metrics
            .signals_total
            .with_label_values(&[kind.as_str(), outcome])
            .inc();
    }

    pub fn record_report(&self) {
        self.signaling_metrics.reports_total.inc();
    }

    pub fn record_invalid_message(&self) {
        self.signaling_metrics.invalid_messages_total.inc();
    }

    /// Record session operation duration
    pub fn record_operation(&self, operation: &str, duration: Duration) {
        self.performance_metrics
            .operation_duration
            .with_label_values(&[operation])
            .observe(duration.as_secs_f64());
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds = IntGauge::new("pairline_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "pairline_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("pairline_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl SessionMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let connections_total =
            IntCounter::new("pairline_connections_total", "Total connections accepted")?;
        registry.register(Box::new(connections_total.clone()))?;

        let disconnections_total = IntCounter::new(
            "pairline_disconnections_total",
            "Total disconnections processed",
        )?;
        registry.register(Box::new(disconnections_total.clone()))?;

        let connected_participants = IntGauge::new(
            "pairline_connected_participants",
            "Participants currently connected",
        )?;
        registry.register(Box::new(connected_participants.clone()))?;

        let waiting_participants = IntGaugeVec::new(
            Opts::new(
                "pairline_waiting_participants",
                "Participants currently waiting for a partner",
            ),
            &["category"],
        )?;
        registry.register(Box::new(waiting_participants.clone()))?;

        let active_rooms = IntGauge::new("pairline_active_rooms", "Rooms currently open")?;
        registry.register(Box::new(active_rooms.clone()))?;

        let partner_left_total = IntCounterVec::new(
            Opts::new("pairline_partner_left_total", "Partner departures"),
            &["reason"],
        )?;
        registry.register(Box::new(partner_left_total.clone()))?;

        Ok(Self {
            connections_total,
            disconnections_total,
            connected_participants,
            waiting_participants,
            active_rooms,
            partner_left_total,
        })
    }
}

impl MatchMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let matches_total = IntCounterVec::new(
            Opts::new("pairline_matches_total", "Rooms opened by trigger"),
            &["trigger"],
        )?;
        registry.register(Box::new(matches_total.clone()))?;

        let rematches_total = IntCounterVec::new(
            Opts::new("pairline_rematches_total", "Fired re-matches by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(rematches_total.clone()))?;

        let time_to_match_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "pairline_time_to_match_seconds",
                "Time the matched partner spent waiting",
            )
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 30.0, 60.0, 300.0]),
        )?;
        registry.register(Box::new(time_to_match_seconds.clone()))?;

        Ok(Self {
            matches_total,
            rematches_total,
            time_to_match_seconds,
        })
    }
}

impl SignalingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let signals_total = IntCounterVec::new(
            Opts::new("pairline_signals_total", "Negotiation messages handled"),
            &["kind", "outcome"],
        )?;
        registry.register(Box::new(signals_total.clone()))?;

        let reports_total = IntCounter::new("pairline_reports_total", "Abuse reports received")?;
        registry.register(Box::new(reports_total.clone()))?;

        let invalid_messages_total = IntCounter::new(
            "pairline_invalid_messages_total",
            "Client frames rejected as invalid",
        )?;
        registry.register(Box::new(invalid_messages_total.clone()))?;

        Ok(Self {
            signals_total,
            reports_total,
            invalid_messages_total,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let operation_duration = HistogramVec::new(
            HistogramOpts::new(
                "pairline_operation_duration_seconds",
                "Session operation duration",
            )
            .buckets(vec![0.00001, 0.0001, 0.001, 0.005, 0.01, 0.05, 0.1]),
            &["operation"],
        )?;
        registry.register(Box::new(operation_duration.clone()))?;

        Ok(Self { operation_duration })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        let _service = collector.service();
        let _session = collector.session();
        let _matching = collector.matching();
        let _signaling = collector.signaling();
        let _performance = collector.performance();
    }

    #[test]
    fn test_gauges_follow_stats() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        let stats = MatchmakingStats {
            connected: 5,
            active_rooms: 1,
            waiting_male: 2,
            waiting_both: 1,
            waiting_total: 3,
            ..Default::default()
        };
        collector.update_from_session_stats(&stats);

        assert_eq!(collector.session().connected_participants.get(), 5);
        assert_eq!(collector.session().active_rooms.get(), 1);
        assert_eq!(
            collector
                .session()
                .waiting_participants
                .with_label_values(&["male"])
                .get(),
            2
        );
        assert_eq!(
            collector
                .session()
                .waiting_participants
                .with_label_values(&["female"])
                .get(),
            0
        );
    }

    #[test]
    fn test_counters() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.record_connection();
        collector.record_connection();
        collector.record_match(MatchTrigger::Declare, Duration::from_millis(300));
        collector.record_signal(SignalKind::Offer, true);
        collector.record_signal(SignalKind::Offer, false);
        collector.record_partner_left(LeaveReason::Next);

        assert_eq!(collector.session().connections_total.get(), 2);
        assert_eq!(
            collector
                .matching()
                .matches_total
                .with_label_values(&["declare"])
                .get(),
            1
        );
        assert_eq!(
            collector
                .signaling()
                .signals_total
                .with_label_values(&["offer", "dropped"])
                .get(),
            1
        );
        assert_eq!(collector.matching().time_to_match_seconds.get_sample_count(), 1);
    }

    #[test]
    fn test_health_status_updates() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");

        collector.update_health_status(2);
        collector.update_component_health("session_manager", true);
        collector.update_component_health("http", false);

        assert_eq!(collector.service().health_status.get(), 2);
    }

    #[test]
    fn test_metrics_timer() {
        let collector = MetricsCollector::new().expect("Failed to create metrics collector");
        let timer = collector.start_timer();

        std::thread::sleep(Duration::from_millis(10));
        let duration = timer.elapsed();
        assert!(duration >= Duration::from_millis(10));

        let final_duration = timer.stop();
        assert!(final_duration >= Duration::from_millis(10));
    }
}
