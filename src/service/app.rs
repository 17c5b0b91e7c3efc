//! Main application state and service coordination
//!
//! This module contains the production AppState that wires the session
//! manager, the signaling socket, the HTTP server and background tasks.

use crate::config::AppConfig;
use crate::matchmaking::{MatchmakingStats, SessionManager};
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector};
use crate::service::health::{HealthCheck, HealthStatus};
use crate::signaling::{
    ChannelEventPublisher, FallbackLocationResolver, LocationResolver, SignalingState,
};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("HTTP server error: {message}")]
    Server { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,

    /// Core matchmaking state
    session_manager: SessionManager,

    /// Outbound channels of every open socket
    publisher: Arc<ChannelEventPublisher>,

    metrics_collector: Arc<MetricsCollector>,

    /// Signaling socket plus health, stats and metrics endpoints
    http_server: Arc<HealthServer>,

    background_tasks: Vec<JoinHandle<()>>,

    is_running: Arc<RwLock<bool>>,

    started_at: Instant,
}

impl AppState {
    /// Initialize the application with all dependencies
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        Self::with_location_resolver(config, Arc::new(FallbackLocationResolver)).await
    }

    /// Initialize with a custom location backend
    pub async fn with_location_resolver(
        config: AppConfig,
        location_resolver: Arc<dyn LocationResolver>,
    ) -> Result<Self, ServiceError> {
        info!("Initializing pairline service");
        info!(
            "Configuration: service={}, bind={}, rematch_delay={}ms",
            config.service.name,
            config.bind_address(),
            config.matchmaking.rematch_delay_ms
        );

        crate::config::validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let publisher = Arc::new(ChannelEventPublisher::new());
        let session_manager = SessionManager::new(
            publisher.clone(),
            metrics_collector.clone(),
            config.rematch_delay(),
        );
        let is_running = Arc::new(RwLock::new(false));

        let signaling = SignalingState {
            manager: session_manager.clone(),
            publisher: publisher.clone(),
            location_resolver,
            ice_servers: config.signaling.ice_servers(),
            max_message_bytes: config.signaling.max_message_bytes,
            metrics_collector: metrics_collector.clone(),
        };

        let server_config = HealthServerConfig {
            port: config.service.http_port,
            host: config.service.host.clone(),
            http: config.http.clone(),
        };
        let http_server = HealthServer::new(server_config, metrics_collector.clone())
            .with_service_name(config.service.name.clone())
            .with_session_manager(session_manager.clone(), is_running.clone())
            .with_signaling(signaling);

        Ok(Self {
            config,
            session_manager,
            publisher,
            metrics_collector,
            http_server: Arc::new(http_server),
            background_tasks: Vec::new(),
            is_running,
            started_at: Instant::now(),
        })
    }

    /// Start the HTTP server and background tasks
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting pairline service");

        *self.is_running.write().await = true;

        self.start_http_server().await?;
        self.start_background_tasks().await?;

        info!("✅ Pairline service started successfully");
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of pairline service");

        *self.is_running.write().await = false;

        match self.session_manager.cancel_pending_rematches() {
            Ok(0) => {}
            Ok(cancelled) => info!("Cancelled {} pending re-matches", cancelled),
            Err(e) => warn!("Failed to cancel pending re-matches: {}", e),
        }

        info!("Stopping HTTP server...");
        if let Err(e) = self.http_server.stop().await {
            warn!("Failed to stop HTTP server: {}", e);
        } else {
            info!("✅ HTTP server stopped");
        }

        self.stop_background_tasks().await;

        let final_stats =
            self.session_manager
                .stats()
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Failed to get final stats: {}", e),
                })?;

        info!("Final service statistics: {:?}", final_stats);
        info!("✅ Pairline service shutdown completed");
        Ok(())
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    /// Shared running flag, for health checks outside the service
    pub fn running_flag(&self) -> Arc<RwLock<bool>> {
        self.is_running.clone()
    }

    pub fn session_manager(&self) -> SessionManager {
        self.session_manager.clone()
    }

    pub fn publisher(&self) -> Arc<ChannelEventPublisher> {
        self.publisher.clone()
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Current matchmaking statistics
    pub fn stats(&self) -> Result<MatchmakingStats, ServiceError> {
        self.session_manager
            .stats()
            .map_err(|e| ServiceError::BackgroundTask {
                message: format!("Failed to get stats: {}", e),
            })
    }

    async fn start_http_server(&mut self) -> Result<(), ServiceError> {
        info!("Starting HTTP, signaling and metrics endpoints");

        let http_server = self.http_server.clone();
        let is_running = self.is_running.clone();
        let address = self.config.bind_address();

        let server_handle = tokio::spawn(async move {
            if let Err(e) = http_server.start().await {
                error!("HTTP server failed: {}", e);
                *is_running.write().await = false;
            } else {
                info!("HTTP server task completed");
            }
        });

        self.background_tasks.push(server_handle);

        // Give the listener a moment to bind
        tokio::time::sleep(Duration::from_millis(100)).await;

        if !*self.is_running.read().await {
            return Err(ServiceError::Server {
                message: format!("Failed to serve on {}", address),
            });
        }

        info!("✅ HTTP server started on {}", address);
        Ok(())
    }

    /// Start background maintenance tasks
    async fn start_background_tasks(&mut self) -> Result<(), ServiceError> {
        info!("Starting background maintenance tasks...");

        let stats_interval = self.config.stats_interval();
        info!(
            "Starting session stats task ({}s interval)...",
            stats_interval.as_secs()
        );
        let stats_task = {
            let manager = self.session_manager.clone();
            let publisher = self.publisher.clone();
            let metrics_collector = self.metrics_collector.clone();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(stats_interval);
                info!("Session stats task started");

                while *is_running.read().await {
                    interval.tick().await;

                    match manager.stats() {
                        Ok(stats) => {
                            info!(
                                "Session stats - connected: {}, sockets: {}, waiting: {} (male: {}, female: {}, both: {}), rooms: {}, rematches pending: {}",
                                stats.connected,
                                publisher.connection_count(),
                                stats.waiting_total,
                                stats.waiting_male,
                                stats.waiting_female,
                                stats.waiting_both,
                                stats.active_rooms,
                                stats.pending_rematches
                            );
                            metrics_collector.update_from_session_stats(&stats);
                        }
                        Err(e) => {
                            warn!("Failed to get session stats: {}", e);
                        }
                    }
                }

                info!("Session stats task stopped");
            })
        };

        info!("Starting health metrics task (60s interval)...");
        let health_metrics_task = {
            let manager = self.session_manager.clone();
            let metrics_collector = self.metrics_collector.clone();
            let is_running = self.is_running.clone();
            let started_at = self.started_at;
            let service_name = self.config.service.name.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(60));
                info!("Health metrics task started");

                while *is_running.read().await {
                    interval.tick().await;

                    let uptime_seconds = started_at.elapsed().as_secs() as i64;
                    metrics_collector
                        .service()
                        .uptime_seconds
                        .set(uptime_seconds);

                    match HealthCheck::check(&service_name, &manager, &is_running, started_at)
                        .await
                    {
                        Ok(health) => {
                            metrics_collector.update_health_status(health.status.as_gauge());
                            for check in &health.checks {
                                metrics_collector.update_component_health(
                                    &check.name,
                                    check.status == HealthStatus::Healthy,
                                );
                            }
                        }
                        Err(e) => warn!("Health metrics update failed: {}", e),
                    }
                    metrics_collector.update_component_health("http_server", true);

                    debug!(
                        "Updated service health metrics - uptime: {}s",
                        uptime_seconds
                    );
                }

                info!("Health metrics task stopped");
            })
        };

        self.background_tasks.push(stats_task);
        self.background_tasks.push(health_metrics_task);

        info!("2 background maintenance tasks started successfully");
        Ok(())
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in self.background_tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        tokio::time::sleep(Duration::from_millis(100)).await;

        info!("✅ All {} background tasks stopped", task_count);
    }
}
