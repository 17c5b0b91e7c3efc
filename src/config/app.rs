//! Main application configuration
//!
//! This module defines the primary configuration structures for the pairline
//! service, including file and environment variable loading and validation.

use crate::config::http::HttpSettings;
use crate::config::signaling::{SignalingSettings, TurnSettings};
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub http: HttpSettings,
    pub signaling: SignalingSettings,
    pub matchmaking: MatchmakingSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Interface the HTTP/WebSocket server binds to
    pub host: String,
    /// Port for signaling, health and metrics endpoints
    pub http_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Matchmaking-specific settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Delay before a participant whose partner left re-enters matching
    pub rematch_delay_ms: u64,
    /// Interval for the periodic stats log and gauge refresh
    pub stats_interval_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "pairline".to_string(),
            log_level: "info".to_string(),
            host: "0.0.0.0".to_string(),
            http_port: 3000,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            rematch_delay_ms: 1000,
            stats_interval_seconds: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut config = Self::from_toml_str(&contents)?;
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(contents).map_err(|e| anyhow!("Invalid TOML configuration: {}", e))?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Ok(name) = env::var("SERVICE_NAME") {
            self.service.name = name;
        }
        if let Ok(log_level) = env::var("LOG_LEVEL") {
            self.service.log_level = log_level;
        }
        if let Ok(host) = env::var("HOST") {
            self.service.host = host;
        }
        if let Ok(port) = env::var("PORT") {
            self.service.http_port = port
                .parse()
                .map_err(|_| anyhow!("Invalid PORT value: {}", port))?;
        }
        if let Ok(timeout) = env::var("SHUTDOWN_TIMEOUT_SECONDS") {
            self.service.shutdown_timeout_seconds = timeout
                .parse()
                .map_err(|_| anyhow!("Invalid SHUTDOWN_TIMEOUT_SECONDS value: {}", timeout))?;
        }

        // HTTP settings
        if let Ok(origin) = env::var("FRONTEND_URL").or_else(|_| env::var("CORS_ORIGIN")) {
            self.http.cors_origin = origin;
        }
        if let Ok(limit) = env::var("API_RATE_LIMIT") {
            self.http.api_rate_limit = limit
                .parse()
                .map_err(|_| anyhow!("Invalid API_RATE_LIMIT value: {}", limit))?;
        }
        if let Ok(window) = env::var("API_RATE_WINDOW_SECONDS") {
            self.http.api_rate_window_seconds = window
                .parse()
                .map_err(|_| anyhow!("Invalid API_RATE_WINDOW_SECONDS value: {}", window))?;
        }
        if let Ok(logging) = env::var("REQUEST_LOGGING") {
            self.http.request_logging = logging
                .parse()
                .map_err(|_| anyhow!("Invalid REQUEST_LOGGING value: {}", logging))?;
        }

        // Signaling settings
        if let Ok(max_bytes) = env::var("MAX_MESSAGE_BYTES") {
            self.signaling.max_message_bytes = max_bytes
                .parse()
                .map_err(|_| anyhow!("Invalid MAX_MESSAGE_BYTES value: {}", max_bytes))?;
        }
        if let Ok(url) = env::var("TURN_SERVER") {
            let username = env::var("TURN_USERNAME")
                .map_err(|_| anyhow!("TURN_SERVER is set but TURN_USERNAME is missing"))?;
            let credential = env::var("TURN_PASSWORD")
                .map_err(|_| anyhow!("TURN_SERVER is set but TURN_PASSWORD is missing"))?;
            self.signaling.turn = Some(TurnSettings {
                url,
                username,
                credential,
            });
        }

        // Matchmaking settings
        if let Ok(delay) = env::var("REMATCH_DELAY_MS") {
            self.matchmaking.rematch_delay_ms = delay
                .parse()
                .map_err(|_| anyhow!("Invalid REMATCH_DELAY_MS value: {}", delay))?;
        }
        if let Ok(interval) = env::var("STATS_INTERVAL_SECONDS") {
            self.matchmaking.stats_interval_seconds = interval
                .parse()
                .map_err(|_| anyhow!("Invalid STATS_INTERVAL_SECONDS value: {}", interval))?;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }

    /// Get re-match delay as Duration
    pub fn rematch_delay(&self) -> Duration {
        Duration::from_millis(self.matchmaking.rematch_delay_ms)
    }

    /// Get stats interval as Duration
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.matchmaking.stats_interval_seconds)
    }

    /// Address the HTTP server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.service.host, self.service.http_port)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    if config.service.host.is_empty() {
        return Err(anyhow!("Host cannot be empty"));
    }
    if config.service.http_port == 0 {
        return Err(anyhow!("HTTP port cannot be 0"));
    }
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    if let Some(origins) = config.http.allowed_origins() {
        for origin in origins {
            let scheme_ok = origin.starts_with("http://") || origin.starts_with("https://");
            if !scheme_ok || origin.chars().any(|c| c.is_whitespace() || c.is_control()) {
                return Err(anyhow!("Invalid CORS origin: {}", origin));
            }
        }
    }
    if config.http.rate_limit_enabled() {
        if config.http.api_rate_window_seconds == 0 {
            return Err(anyhow!("API rate limit window must be greater than 0"));
        }
        let shortest_window = Duration::from_nanos(u64::from(config.http.api_rate_limit));
        if config.http.api_rate_window() < shortest_window {
            return Err(anyhow!("API rate limit is too high for its window"));
        }
    }

    if config.signaling.max_message_bytes < 1024 {
        return Err(anyhow!("Max message size must be at least 1024 bytes"));
    }
    if config.signaling.stun_servers.is_empty() && config.signaling.turn.is_none() {
        return Err(anyhow!("At least one ICE server must be configured"));
    }
    if let Some(turn) = &config.signaling.turn {
        if turn.url.is_empty() {
            return Err(anyhow!("TURN server URL cannot be empty"));
        }
    }

    if config.matchmaking.stats_interval_seconds == 0 {
        return Err(anyhow!("Stats interval must be greater than 0"));
    }

    Ok(())
}
