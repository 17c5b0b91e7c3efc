//! HTTP surface configuration: CORS, request logging and `/api` limits

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Origin value that admits every caller
pub const ANY_ORIGIN: &str = "*";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Allowed browser origin, `*` for any. Several may be comma separated.
    pub cors_origin: String,
    /// Requests per address per window on `/api` routes; 0 disables limiting
    pub api_rate_limit: u32,
    pub api_rate_window_seconds: u64,
    /// Log every HTTP request and response
    pub request_logging: bool,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            cors_origin: ANY_ORIGIN.to_string(),
            api_rate_limit: 1000,
            api_rate_window_seconds: 15 * 60,
            request_logging: true,
        }
    }
}

impl HttpSettings {
    /// Explicit origins, or `None` when any origin is allowed
    pub fn allowed_origins(&self) -> Option<Vec<String>> {
        let origins: Vec<String> = self
            .cors_origin
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect();

        if origins.is_empty() || origins.iter().any(|origin| origin == ANY_ORIGIN) {
            None
        } else {
            Some(origins)
        }
    }

    pub fn api_rate_window(&self) -> Duration {
        Duration::from_secs(self.api_rate_window_seconds)
    }

    pub fn rate_limit_enabled(&self) -> bool {
        self.api_rate_limit > 0
    }
}
