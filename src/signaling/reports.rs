//! Abuse report forwarding
//!
//! Reports are accepted and forwarded. Nothing here acts on them.

use crate::error::Result;
use crate::types::{ConnectionId, RoomId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::warn;

/// A report filed by one participant about its partner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbuseReport {
    pub reporter: ConnectionId,
    /// Partner in the named room, when the reporter is still a member
    pub reported: Option<ConnectionId>,
    pub room_id: RoomId,
    pub reason: String,
    pub submitted_at: DateTime<Utc>,
}

/// Trait for handing reports to whatever reviews them
pub trait ReportForwarder: Send + Sync {
    fn forward(&self, report: &AbuseReport) -> Result<()>;
}

/// Forwarder that writes each report to the structured log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingReportForwarder;

impl ReportForwarder for LoggingReportForwarder {
    fn forward(&self, report: &AbuseReport) -> Result<()> {
        warn!(
            "User report received - reporter: '{}', reported: {:?}, room: {}, reason: '{}'",
            report.reporter, report.reported, report.room_id, report.reason
        );
        Ok(())
    }
}

/// Forwarder that keeps reports in memory (for testing)
#[derive(Debug, Default)]
pub struct RecordingReportForwarder {
    reports: Mutex<Vec<AbuseReport>>,
}

impl RecordingReportForwarder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<AbuseReport> {
        self.reports
            .lock()
            .map(|reports| reports.clone())
            .unwrap_or_default()
    }
}

impl ReportForwarder for RecordingReportForwarder {
    fn forward(&self, report: &AbuseReport) -> Result<()> {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push(report.clone());
        }
        Ok(())
    }
}
