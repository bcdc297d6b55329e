//! Polling cadence configuration.

use std::env;
use std::time::Duration;

use consulta_core::{Consultation, ConsultationStatus};

use crate::error::SyncError;

/// Intervals for the detail and list polling loops.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Detail interval while the consultation is recording or processing.
    pub detail_active: Duration,

    /// Detail interval for every other non-terminal status.
    pub detail_default: Duration,

    /// Detail interval once the consultation is completed, failed or cancelled.
    pub detail_idle: Duration,

    /// List interval while any visible row is recording or processing.
    pub list_active: Duration,

    /// List interval otherwise.
    pub list_idle: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            detail_active: Duration::from_millis(3_000),
            detail_default: Duration::from_millis(5_000),
            detail_idle: Duration::from_millis(60_000),
            list_active: Duration::from_millis(5_000),
            list_idle: Duration::from_millis(15_000),
        }
    }
}

impl SyncConfig {
    /// Create configuration from environment variables.
    ///
    /// Optional environment variables (milliseconds):
    /// - `CONSULTAS_POLL_ACTIVE_MS` - default: 3000
    /// - `CONSULTAS_POLL_DEFAULT_MS` - default: 5000
    /// - `CONSULTAS_POLL_IDLE_MS` - default: 60000
    /// - `CONSULTAS_LIST_POLL_ACTIVE_MS` - default: 5000
    /// - `CONSULTAS_LIST_POLL_IDLE_MS` - default: 15000
    pub fn from_env() -> Result<Self, SyncError> {
        let defaults = Self::default();
        Ok(Self {
            detail_active: millis_var("CONSULTAS_POLL_ACTIVE_MS", defaults.detail_active)?,
            detail_default: millis_var("CONSULTAS_POLL_DEFAULT_MS", defaults.detail_default)?,
            detail_idle: millis_var("CONSULTAS_POLL_IDLE_MS", defaults.detail_idle)?,
            list_active: millis_var("CONSULTAS_LIST_POLL_ACTIVE_MS", defaults.list_active)?,
            list_idle: millis_var("CONSULTAS_LIST_POLL_IDLE_MS", defaults.list_idle)?,
        })
    }

    /// Builder method to set the three detail intervals.
    pub fn with_detail_intervals(mut self, active: Duration, default: Duration, idle: Duration) -> Self {
        self.detail_active = active;
        self.detail_default = default;
        self.detail_idle = idle;
        self
    }

    /// Builder method to set the two list intervals.
    pub fn with_list_intervals(mut self, active: Duration, idle: Duration) -> Self {
        self.list_active = active;
        self.list_idle = idle;
        self
    }

    /// Next detail tick delay for the cached status.
    ///
    /// Nothing cached yet counts as the default cadence.
    pub fn detail_interval(&self, status: Option<ConsultationStatus>) -> Duration {
        match status {
            Some(status) if status.is_active() => self.detail_active,
            Some(status) if status.is_terminal() => self.detail_idle,
            _ => self.detail_default,
        }
    }

    /// Next list tick delay for the visible rows.
    pub fn list_interval(&self, rows: &[Consultation]) -> Duration {
        if rows.iter().any(|row| row.status.is_active()) {
            self.list_active
        } else {
            self.list_idle
        }
    }
}

fn millis_var(name: &str, default: Duration) -> Result<Duration, SyncError> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<u64>()
            .map(Duration::from_millis)
            .map_err(|e| SyncError::Config(format!("Invalid {}: {}", name, e))),
        _ => Ok(default),
    }
}
