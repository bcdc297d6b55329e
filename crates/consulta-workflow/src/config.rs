//! Configuration for workflow actions.

use std::env;
use std::time::Duration;

use crate::error::WorkflowError;

/// Default delay before refreshing a section after an AI edit.
pub const DEFAULT_AI_REFRESH_DELAY_MS: u64 = 3_000;

/// Configuration for workflow actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    /// How long to wait after an AI edit before re-reading its section.
    ///
    /// Generation runs asynchronously on the server and is not awaited.
    pub ai_refresh_delay: Duration,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            ai_refresh_delay: Duration::from_millis(DEFAULT_AI_REFRESH_DELAY_MS),
        }
    }
}

impl WorkflowConfig {
    /// Create configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `CONSULTAS_AI_REFRESH_DELAY_MS` - default: 3000
    pub fn from_env() -> Result<Self, WorkflowError> {
        let ai_refresh_delay = match env::var("CONSULTAS_AI_REFRESH_DELAY_MS") {
            Ok(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| {
                    WorkflowError::Config(format!("Invalid CONSULTAS_AI_REFRESH_DELAY_MS: {}", e))
                })?,
            Err(_) => Duration::from_millis(DEFAULT_AI_REFRESH_DELAY_MS),
        };

        Ok(Self { ai_refresh_delay })
    }

    /// Builder method to set the AI refresh delay.
    pub fn with_ai_refresh_delay(mut self, delay: Duration) -> Self {
        self.ai_refresh_delay = delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = WorkflowConfig::default().with_ai_refresh_delay(Duration::from_millis(10));
        assert_eq!(config.ai_refresh_delay, Duration::from_millis(10));
    }

    #[test]
    fn test_from_env_scenarios() {
        use std::sync::Mutex;
        static ENV_LOCK: Mutex<()> = Mutex::new(());
        let _guard = ENV_LOCK.lock().unwrap();

        std::env::remove_var("CONSULTAS_AI_REFRESH_DELAY_MS");
        assert_eq!(WorkflowConfig::from_env().unwrap(), WorkflowConfig::default());

        std::env::set_var("CONSULTAS_AI_REFRESH_DELAY_MS", "500");
        assert_eq!(
            WorkflowConfig::from_env().unwrap().ai_refresh_delay,
            Duration::from_millis(500)
        );

        std::env::set_var("CONSULTAS_AI_REFRESH_DELAY_MS", "soon");
        assert!(matches!(WorkflowConfig::from_env(), Err(WorkflowError::Config(_))));

        std::env::remove_var("CONSULTAS_AI_REFRESH_DELAY_MS");
    }
}
