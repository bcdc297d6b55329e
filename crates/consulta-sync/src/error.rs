//! Error types for consulta-sync.

use consulta_core::GatewayError;
use thiserror::Error;

/// Errors surfaced by the sync loops to their owner.
///
/// Background ticks never return errors; only opening a view does.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Gateway call failed.
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Invalid configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}
