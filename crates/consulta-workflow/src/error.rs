//! Error types for workflow actions.

use consulta_core::{FieldPathError, GatewayError};
use thiserror::Error;

/// Errors that can occur while running a workflow action.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Gateway call failed.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// The field path does not name a known section.
    #[error("invalid field path: {0}")]
    FieldPath(#[from] FieldPathError),

    /// An AI instruction was sent before a field was selected.
    #[error("no field selected for AI editing")]
    NoFieldSelected,

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}
