//! Error types for gateway operations.

use thiserror::Error;

/// Errors returned by [`ConsultationGateway`](crate::ConsultationGateway)
/// implementations.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The session is no longer authorized (HTTP 401).
    #[error("unauthorized")]
    Unauthorized,

    /// The resource is not accessible to this session (HTTP 403).
    #[error("access denied: {0}")]
    Forbidden(String),

    /// The resource does not exist (HTTP 404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Any other non-success HTTP status.
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    /// The request never produced a response (connection, timeout).
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The gateway answered with `success: false`.
    #[error("rejected by gateway: {0}")]
    Rejected(String),

    /// Invalid client configuration.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl GatewayError {
    /// Errors after which a polling loop must stop for good.
    pub fn stops_polling(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized | Self::Forbidden(_) | Self::NotFound(_)
        )
    }

    /// Errors worth waiting out until the next tick.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Status { code, .. } => *code >= 500 || *code == 429 || *code == 408,
            _ => false,
        }
    }
}
