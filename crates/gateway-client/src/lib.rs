//! Consultation gateway HTTP client.
//!
//! Implements [`consulta_core::ConsultationGateway`] over the gateway's JSON
//! API:
//!
//! - Consultation list, read (cache-busted), patch and delete
//! - Clinical section reads and single-field writes
//! - Patient intake lookups
//! - AI edit dispatch and generation webhooks
//!
//! # Example
//!
//! ```no_run
//! use consulta_core::ConsultationGateway;
//! use gateway_client::{GatewayClient, GatewayConfig};
//!
//! # async fn example() -> Result<(), consulta_core::GatewayError> {
//! let config = GatewayConfig::new("http://localhost:3000/api").with_token("token");
//! let client = GatewayClient::new(config)?;
//!
//! let consultation = client.get_consultation("c-1").await?;
//! println!("{} -> {}", consultation.status, consultation.screen());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;

pub use client::GatewayClient;
pub use config::{GatewayConfig, DEFAULT_TIMEOUT_SECS};

/// Crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
