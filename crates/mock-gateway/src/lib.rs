//! Mock gateway implementations for testing the consultation dashboard.
//!
//! This crate provides in-memory implementations of the `ConsultationGateway`
//! trait:
//! - `MockGateway` - Stores consultations and sections in memory, records
//!   every call and injects failures on demand
//! - `DelayedGateway` - Wraps another gateway with artificial latency
//!
//! For a live gateway, use the `gateway-client` crate instead.
//!
//! # Example
//!
//! ```rust
//! use mock_gateway::{Consultation, ConsultationGateway, ConsultationStatus, MockGateway};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), mock_gateway::GatewayError> {
//!     let gateway = MockGateway::new()
//!         .with_consultation(Consultation::new("c-1", ConsultationStatus::ValidAnamnese));
//!
//!     let consultation = gateway.get_consultation("c-1").await?;
//!     println!("Screen: {}", consultation.screen());
//!     assert_eq!(gateway.get_count("c-1"), 1);
//!     Ok(())
//! }
//! ```

mod delayed;
mod memory;

// Re-export core types for convenience
pub use consulta_core::{
    async_trait, Consultation, ConsultationGateway, ConsultationStatus, GatewayError, Section,
};

pub use delayed::DelayedGateway;
pub use memory::{GatewayCall, MockGateway};
