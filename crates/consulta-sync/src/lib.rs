//! Background consistency for the consultation dashboard.
//!
//! - [`DetailSync`] polls one open consultation with a status-driven cadence
//!   and stops for good on 401/403/404
//! - [`ListSync`] polls the consultation list while no detail is open
//! - [`AutoCancelSweep`] cancels scheduled teleconsultations whose day has
//!   passed, after every list poll
//! - [`Dashboard`] ties the list and detail loops together
//!
//! Caches are `tokio::sync::watch` channels owned by their view; subscribe to
//! observe changes.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use consulta_core::{Consultation, ConsultationStatus};
//! use consulta_sync::{DetailSync, SyncConfig};
//! use mock_gateway::MockGateway;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), consulta_sync::SyncError> {
//!     let gateway = Arc::new(
//!         MockGateway::new()
//!             .with_consultation(Consultation::new("c-1", ConsultationStatus::Processing)),
//!     );
//!
//!     let mut detail = DetailSync::new(gateway, SyncConfig::default());
//!     let consultation = detail.open("c-1").await?;
//!     println!("Screen: {}", consultation.screen());
//!
//!     detail.close();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod dashboard;
pub mod detail;
pub mod error;
pub mod list;
pub mod sweep;

pub use config::SyncConfig;
pub use dashboard::Dashboard;
pub use detail::{DetailCache, DetailSync};
pub use error::SyncError;
pub use list::{merge_page, ListCache, ListSync};
pub use sweep::{overdue_rows, AutoCancelSweep, SweepReport};
