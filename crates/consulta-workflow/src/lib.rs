//! Practitioner actions on an open consultation.
//!
//! - [`StageAdvancer`] moves a consultation between clinical stages, asking
//!   the generation pipeline for content the target stage does not have yet
//! - [`FieldEditCoordinator`] saves single fields and keeps a per-view
//!   section cache
//! - [`AiEditSession`] runs the AI chat for one selected field
//! - [`Notifier`] surfaces the outcome of each action to the practitioner
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use consulta_core::{Consultation, ConsultationStatus, Etapa, Screen, Section};
//! use consulta_workflow::{AdvanceOutcome, StageAdvancer};
//! use mock_gateway::MockGateway;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), consulta_workflow::WorkflowError> {
//!     let consultation = Consultation::new("c-1", ConsultationStatus::ValidAnamnese)
//!         .with_etapa(Etapa::Anamnese);
//!     let gateway = MockGateway::new().with_consultation(consultation.clone());
//!     gateway.set_section("c-1", Section::Diagnostico, json!({"d_estado_geral": {"resumo": "ok"}}));
//!
//!     let advancer = StageAdvancer::new(Arc::new(gateway));
//!     let outcome = advancer.advance_to_diagnosis(&consultation).await?;
//!     assert_eq!(outcome.screen(), Some(Screen::Diagnostico));
//!     Ok(())
//! }
//! ```

pub mod advancer;
pub mod chat;
pub mod config;
pub mod edit;
pub mod error;
pub mod notifier;

pub use advancer::{AdvanceOutcome, GenerationDispatch, StageAdvancer, StageChange};
pub use chat::{parse_ai_reply, AiEditSession, ChatMessage, ChatRole, AI_APOLOGY, AI_DEFAULT_REPLY};
pub use config::WorkflowConfig;
pub use edit::FieldEditCoordinator;
pub use error::WorkflowError;
pub use notifier::{LoggingNotifier, NoOpNotifier, Notice, NoticeLevel, Notifier, RecordingNotifier};
