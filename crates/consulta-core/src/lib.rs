//! Core types for the consultation dashboard.
//!
//! This crate holds everything the sync loops and workflow actions share:
//!
//! - [`Consultation`] and its lifecycle enums ([`ConsultationStatus`], [`Etapa`],
//!   [`SolucaoEtapa`])
//! - [`resolve_screen`] - the pure mapping from a persisted record to a [`Screen`]
//! - [`FieldPath`] - typed clinical field paths routed by [`Section`]
//! - [`ConsultationGateway`] - the trait every gateway implementation provides
//! - [`SectionRefreshBus`] - view-scoped refresh notifications
//!
//! # Example
//!
//! ```rust
//! use consulta_core::{resolve_screen, ConsultationStatus, Etapa, Screen, SolucaoEtapa};
//!
//! let screen = resolve_screen(
//!     ConsultationStatus::ValidSolucao,
//!     Some(Etapa::Solucao),
//!     Some(SolucaoEtapa::Alimentacao),
//! );
//! assert_eq!(screen, Screen::SolucaoAlimentacao);
//! ```

mod consultation;
mod duration;
mod error;
mod events;
mod field_path;
mod gateway;
mod resolver;
mod section;
mod status;

pub use consultation::{
    parse_timestamp, Consultation, ConsultationPage, ConsultationPatch, ListQuery, PatientIntake,
    INTAKE_FILLED,
};
pub use duration::{format_duration, MAX_DURATION_SECS};
pub use error::GatewayError;
pub use events::{SectionRefresh, SectionRefreshBus};
pub use field_path::{FieldPath, FieldPathError, PathSegment, DIAGNOSIS_TABLES};
pub use gateway::{
    AiEditRequest, ConsultationGateway, FieldUpdate, FieldUpdateResult, GenerationKind,
    GenerationRequest,
};
pub use resolver::{resolve_screen, ClinicalStage, Phase, Screen};
pub use section::{section_has_data, Section};
pub use status::{ConsultationStatus, ConsultationType, Etapa, SolucaoEtapa};

// Re-export async_trait for gateway implementors
pub use async_trait::async_trait;
