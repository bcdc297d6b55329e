//! The gateway seam between the dashboard core and the remote API.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::consultation::{Consultation, ConsultationPage, ConsultationPatch, ListQuery, PatientIntake};
use crate::error::GatewayError;
use crate::field_path::FieldPath;
use crate::section::Section;
use crate::status::SolucaoEtapa;

/// Body of a single field write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldUpdate {
    /// Section the write is routed to.
    #[serde(skip)]
    pub section: Section,
    #[serde(rename = "fieldPath")]
    pub field_path: String,
    pub value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solucao_etapa: Option<SolucaoEtapa>,
}

impl FieldUpdate {
    pub fn new(path: &FieldPath, value: Value) -> Self {
        let section = path.section();
        Self {
            section,
            field_path: path.to_string(),
            value,
            solucao_etapa: section.track(),
        }
    }
}

/// What the gateway returned for a successful field write.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdateResult {
    /// Updated sub-document, when the gateway sends one back.
    pub data: Option<Value>,
}

/// An AI-assisted edit instruction for one field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiEditRequest {
    pub origin: &'static str,
    pub field_path: String,
    pub text: String,
    pub consultation_id: String,
    #[serde(rename = "solucao_etapa", skip_serializing_if = "Option::is_none")]
    pub solucao_etapa: Option<SolucaoEtapa>,
}

impl AiEditRequest {
    /// Origin tag identifying AI-assisted edits.
    pub const ORIGIN: &'static str = "IA";

    pub fn new(consultation_id: impl Into<String>, path: &FieldPath, text: impl Into<String>) -> Self {
        Self {
            origin: Self::ORIGIN,
            field_path: path.to_string(),
            text: text.into(),
            consultation_id: consultation_id.into(),
            solucao_etapa: path.section().track(),
        }
    }
}

/// Which generation pipeline to kick off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationKind {
    Diagnosis,
    Solution,
}

/// Notification to the clinical-content generation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    #[serde(skip)]
    pub kind: GenerationKind,
    pub consultation_id: String,
    pub doctor_id: Option<String>,
    pub patient_id: Option<String>,
    #[serde(rename = "solucao_etapa", skip_serializing_if = "Option::is_none")]
    pub solucao_etapa: Option<SolucaoEtapa>,
}

impl GenerationRequest {
    pub fn for_consultation(kind: GenerationKind, consultation: &Consultation) -> Self {
        Self {
            kind,
            consultation_id: consultation.id.clone(),
            doctor_id: consultation.doctor_id.clone(),
            patient_id: consultation.patient_id.clone(),
            solucao_etapa: None,
        }
    }

    pub fn with_track(mut self, track: SolucaoEtapa) -> Self {
        self.solucao_etapa = Some(track);
        self
    }
}

/// Remote source of truth for consultations and their clinical sections.
///
/// Implemented over HTTP by `gateway-client` and in memory by `mock-gateway`.
#[async_trait]
pub trait ConsultationGateway: Send + Sync {
    /// Fetch one page of the consultation list.
    async fn list_consultations(&self, query: &ListQuery) -> Result<ConsultationPage, GatewayError>;

    /// Fetch one consultation, bypassing any HTTP cache.
    async fn get_consultation(&self, id: &str) -> Result<Consultation, GatewayError>;

    /// Patch lifecycle fields of a consultation.
    async fn update_consultation(
        &self,
        id: &str,
        patch: &ConsultationPatch,
    ) -> Result<Consultation, GatewayError>;

    /// Delete a consultation.
    async fn delete_consultation(&self, id: &str) -> Result<(), GatewayError>;

    /// Fetch a clinical section; `None` when nothing was generated yet.
    async fn get_section(&self, id: &str, section: Section) -> Result<Option<Value>, GatewayError>;

    /// Write a single clinical field.
    async fn update_field(
        &self,
        id: &str,
        update: &FieldUpdate,
    ) -> Result<FieldUpdateResult, GatewayError>;

    /// Intake questionnaire state of a patient.
    async fn get_patient_intake(&self, patient_id: &str) -> Result<PatientIntake, GatewayError>;

    /// Send an AI edit instruction and return the raw reply.
    async fn dispatch_ai_edit(&self, request: &AiEditRequest) -> Result<Value, GatewayError>;

    /// Notify the generation pipeline; the result is not awaited.
    async fn trigger_generation(&self, request: &GenerationRequest) -> Result<(), GatewayError>;
}
