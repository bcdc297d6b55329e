//! Delayed gateway - wraps another gateway with artificial latency.

use std::time::Duration;

use consulta_core::{
    async_trait, AiEditRequest, Consultation, ConsultationGateway, ConsultationPage,
    ConsultationPatch, FieldUpdate, FieldUpdateResult, GatewayError, GenerationRequest, ListQuery,
    PatientIntake, Section,
};
use serde_json::Value;
use tokio::time::sleep;

/// A gateway that sleeps before every call.
///
/// Useful for testing what happens when a view is closed while a request is
/// in flight.
pub struct DelayedGateway<G: ConsultationGateway> {
    inner: G,
    delay: Duration,
}

impl<G: ConsultationGateway> DelayedGateway<G> {
    pub fn new(inner: G, delay: Duration) -> Self {
        Self { inner, delay }
    }

    pub fn with_millis(inner: G, millis: u64) -> Self {
        Self::new(inner, Duration::from_millis(millis))
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G: ConsultationGateway> ConsultationGateway for DelayedGateway<G> {
    async fn list_consultations(&self, query: &ListQuery) -> Result<ConsultationPage, GatewayError> {
        sleep(self.delay).await;
        self.inner.list_consultations(query).await
    }

    async fn get_consultation(&self, id: &str) -> Result<Consultation, GatewayError> {
        sleep(self.delay).await;
        self.inner.get_consultation(id).await
    }

    async fn update_consultation(
        &self,
        id: &str,
        patch: &ConsultationPatch,
    ) -> Result<Consultation, GatewayError> {
        sleep(self.delay).await;
        self.inner.update_consultation(id, patch).await
    }

    async fn delete_consultation(&self, id: &str) -> Result<(), GatewayError> {
        sleep(self.delay).await;
        self.inner.delete_consultation(id).await
    }

    async fn get_section(&self, id: &str, section: Section) -> Result<Option<Value>, GatewayError> {
        sleep(self.delay).await;
        self.inner.get_section(id, section).await
    }

    async fn update_field(
        &self,
        id: &str,
        update: &FieldUpdate,
    ) -> Result<FieldUpdateResult, GatewayError> {
        sleep(self.delay).await;
        self.inner.update_field(id, update).await
    }

    async fn get_patient_intake(&self, patient_id: &str) -> Result<PatientIntake, GatewayError> {
        sleep(self.delay).await;
        self.inner.get_patient_intake(patient_id).await
    }

    async fn dispatch_ai_edit(&self, request: &AiEditRequest) -> Result<Value, GatewayError> {
        sleep(self.delay).await;
        self.inner.dispatch_ai_edit(request).await
    }

    async fn trigger_generation(&self, request: &GenerationRequest) -> Result<(), GatewayError> {
        sleep(self.delay).await;
        self.inner.trigger_generation(request).await
    }
}
