//! Guarded stage transitions.
//!
//! Every transition follows the same shape:
//!
//! 1. Decide whether the target stage still needs generated content by
//!    reading its section(s).
//! 2. When content must be generated, check the stage precondition (only
//!    Diagnosis to Solution has one: the patient's intake form is filled).
//!    An unmet precondition blocks the transition without touching anything.
//! 3. Patch the consultation. Generation sets `PROCESSING`; otherwise the
//!    target stage's `VALID_*` status is written so the resolver lands on it.
//! 4. Notify the generation webhook. A failure here is logged and reported but
//!    does not undo step 3.
//! 5. Re-read the consultation and resolve its screen.
//!
//! Repeating a transition whose content already exists is pure navigation.

use std::sync::Arc;

use consulta_core::{
    Consultation, ConsultationGateway, ConsultationPatch, ConsultationStatus, Etapa, GatewayError,
    GenerationKind, GenerationRequest, Screen, Section, SolucaoEtapa,
};
use tracing::{debug, error, info, warn};

use crate::error::WorkflowError;
use crate::notifier::{NoOpNotifier, Notice, Notifier};

/// What happened to the generation webhook during a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationDispatch {
    /// Content already existed; nothing was requested.
    NotRequired,
    /// The webhook accepted the request.
    Dispatched,
    /// The webhook call failed; the stage change stands.
    Failed(String),
}

/// A committed stage change.
#[derive(Debug, Clone, PartialEq)]
pub struct StageChange {
    /// The consultation as re-read after the change.
    pub consultation: Consultation,
    /// Screen the view should navigate to.
    pub screen: Screen,
    pub generation: GenerationDispatch,
}

/// Result of a workflow action.
#[derive(Debug, Clone, PartialEq)]
pub enum AdvanceOutcome {
    Advanced(StageChange),
    /// A precondition was unmet; nothing was written.
    Blocked { reason: String },
    /// The action does not apply, e.g. "next" on the last track.
    Unchanged,
}

impl AdvanceOutcome {
    pub fn change(&self) -> Option<&StageChange> {
        match self {
            Self::Advanced(change) => Some(change),
            _ => None,
        }
    }

    pub fn screen(&self) -> Option<Screen> {
        self.change().map(|change| change.screen)
    }
}

/// Runs stage transitions against a gateway.
pub struct StageAdvancer<G: ConsultationGateway + ?Sized> {
    gateway: Arc<G>,
    notifier: Arc<dyn Notifier>,
}

impl<G: ConsultationGateway + ?Sized> StageAdvancer<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            notifier: Arc::new(NoOpNotifier),
        }
    }

    /// Builder method to set the notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Anamnesis to Diagnosis.
    pub async fn advance_to_diagnosis(
        &self,
        consultation: &Consultation,
    ) -> Result<AdvanceOutcome, WorkflowError> {
        let id = consultation.id.as_str();
        let should_generate = !self.has_data(id, &[Section::Diagnostico]).await?;
        debug!(consultation_id = %id, should_generate, "Advancing to diagnosis");

        let patch = ConsultationPatch::new()
            .etapa(Etapa::Diagnostico)
            .status(stage_status(should_generate, ConsultationStatus::ValidDiagnostico));
        let generation = should_generate
            .then(|| GenerationRequest::for_consultation(GenerationKind::Diagnosis, consultation));

        self.commit(id, patch, generation, "Moved to diagnosis").await
    }

    /// Diagnosis to Solution track selection.
    ///
    /// Generation is needed only when no track has content yet, and then
    /// requires a filled intake form.
    pub async fn advance_to_solution(
        &self,
        consultation: &Consultation,
    ) -> Result<AdvanceOutcome, WorkflowError> {
        let id = consultation.id.as_str();
        let tracks: Vec<Section> = Section::solution_tracks().collect();
        let should_generate = !self.has_data(id, &tracks).await?;
        debug!(consultation_id = %id, should_generate, "Advancing to solution");

        if should_generate {
            if let Some(reason) = self.intake_gap(consultation).await? {
                warn!(consultation_id = %id, reason = %reason, "Solution advance blocked");
                self.notifier.notify(Notice::warning(reason.clone())).await;
                return Ok(AdvanceOutcome::Blocked { reason });
            }
        }

        let patch = ConsultationPatch::new()
            .etapa(Etapa::Solucao)
            .clear_track()
            .status(stage_status(should_generate, ConsultationStatus::ValidSolucao));
        let generation = should_generate
            .then(|| GenerationRequest::for_consultation(GenerationKind::Solution, consultation));

        self.commit(id, patch, generation, "Moved to solution").await
    }

    /// Open one solution track, generating it when it has no content.
    pub async fn select_track(
        &self,
        consultation: &Consultation,
        track: SolucaoEtapa,
    ) -> Result<AdvanceOutcome, WorkflowError> {
        let id = consultation.id.as_str();
        let should_generate = !self.has_data(id, &[Section::Solucao(track)]).await?;
        debug!(consultation_id = %id, track = ?track, should_generate, "Selecting solution track");

        let patch = ConsultationPatch::new()
            .etapa(Etapa::Solucao)
            .track(track)
            .status(stage_status(should_generate, ConsultationStatus::ValidSolucao));
        let generation = should_generate.then(|| {
            GenerationRequest::for_consultation(GenerationKind::Solution, consultation).with_track(track)
        });

        let label = format!("Opened {}", track.as_str());
        self.commit(id, patch, generation, &label).await
    }

    /// Move to the following track. Unchanged on the last track.
    pub async fn next_track(&self, consultation: &Consultation) -> Result<AdvanceOutcome, WorkflowError> {
        match consultation.solucao_etapa.and_then(|track| track.next()) {
            Some(track) => self.select_track(consultation, track).await,
            None => Ok(AdvanceOutcome::Unchanged),
        }
    }

    /// Move to the preceding track. Unchanged on the first track.
    pub async fn previous_track(
        &self,
        consultation: &Consultation,
    ) -> Result<AdvanceOutcome, WorkflowError> {
        match consultation.solucao_etapa.and_then(|track| track.previous()) {
            Some(track) => self.select_track(consultation, track).await,
            None => Ok(AdvanceOutcome::Unchanged),
        }
    }

    /// Leave the open track and go back to track selection.
    pub async fn return_to_selection(
        &self,
        consultation: &Consultation,
    ) -> Result<AdvanceOutcome, WorkflowError> {
        let patch = ConsultationPatch::new()
            .etapa(Etapa::Solucao)
            .clear_track()
            .status(ConsultationStatus::ValidSolucao);
        self.commit(&consultation.id, patch, None, "Back to solution selection")
            .await
    }

    /// Mark the consultation completed.
    pub async fn complete(&self, consultation: &Consultation) -> Result<AdvanceOutcome, WorkflowError> {
        if consultation.status == ConsultationStatus::Completed {
            return Ok(AdvanceOutcome::Unchanged);
        }
        let patch = ConsultationPatch::new().status(ConsultationStatus::Completed);
        self.commit(&consultation.id, patch, None, "Consultation completed")
            .await
    }

    /// Whether any of `sections` already has content.
    ///
    /// A failed read counts as no content, except for auth failures, which
    /// abort the transition.
    async fn has_data(&self, id: &str, sections: &[Section]) -> Result<bool, WorkflowError> {
        for section in sections {
            match self.gateway.get_section(id, *section).await {
                Ok(Some(_)) => return Ok(true),
                Ok(None) => {}
                Err(e) if e.stops_polling() => {
                    return Err(self.report(id, "Could not check existing content", e).await)
                }
                Err(e) => {
                    warn!(
                        consultation_id = %id,
                        section = %section,
                        error = %e,
                        "Section read failed, treating as empty"
                    );
                }
            }
        }
        Ok(false)
    }

    /// Why the intake precondition is unmet, if it is.
    async fn intake_gap(&self, consultation: &Consultation) -> Result<Option<String>, WorkflowError> {
        let Some(patient_id) = consultation.patient_id.as_deref() else {
            return Ok(Some("Consultation has no patient; cannot check the intake form".to_string()));
        };

        match self.gateway.get_patient_intake(patient_id).await {
            Ok(intake) if intake.is_filled() => Ok(None),
            Ok(_) => Ok(Some(
                "The patient's intake form must be filled before generating the solution"
                    .to_string(),
            )),
            Err(e) => Err(self
                .report(&consultation.id, "Could not check the intake form", e)
                .await),
        }
    }

    /// Steps 3 to 6 of a transition.
    async fn commit(
        &self,
        id: &str,
        patch: ConsultationPatch,
        generation: Option<GenerationRequest>,
        label: &str,
    ) -> Result<AdvanceOutcome, WorkflowError> {
        let patched = match self.gateway.update_consultation(id, &patch).await {
            Ok(consultation) => consultation,
            Err(e) => return Err(self.report(id, "Could not update the consultation", e).await),
        };

        let generation = match generation {
            None => GenerationDispatch::NotRequired,
            Some(request) => match self.gateway.trigger_generation(&request).await {
                Ok(()) => {
                    info!(consultation_id = %id, kind = ?request.kind, "Generation requested");
                    GenerationDispatch::Dispatched
                }
                Err(e) => {
                    warn!(consultation_id = %id, error = %e, "Generation webhook failed, stage change kept");
                    self.notifier
                        .notify(Notice::warning(format!("Generation could not be started: {}", e)))
                        .await;
                    GenerationDispatch::Failed(e.to_string())
                }
            },
        };

        let consultation = match self.gateway.get_consultation(id).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(consultation_id = %id, error = %e, "Re-read after transition failed, using patch response");
                patched
            }
        };
        let screen = consultation.screen();

        info!(consultation_id = %id, screen = %screen, "{}", label);
        self.notifier.notify(Notice::success(label)).await;

        Ok(AdvanceOutcome::Advanced(StageChange {
            consultation,
            screen,
            generation,
        }))
    }

    async fn report(&self, id: &str, context: &str, e: GatewayError) -> WorkflowError {
        error!(consultation_id = %id, error = %e, "{}", context);
        self.notifier
            .notify(Notice::error(format!("{}: {}", context, e)))
            .await;
        WorkflowError::Gateway(e)
    }
}

fn stage_status(should_generate: bool, valid: ConsultationStatus) -> ConsultationStatus {
    if should_generate {
        ConsultationStatus::Processing
    } else {
        valid
    }
}
