//! Consultation state resolution.
//!
//! Server records carry the same intent in two encodings: the legacy
//! `VALIDATION` status plus `etapa`, and the `VALID_*` statuses. Both are
//! normalized once into a [`Phase`], and the [`Screen`] is derived from the
//! phase with an exhaustive match.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::status::{ConsultationStatus, Etapa, SolucaoEtapa};

/// Clinical stage the practitioner is working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClinicalStage {
    Anamnese,
    Diagnostico,
    /// `None` while the practitioner is choosing a track.
    Solucao(Option<SolucaoEtapa>),
}

impl ClinicalStage {
    fn from_etapa(etapa: Etapa, track: Option<SolucaoEtapa>) -> Self {
        match etapa {
            Etapa::Anamnese => Self::Anamnese,
            Etapa::Diagnostico => Self::Diagnostico,
            Etapa::Solucao => Self::Solucao(track),
        }
    }

    /// The `etapa` value that encodes this stage.
    pub fn etapa(&self) -> Etapa {
        match self {
            Self::Anamnese => Etapa::Anamnese,
            Self::Diagnostico => Etapa::Diagnostico,
            Self::Solucao(_) => Etapa::Solucao,
        }
    }
}

/// Canonical lifecycle phase of a consultation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Server-side work is running; `etapa` only changes the message shown.
    Processing { etapa: Option<Etapa> },
    Completed,
    Stage(ClinicalStage),
}

impl Phase {
    /// Normalize a persisted `(status, etapa, solucao_etapa)` triple.
    ///
    /// Rules are applied in order, first match wins; anything unmatched lands
    /// on the anamnesis stage.
    pub fn normalize(
        status: ConsultationStatus,
        etapa: Option<Etapa>,
        track: Option<SolucaoEtapa>,
    ) -> Self {
        match status {
            ConsultationStatus::Processing => Self::Processing { etapa },
            ConsultationStatus::Completed => Self::Completed,
            ConsultationStatus::ValidAnamnese => Self::Stage(ClinicalStage::Anamnese),
            ConsultationStatus::ValidDiagnostico => Self::Stage(ClinicalStage::Diagnostico),
            ConsultationStatus::ValidSolucao => Self::Stage(ClinicalStage::Solucao(track)),
            ConsultationStatus::Validation => match etapa {
                Some(etapa) => Self::Stage(ClinicalStage::from_etapa(etapa, track)),
                None => Self::Stage(ClinicalStage::Anamnese),
            },
            _ => Self::Stage(ClinicalStage::Anamnese),
        }
    }

    /// Screen to render for this phase.
    pub fn screen(&self) -> Screen {
        match self {
            Self::Processing { .. } => Screen::ProcessingScreen,
            Self::Completed => Screen::CompletedScreen,
            Self::Stage(ClinicalStage::Anamnese) => Screen::Anamnese,
            Self::Stage(ClinicalStage::Diagnostico) => Screen::Diagnostico,
            Self::Stage(ClinicalStage::Solucao(None)) => Screen::SelectSolucao,
            Self::Stage(ClinicalStage::Solucao(Some(track))) => Screen::for_track(*track),
        }
    }

    /// Message shown while processing; `None` outside the processing phase.
    pub fn processing_message(&self) -> Option<&'static str> {
        match self {
            Self::Processing { etapa } => Some(match etapa {
                Some(Etapa::Anamnese) | None => "Processing consultation and building the anamnesis...",
                Some(Etapa::Diagnostico) => "Generating the diagnosis...",
                Some(Etapa::Solucao) => "Generating the solution...",
            }),
            _ => None,
        }
    }
}

/// Screen identifiers of the consultation detail view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Screen {
    ProcessingScreen,
    CompletedScreen,
    Anamnese,
    Diagnostico,
    SelectSolucao,
    SolucaoMentalidade,
    SolucaoSuplementacao,
    SolucaoAlimentacao,
    SolucaoAtividadeFisica,
}

impl Screen {
    pub const ALL: [Screen; 9] = [
        Self::ProcessingScreen,
        Self::CompletedScreen,
        Self::Anamnese,
        Self::Diagnostico,
        Self::SelectSolucao,
        Self::SolucaoMentalidade,
        Self::SolucaoSuplementacao,
        Self::SolucaoAlimentacao,
        Self::SolucaoAtividadeFisica,
    ];

    /// Editing screen of a solution track.
    pub fn for_track(track: SolucaoEtapa) -> Self {
        match track {
            SolucaoEtapa::Mentalidade => Self::SolucaoMentalidade,
            SolucaoEtapa::Suplementacao => Self::SolucaoSuplementacao,
            SolucaoEtapa::Alimentacao => Self::SolucaoAlimentacao,
            SolucaoEtapa::AtividadeFisica => Self::SolucaoAtividadeFisica,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ProcessingScreen => "PROCESSING_SCREEN",
            Self::CompletedScreen => "COMPLETED_SCREEN",
            Self::Anamnese => "ANAMNESE",
            Self::Diagnostico => "DIAGNOSTICO",
            Self::SelectSolucao => "SELECT_SOLUCAO",
            Self::SolucaoMentalidade => "SOLUCAO_MENTALIDADE",
            Self::SolucaoSuplementacao => "SOLUCAO_SUPLEMENTACAO",
            Self::SolucaoAlimentacao => "SOLUCAO_ALIMENTACAO",
            Self::SolucaoAtividadeFisica => "SOLUCAO_ATIVIDADE_FISICA",
        }
    }
}

impl fmt::Display for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a persisted consultation triple to the screen to render.
///
/// Pure and total: every input maps to exactly one screen.
pub fn resolve_screen(
    status: ConsultationStatus,
    etapa: Option<Etapa>,
    solucao_etapa: Option<SolucaoEtapa>,
) -> Screen {
    Phase::normalize(status, etapa, solucao_etapa).screen()
}
