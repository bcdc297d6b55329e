//! Lifecycle enums persisted on a consultation record.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Persisted consultation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsultationStatus {
    Created,
    Recording,
    Processing,
    /// Legacy status; the stage is carried by `etapa`.
    Validation,
    ValidAnamnese,
    ValidDiagnostico,
    ValidSolucao,
    Error,
    Cancelled,
    Completed,
    Agendamento,
    /// Any status string this client does not know about.
    #[serde(other)]
    Unknown,
}

impl ConsultationStatus {
    /// All statuses the gateway is documented to send.
    pub const ALL: [ConsultationStatus; 11] = [
        Self::Created,
        Self::Recording,
        Self::Processing,
        Self::Validation,
        Self::ValidAnamnese,
        Self::ValidDiagnostico,
        Self::ValidSolucao,
        Self::Error,
        Self::Cancelled,
        Self::Completed,
        Self::Agendamento,
    ];

    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Recording => "RECORDING",
            Self::Processing => "PROCESSING",
            Self::Validation => "VALIDATION",
            Self::ValidAnamnese => "VALID_ANAMNESE",
            Self::ValidDiagnostico => "VALID_DIAGNOSTICO",
            Self::ValidSolucao => "VALID_SOLUCAO",
            Self::Error => "ERROR",
            Self::Cancelled => "CANCELLED",
            Self::Completed => "COMPLETED",
            Self::Agendamento => "AGENDAMENTO",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Server-side work is in flight (recording or generation).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Processing | Self::Recording)
    }

    /// No further client-driven transitions are expected.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error | Self::Cancelled)
    }
}

impl fmt::Display for ConsultationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsultationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown consultation status: {}", s))
    }
}

/// Pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Etapa {
    Anamnese,
    Diagnostico,
    Solucao,
}

impl Etapa {
    pub const ALL: [Etapa; 3] = [Self::Anamnese, Self::Diagnostico, Self::Solucao];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anamnese => "ANAMNESE",
            Self::Diagnostico => "DIAGNOSTICO",
            Self::Solucao => "SOLUCAO",
        }
    }
}

impl fmt::Display for Etapa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Therapeutic track within the SOLUCAO stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SolucaoEtapa {
    Mentalidade,
    Alimentacao,
    Suplementacao,
    AtividadeFisica,
}

impl SolucaoEtapa {
    /// Navigation order for previous/next moves between tracks.
    pub const ORDER: [SolucaoEtapa; 4] = [
        Self::Mentalidade,
        Self::Suplementacao,
        Self::Alimentacao,
        Self::AtividadeFisica,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mentalidade => "MENTALIDADE",
            Self::Alimentacao => "ALIMENTACAO",
            Self::Suplementacao => "SUPLEMENTACAO",
            Self::AtividadeFisica => "ATIVIDADE_FISICA",
        }
    }

    /// Leading key used by field paths belonging to this track.
    pub fn path_key(&self) -> &'static str {
        match self {
            Self::Mentalidade => "mentalidade",
            Self::Alimentacao => "alimentacao",
            Self::Suplementacao => "suplementacao",
            Self::AtividadeFisica => "atividade_fisica",
        }
    }

    fn position(&self) -> usize {
        Self::ORDER
            .iter()
            .position(|track| track == self)
            .unwrap_or_default()
    }

    /// Next track in navigation order, `None` at the last one.
    pub fn next(&self) -> Option<SolucaoEtapa> {
        Self::ORDER.get(self.position() + 1).copied()
    }

    /// Previous track in navigation order, `None` at the first one.
    pub fn previous(&self) -> Option<SolucaoEtapa> {
        self.position()
            .checked_sub(1)
            .and_then(|idx| Self::ORDER.get(idx).copied())
    }
}

impl fmt::Display for SolucaoEtapa {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SolucaoEtapa {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_");
        Self::ORDER
            .iter()
            .copied()
            .find(|track| {
                track.as_str().eq_ignore_ascii_case(&normalized)
                    || track.path_key().eq_ignore_ascii_case(&normalized)
            })
            .ok_or_else(|| format!("unknown solution track: {}", s))
    }
}

/// How the consultation is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsultationType {
    Presencial,
    Telemedicina,
}
